//! Report definitions.
//!
//! A report is a tree of line definitions plus declared columns and
//! rendering semantics. Definitions are validated once at engine
//! construction; a definition that loads never fails mid-render.

use std::collections::{HashMap, HashSet};
use std::fmt;

use finrep_core::InternedStr;
use finrep_ledger::Domain;
use serde::{Deserialize, Serialize};

use crate::error::DefinitionError;
use crate::expand::GroupbyKey;
use crate::formula::FormulaExpr;

/// Stable identifier of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReportId(pub u32);

/// Globally unique identifier of a report line definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineDefId(pub u32);

impl fmt::Display for LineDefId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a line's values come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineSource {
    /// Aggregated from ledger entries matching a domain.
    Domain(Domain),
    /// Computed from other lines' values.
    Formula(FormulaExpr),
    /// A pure section header with no values of its own.
    Title,
}

/// One line of a report definition tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportLineDefinition {
    /// Globally unique id; roots the generic line ids of everything
    /// rendered under this line.
    pub id: LineDefId,
    /// Parent line, `None` for roots.
    #[serde(default)]
    pub parent: Option<LineDefId>,
    /// Ordering among siblings.
    #[serde(default)]
    pub sequence: u32,
    /// Display label.
    pub name: String,
    /// Code other lines' formulas may reference.
    #[serde(default)]
    pub code: Option<InternedStr>,
    /// Value source.
    pub source: LineSource,
    /// Group-by key the line expands under, making it unfoldable.
    #[serde(default)]
    pub groupby: Option<GroupbyKey>,
    /// Emit a section total line after the children.
    #[serde(default)]
    pub has_total: bool,
}

impl ReportLineDefinition {
    /// A line with everything optional defaulted.
    #[must_use]
    pub fn new(id: LineDefId, name: impl Into<String>, source: LineSource) -> Self {
        Self {
            id,
            parent: None,
            sequence: 0,
            name: name.into(),
            code: None,
            source,
            groupby: None,
            has_total: false,
        }
    }

    /// Nest under a parent line.
    #[must_use]
    pub const fn with_parent(mut self, parent: LineDefId) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Set the sibling ordering key.
    #[must_use]
    pub const fn with_sequence(mut self, sequence: u32) -> Self {
        self.sequence = sequence;
        self
    }

    /// Declare a referenceable code.
    #[must_use]
    pub fn with_code(mut self, code: impl Into<InternedStr>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Make the line unfoldable under a group-by key.
    #[must_use]
    pub const fn with_groupby(mut self, groupby: GroupbyKey) -> Self {
        self.groupby = Some(groupby);
        self
    }

    /// Emit a section total after the children.
    #[must_use]
    pub const fn with_total(mut self) -> Self {
        self.has_total = true;
        self
    }

    /// The line's domain, when it aggregates one.
    #[must_use]
    pub const fn domain(&self) -> Option<&Domain> {
        match &self.source {
            LineSource::Domain(domain) => Some(domain),
            _ => None,
        }
    }
}

/// How the report treats time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReportSemantics {
    /// Wrap each period's columns between initial and end balances, with
    /// the fiscal-year reset for profit-and-loss accounts.
    #[serde(default)]
    pub balance_chain: bool,
    /// Carry a running balance across detail lines and pages.
    #[serde(default)]
    pub progressive_balance: bool,
}

/// A full report definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportDefinition {
    /// Stable identifier.
    pub id: ReportId,
    /// Report title.
    pub name: String,
    /// Country code selecting a strategy, `None` for the generic one.
    #[serde(default)]
    pub country: Option<InternedStr>,
    /// Rendering semantics.
    #[serde(default)]
    pub semantics: ReportSemantics,
    /// Declared columns, applied to each period's movement group.
    pub columns: Vec<crate::columns::ColumnSpec>,
    /// The line tree, in definition order.
    pub lines: Vec<ReportLineDefinition>,
}

impl ReportDefinition {
    /// Look a line up by id.
    #[must_use]
    pub fn line(&self, id: LineDefId) -> Option<&ReportLineDefinition> {
        self.lines.iter().find(|line| line.id == id)
    }

    /// Look a line up by code.
    #[must_use]
    pub fn by_code(&self, code: &InternedStr) -> Option<&ReportLineDefinition> {
        self.lines
            .iter()
            .find(|line| line.code.as_ref() == Some(code))
    }

    /// The children of a line (or the roots), in sequence order.
    #[must_use]
    pub fn children(&self, parent: Option<LineDefId>) -> Vec<&ReportLineDefinition> {
        let mut children: Vec<&ReportLineDefinition> = self
            .lines
            .iter()
            .filter(|line| line.parent == parent)
            .collect();
        children.sort_by_key(|line| (line.sequence, line.id));
        children
    }

    /// Nesting depth of a line within the definition tree.
    #[must_use]
    pub fn depth(&self, id: LineDefId) -> u32 {
        let mut depth = 0;
        let mut cursor = self.line(id).and_then(|line| line.parent);
        while let Some(parent) = cursor {
            depth += 1;
            cursor = self.line(parent).and_then(|line| line.parent);
            if depth > self.lines.len() as u32 {
                break;
            }
        }
        depth
    }

    /// Validate the definition and return the formula lines in
    /// evaluation (dependency) order.
    ///
    /// # Errors
    ///
    /// Returns [`DefinitionError`] on a duplicate code, an orphan parent,
    /// a formula referencing an undefined code, or a formula cycle.
    pub fn validate(&self) -> Result<Vec<LineDefId>, DefinitionError> {
        let mut codes = HashSet::new();
        for line in &self.lines {
            if let Some(code) = &line.code {
                if !codes.insert(code.clone()) {
                    return Err(DefinitionError::DuplicateCode(code.clone()));
                }
            }
        }

        let ids: HashSet<LineDefId> = self.lines.iter().map(|line| line.id).collect();
        for line in &self.lines {
            if let Some(parent) = line.parent {
                if parent == line.id || !ids.contains(&parent) {
                    return Err(DefinitionError::OrphanParent(line.id));
                }
            }
        }

        let by_code: HashMap<&InternedStr, &ReportLineDefinition> = self
            .lines
            .iter()
            .filter_map(|line| line.code.as_ref().map(|code| (code, line)))
            .collect();

        for line in &self.lines {
            if let LineSource::Formula(expr) = &line.source {
                for code in expr.codes() {
                    if !by_code.contains_key(code) {
                        return Err(DefinitionError::UnknownCode {
                            line: line.id,
                            code: code.clone(),
                        });
                    }
                }
            }
        }

        let mut state: HashMap<LineDefId, VisitState> = HashMap::new();
        let mut order = Vec::new();
        for line in &self.lines {
            if matches!(line.source, LineSource::Formula(_)) {
                visit(line, &by_code, &mut state, &mut order)?;
            }
        }
        Ok(order)
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum VisitState {
    Visiting,
    Done,
}

fn visit(
    line: &ReportLineDefinition,
    by_code: &HashMap<&InternedStr, &ReportLineDefinition>,
    state: &mut HashMap<LineDefId, VisitState>,
    order: &mut Vec<LineDefId>,
) -> Result<(), DefinitionError> {
    if state.get(&line.id) == Some(&VisitState::Done) {
        return Ok(());
    }
    state.insert(line.id, VisitState::Visiting);
    if let LineSource::Formula(expr) = &line.source {
        for code in expr.codes() {
            let dependency = by_code[code];
            match state.get(&dependency.id) {
                Some(VisitState::Visiting) => {
                    return Err(DefinitionError::Cycle(code.clone()));
                }
                Some(VisitState::Done) => {}
                None => visit(dependency, by_code, state, order)?,
            }
        }
    }
    state.insert(line.id, VisitState::Done);
    if matches!(line.source, LineSource::Formula(_)) {
        order.push(line.id);
    }
    Ok(())
}
