//! The line tree materializer.
//!
//! [`ReportEngine`] owns a validated definition and a store, and renders
//! options snapshots into flat ordered [`DisplayLine`] lists. A render
//! walks the definition tree top-down in sibling order, resolves domain
//! lines through one shared aggregation cache, evaluates formula lines
//! in dependency order, and splices expansion pages under every unfolded
//! line. Folding state changes which lines appear, never what any line
//! sums to.

use std::collections::HashMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use finrep_core::{AggregateValues, TagId};
use finrep_ledger::{Domain, EntryFilter, LedgerStore};

use crate::aggregator::Aggregator;
use crate::columns::{ColumnPlan, ColumnSemantic, ColumnSpec};
use crate::definition::{LineDefId, LineSource, ReportDefinition, ReportLineDefinition};
use crate::display::{DisplayCell, DisplayLine};
use crate::error::{DefinitionError, EngineError};
use crate::expand::{Expander, ProgressCursor};
use crate::lineid::{GenericLineId, LineIdFrame, Markup};
use crate::options::Options;
use crate::strategy::{strategy_for, CountryStrategy};

/// Resolved per-group values of every valued line in one render.
struct Resolved {
    domain: HashMap<LineDefId, Vec<AggregateValues>>,
    formula: HashMap<LineDefId, Vec<Decimal>>,
}

/// A report bound to a ledger store, ready to render.
pub struct ReportEngine<S> {
    definition: ReportDefinition,
    formula_order: Vec<LineDefId>,
    columns: Vec<ColumnSpec>,
    strategy: Box<dyn CountryStrategy>,
    store: S,
}

impl<S: LedgerStore + Sync> ReportEngine<S> {
    /// Validate a definition and bind it to a store.
    ///
    /// # Errors
    ///
    /// Returns [`DefinitionError`] when the definition is malformed, so
    /// a constructed engine never fails on its definition mid-render.
    pub fn new(definition: ReportDefinition, store: S) -> Result<Self, DefinitionError> {
        let formula_order = definition.validate()?;
        let strategy = strategy_for(definition.country.as_ref());
        let mut columns = definition.columns.clone();
        columns.extend_from_slice(strategy.extra_columns());
        Ok(Self {
            definition,
            formula_order,
            columns,
            strategy,
            store,
        })
    }

    /// The bound definition.
    pub const fn definition(&self) -> &ReportDefinition {
        &self.definition
    }

    /// The rendered columns, strategy extras included.
    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    /// The backing store.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// The country strategy the report was constructed with.
    pub fn strategy(&self) -> &dyn CountryStrategy {
        self.strategy.as_ref()
    }

    /// Render the whole report for an options snapshot.
    ///
    /// # Errors
    ///
    /// Fails wholesale on the first store error; a partial render is
    /// never returned.
    pub fn get_lines(&self, options: &Options) -> Result<Vec<DisplayLine>, EngineError> {
        let semantics = self.definition.semantics;
        let plan = ColumnPlan::build(options, &self.columns, semantics.balance_chain);
        let aggregator = Aggregator::new(&self.store, options.scope_filter());

        let pairs: Vec<_> = self
            .definition
            .lines
            .iter()
            .filter_map(ReportLineDefinition::domain)
            .flat_map(|domain| {
                plan.groups
                    .iter()
                    .map(move |group| (domain.clone(), group.clone()))
            })
            .collect();
        debug!(pairs = pairs.len(), "prefilling aggregates");
        aggregator.prefill(pairs)?;

        let resolved = self.resolve_values(&aggregator, &plan)?;
        let expander = Expander::new(&aggregator, options, &plan, semantics);

        let mut lines = Vec::new();
        self.emit_children(None, 0, options, &plan, &resolved, &expander, &mut lines)?;

        if semantics.balance_chain {
            lines.extend(self.undistributed_lines(&aggregator, &plan, options)?);
        }
        Ok(lines)
    }

    /// Render one expansion page under an already rendered line.
    ///
    /// `parent` is the encoded id of the line being unfolded and
    /// `cursor` the opaque resume string a previous page handed out, if
    /// any. An id that no longer resolves against the definition yields
    /// an empty page, not an error.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub fn get_expanded_lines(
        &self,
        options: &Options,
        parent: &str,
        cursor: Option<&str>,
    ) -> Result<Vec<DisplayLine>, EngineError> {
        let Some(parent) = GenericLineId::parse(parent) else {
            warn!(parent, "malformed parent line id, empty expansion");
            return Ok(Vec::new());
        };
        let Some(line) = parent
            .definition_line()
            .and_then(|id| self.definition.line(id))
        else {
            warn!(parent = %parent, "parent resolves to no definition line, empty expansion");
            return Ok(Vec::new());
        };
        let Some(base_domain) = line.domain() else {
            warn!(parent = %parent, "parent line aggregates no domain, empty expansion");
            return Ok(Vec::new());
        };
        let Some(domain) = bucket_domain(base_domain, &parent.frames()[1..]) else {
            warn!(parent = %parent, "stale bucket path, empty expansion");
            return Ok(Vec::new());
        };
        // The root frame is the line itself, deeper frames are buckets.
        let at_root = parent.frames().len() == 1;
        let groupby = if at_root { line.groupby } else { None };
        let level = self.definition.depth(line.id) + parent.frames().len() as u32;

        let cursor = match cursor {
            Some(text) => ProgressCursor::decode(text).unwrap_or_else(|| {
                warn!(cursor = text, "malformed cursor, restarting page");
                ProgressCursor::default()
            }),
            None => ProgressCursor::default(),
        };

        let semantics = self.definition.semantics;
        let plan = ColumnPlan::build(options, &self.columns, semantics.balance_chain);
        let aggregator = Aggregator::new(&self.store, options.scope_filter());
        let expander = Expander::new(&aggregator, options, &plan, semantics);
        expander.expand(&parent, groupby, &domain, cursor, level)
    }

    /// Resolve every domain line against the cache and every formula
    /// line in dependency order, one value per column group.
    fn resolve_values(
        &self,
        aggregator: &Aggregator<'_, S>,
        plan: &ColumnPlan,
    ) -> Result<Resolved, EngineError> {
        let mut domain = HashMap::new();
        for line in &self.definition.lines {
            if let Some(line_domain) = line.domain() {
                let values = plan
                    .groups
                    .iter()
                    .map(|group| aggregator.fetch(line_domain, group))
                    .collect::<Result<Vec<_>, _>>()?;
                domain.insert(line.id, values);
            }
        }

        let mut formula: HashMap<LineDefId, Vec<Decimal>> = HashMap::new();
        for &id in &self.formula_order {
            let Some(line) = self.definition.line(id) else {
                continue;
            };
            let LineSource::Formula(expr) = &line.source else {
                continue;
            };
            let values = (0..plan.groups.len())
                .map(|group| {
                    expr.evaluate(|code, field| {
                        self.definition
                            .by_code(code)
                            .map_or(Decimal::ZERO, |dep| match &dep.source {
                                LineSource::Domain(_) => domain
                                    .get(&dep.id)
                                    .map_or(Decimal::ZERO, |values| values[group].field(field)),
                                LineSource::Formula(_) => formula
                                    .get(&dep.id)
                                    .map_or(Decimal::ZERO, |values| values[group]),
                                LineSource::Title => Decimal::ZERO,
                            })
                    })
                })
                .collect();
            formula.insert(id, values);
        }
        Ok(Resolved { domain, formula })
    }

    /// A line's raw value per planned cell, `None` for title lines.
    fn cell_values(
        &self,
        line: &ReportLineDefinition,
        plan: &ColumnPlan,
        resolved: &Resolved,
    ) -> Option<Vec<Decimal>> {
        match &line.source {
            LineSource::Domain(_) => {
                let values = resolved.domain.get(&line.id)?;
                Some(
                    plan.cells
                        .iter()
                        .map(|cell| values[cell.group].field(cell.field))
                        .collect(),
                )
            }
            LineSource::Formula(_) => {
                let values = resolved.formula.get(&line.id)?;
                Some(plan.cells.iter().map(|cell| values[cell.group]).collect())
            }
            LineSource::Title => None,
        }
    }

    /// A section's values: the line's own when it has any, the sum of
    /// its children otherwise.
    fn section_values(
        &self,
        line: &ReportLineDefinition,
        plan: &ColumnPlan,
        resolved: &Resolved,
    ) -> Vec<Decimal> {
        if let Some(values) = self.cell_values(line, plan, resolved) {
            return values;
        }
        let mut sums = vec![Decimal::ZERO; plan.cells.len()];
        for child in self.definition.children(Some(line.id)) {
            for (sum, value) in sums.iter_mut().zip(self.section_values(child, plan, resolved)) {
                *sum += value;
            }
        }
        sums
    }

    fn render_cells(&self, values: &[Decimal], plan: &ColumnPlan, options: &Options) -> Vec<DisplayCell> {
        values
            .iter()
            .zip(&plan.cells)
            .map(|(value, cell)| {
                DisplayCell::of(
                    *value,
                    plan.groups[cell.group].currency.clone(),
                    cell.blank_if_zero || options.blank_if_zero,
                )
            })
            .collect()
    }

    #[allow(clippy::too_many_arguments)]
    fn emit_children(
        &self,
        parent: Option<LineDefId>,
        level: u32,
        options: &Options,
        plan: &ColumnPlan,
        resolved: &Resolved,
        expander: &Expander<'_, S>,
        out: &mut Vec<DisplayLine>,
    ) -> Result<(), EngineError> {
        for line in self.definition.children(parent) {
            let id = GenericLineId::root(line.id);
            let unfoldable = line.groupby.is_some() && line.domain().is_some();
            let unfolded = unfoldable && options.is_unfolded(&id);

            let mut display = DisplayLine::new(&id, line.name.clone(), level);
            display.unfoldable = unfoldable;
            display.unfolded = unfolded;
            display.groupby = line.groupby.map(|key| key.model().to_string());
            display.columns = match self.cell_values(line, plan, resolved) {
                Some(values) => self.render_cells(&values, plan, options),
                None => vec![DisplayCell::empty(); plan.cells.len()],
            };
            out.push(display);

            if unfolded {
                if let Some(domain) = line.domain() {
                    out.extend(expander.expand(
                        &id,
                        line.groupby,
                        domain,
                        ProgressCursor::default(),
                        level + 1,
                    )?);
                }
            }

            self.emit_children(Some(line.id), level + 1, options, plan, resolved, expander, out)?;

            if line.has_total {
                let total_id = id.child(LineIdFrame::for_markup(Markup::Total));
                let mut total =
                    DisplayLine::new(&total_id, format!("Total {}", line.name), level);
                let values = self.section_values(line, plan, resolved);
                total.columns = self.render_cells(&values, plan, options);
                out.push(total);
            }
        }
        Ok(())
    }

    /// The per-company undistributed profit-and-loss lines closing the
    /// initial/end chain across fiscal-year boundaries.
    fn undistributed_lines(
        &self,
        aggregator: &Aggregator<'_, S>,
        plan: &ColumnPlan,
        options: &Options,
    ) -> Result<Vec<DisplayLine>, EngineError> {
        let currency = options.currency.target();
        let mut lines = Vec::new();

        for &company in &options.companies {
            let mut by_anchor: HashMap<NaiveDate, AggregateValues> = HashMap::new();
            for group in &plan.groups {
                for anchor in [group.range.from, group.range.to] {
                    if !by_anchor.contains_key(&anchor) {
                        let values = aggregator
                            .undistributed_profit_and_loss(company, anchor, currency)?;
                        by_anchor.insert(anchor, values);
                    }
                }
            }

            let values: Vec<Decimal> = plan
                .cells
                .iter()
                .map(|cell| {
                    let group = &plan.groups[cell.group];
                    let start = by_anchor[&group.range.from].field(cell.field);
                    let end = by_anchor[&group.range.to].field(cell.field);
                    match group.semantic {
                        ColumnSemantic::Initial => start,
                        ColumnSemantic::End => end,
                        ColumnSemantic::Movement => end - start,
                    }
                })
                .collect();
            if values.iter().all(Decimal::is_zero) {
                continue;
            }

            let id = GenericLineId::from_frame(LineIdFrame::for_record(
                "undistributed",
                company.0.to_string(),
            ));
            let name = if options.companies.len() > 1 {
                format!(
                    "Undistributed Profits/Losses - {}",
                    self.store.company(company)?.name
                )
            } else {
                "Undistributed Profits/Losses".to_string()
            };
            let mut line = DisplayLine::new(&id, name, 0);
            line.columns = self.render_cells(&values, plan, options);
            lines.push(line);
        }
        Ok(lines)
    }
}

/// Re-derive the sub-domain a bucket path points at. `None` when any
/// frame no longer parses, which happens when ids outlive the data they
/// were minted from.
fn bucket_domain(base: &Domain, frames: &[LineIdFrame]) -> Option<Domain> {
    let mut domain = base.clone();
    for frame in frames {
        if frame.markup != Markup::None {
            return None;
        }
        let model = frame.model.as_deref()?;
        let record = frame.record.as_deref()?;
        let narrow = match model {
            "account" => EntryFilter {
                accounts: Some([finrep_core::AccountId(record.parse().ok()?)].into()),
                ..EntryFilter::default()
            },
            "partner" => EntryFilter {
                partners: Some([record.into()].into()),
                ..EntryFilter::default()
            },
            "journal" => EntryFilter {
                journals: Some([record.into()].into()),
                ..EntryFilter::default()
            },
            "tag" => EntryFilter {
                tags: Some([parse_signed_tag(record)?].into()),
                ..EntryFilter::default()
            },
            _ => return None,
        };
        domain = domain.narrowed(&narrow);
    }
    Some(domain)
}

fn parse_signed_tag(record: &str) -> Option<finrep_core::SignedTag> {
    let (sign, digits) = if let Some(rest) = record.strip_prefix('+') {
        (finrep_core::Sign::Plus, rest)
    } else if let Some(rest) = record.strip_prefix('-') {
        (finrep_core::Sign::Minus, rest)
    } else {
        return None;
    };
    let tag: u32 = digits.parse().ok()?;
    Some(finrep_core::SignedTag {
        tag: TagId(tag),
        sign,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use finrep_core::{
        Account, AccountId, AccountKind, AggregateField, Company, CompanyId, DateRange,
        EntryBuilder,
    };
    use finrep_ledger::MemoryLedger;
    use rust_decimal_macros::dec;

    use crate::definition::{ReportId, ReportSemantics};
    use crate::expand::GroupbyKey;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn march() -> DateRange {
        DateRange::new(date(2017, 3, 1), date(2017, 3, 31))
    }

    fn ledger() -> MemoryLedger {
        let mut ledger = MemoryLedger::new();
        ledger.add_company(Company::new(CompanyId(1), "US Co", "USD"));
        for (id, code, name, kind) in [
            (1, "101401", "Bank", AccountKind::Asset),
            (2, "400000", "Product Sales", AccountKind::Income),
            (3, "600000", "Expenses", AccountKind::Expense),
        ] {
            ledger.add_account(Account {
                id: AccountId(id),
                code: code.into(),
                name: name.to_string(),
                kind,
                company: CompanyId(1),
            });
        }
        for (id, day, account, debit, credit) in [
            (1, 5, 1, dec!(1000.00), dec!(0.00)),
            (2, 5, 2, dec!(0.00), dec!(1000.00)),
            (3, 20, 3, dec!(300.00), dec!(0.00)),
            (4, 20, 1, dec!(0.00), dec!(300.00)),
        ] {
            ledger.add_entry(
                EntryBuilder::new(id, date(2017, 3, day), CompanyId(1), AccountId(account))
                    .journal("MISC")
                    .label(format!("move {id}"))
                    .debit(debit)
                    .credit(credit)
                    .build(),
            );
        }
        ledger
    }

    fn profit_report() -> ReportDefinition {
        ReportDefinition {
            id: ReportId(1),
            name: "Profit and Loss".to_string(),
            country: None,
            semantics: ReportSemantics::default(),
            columns: vec![ColumnSpec::new("Balance", AggregateField::Balance)],
            lines: vec![
                ReportLineDefinition::new(
                    LineDefId(1),
                    "Income",
                    LineSource::Domain(Domain::account(AccountId(2))),
                )
                .with_code("INC")
                .with_groupby(GroupbyKey::Account),
                ReportLineDefinition::new(
                    LineDefId(2),
                    "Expenses",
                    LineSource::Domain(Domain::account(AccountId(3))),
                )
                .with_code("EXP")
                .with_sequence(1),
                ReportLineDefinition::new(
                    LineDefId(3),
                    "Net Profit",
                    LineSource::Formula("-INC.balance - EXP.balance".parse().unwrap()),
                )
                .with_sequence(2),
            ],
        }
    }

    fn options() -> Options {
        Options::builder(march())
            .companies([CompanyId(1)])
            .build()
            .unwrap()
    }

    #[test]
    fn test_render_resolves_domains_and_formulas() {
        let engine = ReportEngine::new(profit_report(), ledger()).unwrap();
        let lines = engine.get_lines(&options()).unwrap();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].name, "Income");
        assert_eq!(lines[0].columns[0].value, Some(dec!(-1000.00)));
        assert_eq!(lines[1].columns[0].value, Some(dec!(300.00)));
        // -(-1000) - 300
        assert_eq!(lines[2].columns[0].value, Some(dec!(700.00)));
        assert!(lines[0].unfoldable);
        assert!(!lines[0].unfolded);
    }

    #[test]
    fn test_unfold_splices_expansion_page() {
        let engine = ReportEngine::new(profit_report(), ledger()).unwrap();
        let options = Options::builder(march())
            .companies([CompanyId(1)])
            .unfold(GenericLineId::root(LineDefId(1)))
            .build()
            .unwrap();
        let lines = engine.get_lines(&options).unwrap();
        assert_eq!(lines[0].name, "Income");
        assert!(lines[0].unfolded);
        assert_eq!(lines[1].name, "400000 Product Sales");
        assert_eq!(lines[1].level, 1);
        assert_eq!(lines[1].columns[0].value, Some(dec!(-1000.00)));
    }

    #[test]
    fn test_unfold_all_matches_explicit_unfold() {
        let engine = ReportEngine::new(profit_report(), ledger()).unwrap();
        let explicit = Options::builder(march())
            .companies([CompanyId(1)])
            .unfold(GenericLineId::root(LineDefId(1)))
            .build()
            .unwrap();
        let all = Options::builder(march())
            .companies([CompanyId(1)])
            .unfold_all(true)
            .build()
            .unwrap();
        let explicit_lines = engine.get_lines(&explicit).unwrap();
        let all_lines = engine.get_lines(&all).unwrap();
        for line in &explicit_lines {
            let twin = all_lines.iter().find(|other| other.id == line.id).unwrap();
            assert_eq!(twin.columns, line.columns, "line {}", line.name);
        }
    }

    #[test]
    fn test_title_section_total_sums_children() {
        let mut definition = profit_report();
        definition.lines = vec![
            ReportLineDefinition::new(LineDefId(10), "Revenue", LineSource::Title).with_total(),
            ReportLineDefinition::new(
                LineDefId(11),
                "Sales",
                LineSource::Domain(Domain::account(AccountId(2))),
            )
            .with_parent(LineDefId(10)),
        ];
        let engine = ReportEngine::new(definition, ledger()).unwrap();
        let lines = engine.get_lines(&options()).unwrap();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].columns[0].value, None);
        assert_eq!(lines[1].level, 1);
        assert_eq!(lines[2].name, "Total Revenue");
        assert_eq!(lines[2].level, 0);
        assert_eq!(lines[2].columns[0].value, Some(dec!(-1000.00)));
    }

    #[test]
    fn test_expanded_lines_from_encoded_ids() {
        let engine = ReportEngine::new(profit_report(), ledger()).unwrap();
        let options = options();
        let root = GenericLineId::root(LineDefId(1)).encode();
        let buckets = engine.get_expanded_lines(&options, &root, None).unwrap();
        assert_eq!(buckets.len(), 1);
        assert!(buckets[0].unfoldable);

        let entries = engine
            .get_expanded_lines(&options, &buckets[0].id, None)
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "move 2");
        assert_eq!(entries[0].level, 2);
    }

    #[test]
    fn test_stale_ids_degrade_to_empty_pages() {
        let engine = ReportEngine::new(profit_report(), ledger()).unwrap();
        let options = options();
        for stale in [
            "not a line id",
            &GenericLineId::root(LineDefId(99)).encode(),
            &GenericLineId::root(LineDefId(1))
                .child(LineIdFrame::for_record("warehouse", "3"))
                .encode(),
        ] {
            let lines = engine.get_expanded_lines(&options, stale, None).unwrap();
            assert!(lines.is_empty(), "expected empty page for {stale:?}");
        }
    }

    #[test]
    fn test_undistributed_line_for_balance_chain() {
        let mut ledger = ledger();
        // Prior-year profit that must carry over outside income lines.
        ledger.add_entry(
            EntryBuilder::new(9, date(2016, 6, 1), CompanyId(1), AccountId(2))
                .credit(dec!(500.00))
                .build(),
        );
        let mut definition = profit_report();
        definition.semantics = ReportSemantics {
            balance_chain: true,
            progressive_balance: true,
        };
        let engine = ReportEngine::new(definition, ledger).unwrap();
        let lines = engine.get_lines(&options()).unwrap();
        let undistributed = lines
            .iter()
            .find(|line| line.name == "Undistributed Profits/Losses")
            .unwrap();
        // Initial, movement, end: the 2016 profit sits before the 2017
        // fiscal year on both cuts.
        assert_eq!(undistributed.columns[0].value, Some(dec!(-500.00)));
        assert_eq!(undistributed.columns[1].value, Some(dec!(0.00)));
        assert_eq!(undistributed.columns[2].value, Some(dec!(-500.00)));
    }

    #[test]
    fn test_search_never_changes_totals() {
        let engine = ReportEngine::new(profit_report(), ledger()).unwrap();
        let plain = engine.get_lines(&options()).unwrap();
        let searched = engine
            .get_lines(
                &Options::builder(march())
                    .companies([CompanyId(1)])
                    .search("move 3")
                    .build()
                    .unwrap(),
            )
            .unwrap();
        for (a, b) in plain.iter().zip(&searched) {
            assert_eq!(a.columns, b.columns, "line {}", a.name);
        }
    }
}
