//! Generic line identity codec.
//!
//! Every display line carries a stable string id built from an ordered
//! list of frames, rooted at the id of the report line definition it
//! hangs under. Frames are joined by `|`, fields within a frame by `~`,
//! and both delimiters are percent-escaped inside values, so arbitrary
//! record keys survive a round trip. Parsing is total: malformed or
//! stale input yields `None`, never a panic.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use finrep_core::InternedStr;

use crate::definition::LineDefId;

/// Marker distinguishing synthetic lines from plain record lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Markup {
    /// An ordinary line.
    #[default]
    None,
    /// A section total line.
    Total,
    /// A synthetic initial-balance line inside a bucket.
    Initial,
    /// A "load more" continuation line carrying the next page offset.
    LoadMore(usize),
}

impl Markup {
    fn encode(self) -> String {
        match self {
            Self::None => String::new(),
            Self::Total => "total".to_string(),
            Self::Initial => "initial".to_string(),
            Self::LoadMore(offset) => format!("loadmore:{offset}"),
        }
    }

    fn parse(text: &str) -> Option<Self> {
        match text {
            "" => Some(Self::None),
            "total" => Some(Self::Total),
            "initial" => Some(Self::Initial),
            _ => {
                let offset = text.strip_prefix("loadmore:")?;
                offset.parse().ok().map(Self::LoadMore)
            }
        }
    }
}

/// One frame of a generic line id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct LineIdFrame {
    /// The kind of record the frame points at ("account", "partner", ...).
    pub model: Option<InternedStr>,
    /// The record key within the model.
    pub record: Option<String>,
    /// Synthetic-line marker.
    pub markup: Markup,
    /// The group-by key this frame expands under.
    pub groupby: Option<InternedStr>,
}

impl LineIdFrame {
    /// A frame pointing at a record of a model.
    #[must_use]
    pub fn for_record(model: impl Into<InternedStr>, record: impl Into<String>) -> Self {
        Self {
            model: Some(model.into()),
            record: Some(record.into()),
            ..Self::default()
        }
    }

    /// A pure markup frame (totals, initial balances, load-more).
    #[must_use]
    pub fn for_markup(markup: Markup) -> Self {
        Self {
            markup,
            ..Self::default()
        }
    }

    /// Attach the group-by key the frame expands under.
    #[must_use]
    pub fn with_groupby(mut self, groupby: impl Into<InternedStr>) -> Self {
        self.groupby = Some(groupby.into());
        self
    }

    fn encode(&self) -> String {
        let model = self.model.as_deref().unwrap_or("");
        let record = self.record.as_deref().unwrap_or("");
        let groupby = self.groupby.as_deref().unwrap_or("");
        format!(
            "{}~{}~{}~{}",
            escape(model),
            escape(record),
            self.markup.encode(),
            escape(groupby),
        )
    }

    fn parse(text: &str) -> Option<Self> {
        let mut fields = text.split('~');
        let model = fields.next()?;
        let record = fields.next()?;
        let markup = fields.next()?;
        let groupby = fields.next()?;
        if fields.next().is_some() {
            return None;
        }
        Some(Self {
            model: non_empty(&unescape(model)).map(InternedStr::new),
            record: non_empty(&unescape(record)),
            markup: Markup::parse(markup)?,
            groupby: non_empty(&unescape(groupby)).map(InternedStr::new),
        })
    }
}

/// Stable identity of one display line.
///
/// The root frame carries the globally unique line definition id, so
/// identical records under different reports never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GenericLineId {
    frames: Vec<LineIdFrame>,
}

impl GenericLineId {
    /// Model name of the root definition-line frame.
    const LINE_MODEL: &'static str = "line";

    /// The id rooted at a report line definition.
    #[must_use]
    pub fn root(line: LineDefId) -> Self {
        Self {
            frames: vec![LineIdFrame::for_record(
                Self::LINE_MODEL,
                line.0.to_string(),
            )],
        }
    }

    /// An id rooted at an arbitrary frame, for synthetic lines that hang
    /// under no definition line.
    #[must_use]
    pub fn from_frame(frame: LineIdFrame) -> Self {
        Self {
            frames: vec![frame],
        }
    }

    /// Append a frame, yielding the child id.
    #[must_use]
    pub fn child(&self, frame: LineIdFrame) -> Self {
        let mut frames = self.frames.clone();
        frames.push(frame);
        Self { frames }
    }

    /// The id with the last frame dropped, or `None` at the root.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.frames.len() <= 1 {
            return None;
        }
        Some(Self {
            frames: self.frames[..self.frames.len() - 1].to_vec(),
        })
    }

    /// The frames, root first.
    #[must_use]
    pub fn frames(&self) -> &[LineIdFrame] {
        &self.frames
    }

    /// The last frame.
    #[must_use]
    pub fn last(&self) -> Option<&LineIdFrame> {
        self.frames.last()
    }

    /// The definition line this id is rooted at, if the root frame still
    /// points at one.
    #[must_use]
    pub fn definition_line(&self) -> Option<LineDefId> {
        let root = self.frames.first()?;
        if root.model.as_deref() != Some(Self::LINE_MODEL) {
            return None;
        }
        root.record.as_deref()?.parse().ok().map(LineDefId)
    }

    /// Encode into the wire string.
    #[must_use]
    pub fn encode(&self) -> String {
        self.frames
            .iter()
            .map(LineIdFrame::encode)
            .collect::<Vec<_>>()
            .join("|")
    }

    /// Decode a wire string. Total: any malformed input yields `None`.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        if text.is_empty() {
            return None;
        }
        let frames = text
            .split('|')
            .map(LineIdFrame::parse)
            .collect::<Option<Vec<_>>>()?;
        Some(Self { frames })
    }
}

impl fmt::Display for GenericLineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl Serialize for GenericLineId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encode())
    }
}

impl<'de> Deserialize<'de> for GenericLineId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text)
            .ok_or_else(|| serde::de::Error::custom(format!("malformed line id '{text}'")))
    }
}

fn escape(value: &str) -> String {
    value
        .replace('%', "%25")
        .replace('~', "%7E")
        .replace('|', "%7C")
}

// The replacement order mirrors escape() in reverse so that escaped
// percent signs never re-form a delimiter sequence.
fn unescape(value: &str) -> String {
    value
        .replace("%7C", "|")
        .replace("%7E", "~")
        .replace("%25", "%")
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
