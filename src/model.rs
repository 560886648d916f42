use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

/// Unix milliseconds, the only time type.
pub type Ms = i64;

pub type RowId = String;
pub type FieldId = String;

/// One row as read from a table: field id → stored value.
pub type Row = HashMap<FieldId, RawValue>;

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: Ms,
    pub end: Ms,
}

impl Span {
    pub fn new(start: Ms, end: Ms) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    pub fn duration_ms(&self) -> Ms {
        self.end - self.start
    }

    /// Strict overlap: spans that only touch at a boundary do not overlap.
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Both bounds within `tolerance` ms of `other`'s. Zero means exact equality.
    pub fn matches(&self, other: &Span, tolerance: Ms) -> bool {
        (self.start - other.start).abs() <= tolerance && (self.end - other.end).abs() <= tolerance
    }
}

// ── Raw field values ─────────────────────────────────────────────

/// One rich-text run. Segments without text count as empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl Segment {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: Some(text.into()) }
    }
}

/// A field value exactly as the row store holds it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    #[default]
    Null,
    Number(serde_json::Number),
    Text(String),
    Segments(Vec<Segment>),
    Object(Segment),
    /// Any other shape. Parses as nothing.
    Other(serde_json::Value),
}

impl RawValue {
    pub fn text(s: impl Into<String>) -> Self {
        RawValue::Text(s.into())
    }

    pub fn count(n: usize) -> Self {
        RawValue::Number(serde_json::Number::from(n as u64))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, RawValue::Null)
    }
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        RawValue::Text(s.to_string())
    }
}

impl From<Ms> for RawValue {
    fn from(ms: Ms) -> Self {
        RawValue::Number(ms.into())
    }
}

/// Field metadata, used only to resolve field references by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMeta {
    pub id: FieldId,
    pub name: String,
}

// ── Identifier normalization ─────────────────────────────────────

/// How identifiers of a category are compared. Person names are exact;
/// device and account identifiers are case-insensitive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Case {
    #[default]
    Exact,
    Lower,
}

impl Case {
    pub fn normalize(&self, id: &str) -> String {
        match self {
            Case::Exact => id.to_string(),
            Case::Lower => id.to_lowercase(),
        }
    }
}

/// A named output category and the normalization its identifiers use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySpec {
    pub name: String,
    #[serde(default)]
    pub case: Case,
}

impl CategorySpec {
    pub fn new(name: impl Into<String>, case: Case) -> Self {
        Self { name: name.into(), case }
    }
}

// ── Engine inputs ────────────────────────────────────────────────

/// "These resources are available starting at `timestamp`."
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub id: RowId,
    pub timestamp: Ms,
    pub resources: RawValue,
}

/// A scheduled event (e.g. a meeting) holding resources for its whole span.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    pub id: RowId,
    pub name: Option<String>,
    pub span: Span,
    /// Category name → that category's raw resource list.
    pub resources: HashMap<String, RawValue>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub identifier: String,
    pub category: String,
}

/// A previously written result row: its window and per-category lists.
/// `window` is `None` when the row's bounds are missing or unparseable,
/// so it can never be matched.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRecord {
    pub row_id: RowId,
    pub window: Option<Span>,
    pub lists: HashMap<String, RawValue>,
}

// ── ResourceSet ──────────────────────────────────────────────────

/// Set of normalized identifiers that remembers first-insertion order,
/// so written lists are deterministic. Equality ignores order.
#[derive(Debug, Clone, Default)]
pub struct ResourceSet {
    order: Vec<String>,
    members: HashSet<String>,
}

impl ResourceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if the identifier was already present.
    pub fn insert(&mut self, id: String) -> bool {
        if self.members.contains(&id) {
            return false;
        }
        self.members.insert(id.clone());
        self.order.push(id);
        true
    }

    pub fn contains(&self, id: &str) -> bool {
        self.members.contains(id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        let members = &mut self.members;
        self.order.retain(|id| {
            let k = keep(id);
            if !k {
                members.remove(id);
            }
            k
        });
    }

    pub fn into_vec(self) -> Vec<String> {
        self.order
    }
}

impl PartialEq for ResourceSet {
    fn eq(&self, other: &Self) -> bool {
        self.members == other.members
    }
}

impl Eq for ResourceSet {}

impl FromIterator<String> for ResourceSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        let mut set = ResourceSet::new();
        set.extend(iter);
        set
    }
}

impl Extend<String> for ResourceSet {
    fn extend<I: IntoIterator<Item = String>>(&mut self, iter: I) {
        for id in iter {
            self.insert(id);
        }
    }
}

// ── Engine outputs ───────────────────────────────────────────────

/// Separator for written resource lists.
pub const LIST_SEPARATOR: &str = ", ";

/// Separator for the written list of overlapping event names.
pub const EVENT_LIST_SEPARATOR: &str = "; ";

/// One category's result for one record: written as a list field plus a count
/// field. The count is always `members.len()`, never stored separately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryResult {
    pub category: String,
    pub members: Vec<String>,
}

impl CategoryResult {
    pub fn new(category: impl Into<String>, members: Vec<String>) -> Self {
        Self {
            category: category.into(),
            members,
        }
    }

    pub fn count(&self) -> usize {
        self.members.len()
    }

    pub fn list(&self) -> String {
        self.members.join(LIST_SEPARATOR)
    }
}
