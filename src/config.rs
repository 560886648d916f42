use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::Deserialize;

use crate::model::*;
use crate::store::{RowStore, StoreError};

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    /// Unset tables or field references, by slot name.
    Missing { run: String, slots: Vec<String> },
    Outputs { run: String, reason: &'static str },
    UnknownField { run: String, table: String, reference: String },
    Store { run: String, table: String, source: StoreError },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "cannot read run file: {e}"),
            ConfigError::Parse(e) => write!(f, "invalid run file: {e}"),
            ConfigError::Missing { run, slots } => {
                write!(f, "run {run}: not configured: {}", slots.join(", "))
            }
            ConfigError::Outputs { run, reason } => write!(f, "run {run}: {reason}"),
            ConfigError::UnknownField { run, table, reference } => {
                write!(f, "run {run}: table {table} has no field {reference:?}")
            }
            ConfigError::Store { run, table, source } => {
                write!(f, "run {run}: cannot list fields of {table}: {source}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ── Run file ─────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub runs: Vec<RunConfig>,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(ConfigError::Parse)
    }

    /// Runs to execute. `only` restricts them by name, keeping file order.
    pub fn selected<'a>(&'a self, only: Option<&'a [String]>) -> impl Iterator<Item = &'a RunConfig> {
        self.runs
            .iter()
            .filter(move |r| only.is_none_or(|names| names.iter().any(|n| n == r.name())))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunConfig {
    Availability(AvailabilityRun),
    Usage(UsageRun),
    Idle(IdleRun),
}

#[derive(Debug, Clone, Deserialize)]
pub struct AvailabilityRun {
    pub name: String,
    #[serde(default)]
    pub case: Case,
    pub schedule: ScheduleBinding,
    #[serde(default)]
    pub catalog: Option<CatalogBinding>,
    pub analysis: WindowTable,
    pub outputs: Vec<Output>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UsageRun {
    pub name: String,
    pub events: EventTable,
    pub analysis: UsageAnalysis,
    pub categories: Vec<UsageCategory>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdleRun {
    pub name: String,
    pub total: WindowTable,
    pub occupied: WindowTable,
    pub idle: WindowTable,
    #[serde(default)]
    pub match_tolerance_ms: Ms,
    pub categories: Vec<IdleCategory>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ScheduleBinding {
    pub table: String,
    pub time_field: String,
    pub resources_field: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CatalogBinding {
    pub table: String,
    pub id_field: String,
    pub category_field: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WindowTable {
    pub table: String,
    pub start_field: String,
    pub end_field: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Output {
    pub category: String,
    pub list_field: String,
    pub count_field: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EventTable {
    pub table: String,
    pub name_field: String,
    pub start_field: String,
    pub end_field: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UsageAnalysis {
    pub table: String,
    pub start_field: String,
    pub end_field: String,
    pub event_list_field: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UsageCategory {
    pub category: String,
    pub case: Case,
    pub event_field: String,
    pub list_field: String,
    pub count_field: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct IdleCategory {
    pub category: String,
    pub case: Case,
    pub total_field: String,
    pub occupied_field: String,
    pub list_field: String,
    pub count_field: String,
}

impl UsageRun {
    pub fn category_specs(&self) -> Vec<CategorySpec> {
        self.categories
            .iter()
            .map(|c| CategorySpec::new(c.category.clone(), c.case))
            .collect()
    }
}

impl IdleRun {
    pub fn category_specs(&self) -> Vec<CategorySpec> {
        self.categories
            .iter()
            .map(|c| CategorySpec::new(c.category.clone(), c.case))
            .collect()
    }
}

/// One configurable field reference: owning table, slot name and the
/// reference itself, rewritten in place to a field id on resolution.
struct Slot<'a> {
    table: String,
    role: String,
    field: &'a mut String,
}

fn slot<'a>(table: &str, role: impl Into<String>, field: &'a mut String) -> Slot<'a> {
    Slot {
        table: table.to_string(),
        role: role.into(),
        field,
    }
}

impl RunConfig {
    pub fn name(&self) -> &str {
        match self {
            RunConfig::Availability(r) => &r.name,
            RunConfig::Usage(r) => &r.name,
            RunConfig::Idle(r) => &r.name,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            RunConfig::Availability(_) => "availability",
            RunConfig::Usage(_) => "usage",
            RunConfig::Idle(_) => "idle",
        }
    }

    /// Output category names, in configuration order.
    fn categories(&self) -> Vec<&str> {
        match self {
            RunConfig::Availability(r) => r.outputs.iter().map(|o| o.category.trim()).collect(),
            RunConfig::Usage(r) => r.categories.iter().map(|c| c.category.trim()).collect(),
            RunConfig::Idle(r) => r.categories.iter().map(|c| c.category.trim()).collect(),
        }
    }

    fn tables(&self) -> Vec<(&'static str, &str)> {
        match self {
            RunConfig::Availability(r) => {
                let mut tables = vec![("schedule.table", r.schedule.table.as_str())];
                if let Some(catalog) = &r.catalog {
                    tables.push(("catalog.table", catalog.table.as_str()));
                }
                tables.push(("analysis.table", r.analysis.table.as_str()));
                tables
            }
            RunConfig::Usage(r) => vec![
                ("events.table", r.events.table.as_str()),
                ("analysis.table", r.analysis.table.as_str()),
            ],
            RunConfig::Idle(r) => vec![
                ("total.table", r.total.table.as_str()),
                ("occupied.table", r.occupied.table.as_str()),
                ("idle.table", r.idle.table.as_str()),
            ],
        }
    }

    fn slots(&mut self) -> Vec<Slot<'_>> {
        match self {
            RunConfig::Availability(r) => {
                let s = &mut r.schedule;
                let mut slots = vec![
                    slot(&s.table, "schedule.time_field", &mut s.time_field),
                    slot(&s.table, "schedule.resources_field", &mut s.resources_field),
                ];
                if let Some(c) = &mut r.catalog {
                    slots.push(slot(&c.table, "catalog.id_field", &mut c.id_field));
                    slots.push(slot(&c.table, "catalog.category_field", &mut c.category_field));
                }
                let a = &mut r.analysis;
                slots.push(slot(&a.table, "analysis.start_field", &mut a.start_field));
                slots.push(slot(&a.table, "analysis.end_field", &mut a.end_field));
                for (i, o) in r.outputs.iter_mut().enumerate() {
                    slots.push(slot(&a.table, format!("outputs[{i}].list_field"), &mut o.list_field));
                    slots.push(slot(&a.table, format!("outputs[{i}].count_field"), &mut o.count_field));
                }
                slots
            }
            RunConfig::Usage(r) => {
                let e = &mut r.events;
                let a = &mut r.analysis;
                let mut slots = vec![
                    slot(&e.table, "events.name_field", &mut e.name_field),
                    slot(&e.table, "events.start_field", &mut e.start_field),
                    slot(&e.table, "events.end_field", &mut e.end_field),
                    slot(&a.table, "analysis.start_field", &mut a.start_field),
                    slot(&a.table, "analysis.end_field", &mut a.end_field),
                    slot(&a.table, "analysis.event_list_field", &mut a.event_list_field),
                ];
                for (i, c) in r.categories.iter_mut().enumerate() {
                    slots.push(slot(&e.table, format!("categories[{i}].event_field"), &mut c.event_field));
                    slots.push(slot(&a.table, format!("categories[{i}].list_field"), &mut c.list_field));
                    slots.push(slot(&a.table, format!("categories[{i}].count_field"), &mut c.count_field));
                }
                slots
            }
            RunConfig::Idle(r) => {
                let (t, o, d) = (&mut r.total, &mut r.occupied, &mut r.idle);
                let mut slots = vec![
                    slot(&t.table, "total.start_field", &mut t.start_field),
                    slot(&t.table, "total.end_field", &mut t.end_field),
                    slot(&o.table, "occupied.start_field", &mut o.start_field),
                    slot(&o.table, "occupied.end_field", &mut o.end_field),
                    slot(&d.table, "idle.start_field", &mut d.start_field),
                    slot(&d.table, "idle.end_field", &mut d.end_field),
                ];
                for (i, c) in r.categories.iter_mut().enumerate() {
                    slots.push(slot(&t.table, format!("categories[{i}].total_field"), &mut c.total_field));
                    slots.push(slot(&o.table, format!("categories[{i}].occupied_field"), &mut c.occupied_field));
                    slots.push(slot(&d.table, format!("categories[{i}].list_field"), &mut c.list_field));
                    slots.push(slot(&d.table, format!("categories[{i}].count_field"), &mut c.count_field));
                }
                slots
            }
        }
    }

    /// Check that every table and field reference is set and that the outputs
    /// are consistent. All missing slots are reported together.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        let run = self.name().to_string();
        let mut missing: Vec<String> = self
            .tables()
            .into_iter()
            .filter(|(_, t)| t.trim().is_empty())
            .map(|(role, _)| role.to_string())
            .collect();
        missing.extend(
            self.slots()
                .into_iter()
                .filter(|s| s.field.trim().is_empty())
                .map(|s| s.role),
        );
        if !missing.is_empty() {
            return Err(ConfigError::Missing { run, slots: missing });
        }

        let duplicate = has_duplicates(self.categories());
        let reason = match self {
            RunConfig::Availability(r) if r.outputs.is_empty() => Some("no outputs configured"),
            RunConfig::Availability(r) if r.catalog.is_none() && r.outputs.len() != 1 => {
                Some("a run without a catalog takes exactly one output")
            }
            RunConfig::Usage(r) if r.categories.is_empty() => Some("no categories configured"),
            RunConfig::Idle(r) if r.categories.is_empty() => Some("no categories configured"),
            RunConfig::Idle(r) if r.match_tolerance_ms < 0 => Some("match_tolerance_ms must not be negative"),
            _ if duplicate => Some("duplicate category"),
            _ => None,
        };
        match reason {
            Some(reason) => Err(ConfigError::Outputs { run, reason }),
            None => Ok(()),
        }
    }

    /// Validate, then rewrite every field reference to a field id of its table.
    /// Each table's field list is fetched once.
    pub async fn resolve<S: RowStore + ?Sized>(&mut self, store: &S) -> Result<(), ConfigError> {
        self.validate()?;
        let run = self.name().to_string();
        let mut metas: HashMap<String, Vec<FieldMeta>> = HashMap::new();
        for slot in self.slots() {
            if !metas.contains_key(&slot.table) {
                let fields = store
                    .list_fields(&slot.table)
                    .await
                    .map_err(|source| ConfigError::Store {
                        run: run.clone(),
                        table: slot.table.clone(),
                        source,
                    })?;
                metas.insert(slot.table.clone(), fields);
            }
            let fields = metas.get(&slot.table).map(Vec::as_slice).unwrap_or_default();
            let Some(id) = resolve_field(fields, slot.field) else {
                return Err(ConfigError::UnknownField {
                    run,
                    table: slot.table,
                    reference: slot.field.clone(),
                });
            };
            if id != slot.field.as_str() {
                tracing::debug!("run {run}: {} {:?} resolved to {id}", slot.role, slot.field);
            }
            *slot.field = id.to_string();
        }
        Ok(())
    }
}

fn has_duplicates(names: Vec<&str>) -> bool {
    let mut seen = HashSet::new();
    names.into_iter().any(|name| !seen.insert(name))
}

/// A reference matches a field id first, then a field name (trimmed).
pub fn resolve_field<'a>(fields: &'a [FieldMeta], reference: &str) -> Option<&'a str> {
    let reference = reference.trim();
    fields
        .iter()
        .find(|f| f.id == reference)
        .or_else(|| fields.iter().find(|f| f.name.trim() == reference))
        .map(|f| f.id.as_str())
}
