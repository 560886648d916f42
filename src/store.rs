use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::model::*;

#[derive(Debug)]
pub enum StoreError {
    TableNotFound(String),
    RowNotFound { table: String, row: RowId },
    Io(std::io::Error),
    Format(serde_json::Error),
    Backend(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::TableNotFound(t) => write!(f, "table not found: {t}"),
            StoreError::RowNotFound { table, row } => write!(f, "row {row} not found in table {table}"),
            StoreError::Io(e) => write!(f, "io error: {e}"),
            StoreError::Format(e) => write!(f, "malformed table data: {e}"),
            StoreError::Backend(msg) => write!(f, "store error: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io(e)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Format(e)
    }
}

/// The engine's only boundary: a table store addressed by table, row and field.
///
/// `list_row_ids` must return every row; implementations drain any pagination
/// before returning.
#[async_trait]
pub trait RowStore: Send + Sync {
    async fn list_fields(&self, table: &str) -> Result<Vec<FieldMeta>, StoreError>;

    async fn list_row_ids(&self, table: &str) -> Result<Vec<RowId>, StoreError>;

    async fn read_row(&self, table: &str, row: &str) -> Result<Row, StoreError>;

    /// Absent fields read as `RawValue::Null`.
    async fn read_field(&self, table: &str, field: &str, row: &str) -> Result<RawValue, StoreError>;

    async fn write_field(&self, table: &str, field: &str, row: &str, value: RawValue) -> Result<(), StoreError>;
}

// ── In-memory store ──────────────────────────────────────

#[derive(Debug, Clone, Default)]
struct TableState {
    fields: Vec<FieldMeta>,
    /// Row ids in insertion order.
    order: Vec<RowId>,
    rows: HashMap<RowId, Row>,
}

/// On-disk layout of a base file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct BaseFile {
    tables: BTreeMap<String, TableFile>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct TableFile {
    #[serde(default)]
    fields: Vec<FieldMeta>,
    #[serde(default)]
    rows: Vec<RowFile>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RowFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<RowId>,
    #[serde(default)]
    fields: BTreeMap<FieldId, RawValue>,
}

/// Tables held in memory, loadable from and savable to a JSON base file.
pub struct InMemoryStore {
    tables: DashMap<String, TableState>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            tables: DashMap::new(),
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), StoreError> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Rows without an id get a fresh ULID. Tables that declare no fields get
    /// one per field key seen in their rows, named after the key.
    pub fn from_json(text: &str) -> Result<Self, StoreError> {
        let base: BaseFile = serde_json::from_str(text)?;
        let store = Self::new();
        for (name, table) in base.tables {
            let mut fields = table.fields;
            for row in &table.rows {
                for key in row.fields.keys() {
                    if !fields.iter().any(|f| &f.id == key) {
                        fields.push(FieldMeta {
                            id: key.clone(),
                            name: key.clone(),
                        });
                    }
                }
            }
            store.create_table(&name, fields);
            for row in table.rows {
                let id = row.id.unwrap_or_else(|| Ulid::new().to_string());
                store.insert_row_with_id(&name, id, row.fields.into_iter().collect());
            }
        }
        Ok(store)
    }

    pub fn to_json(&self) -> Result<String, StoreError> {
        let mut base = BaseFile::default();
        for entry in self.tables.iter() {
            let state = entry.value();
            let rows = state
                .order
                .iter()
                .map(|id| RowFile {
                    id: Some(id.clone()),
                    fields: state
                        .rows
                        .get(id)
                        .map(|r| r.clone().into_iter().collect())
                        .unwrap_or_default(),
                })
                .collect();
            base.tables.insert(
                entry.key().clone(),
                TableFile {
                    fields: state.fields.clone(),
                    rows,
                },
            );
        }
        Ok(serde_json::to_string_pretty(&base)?)
    }

    pub fn create_table(&self, table: &str, fields: Vec<FieldMeta>) {
        self.tables.insert(
            table.to_string(),
            TableState {
                fields,
                ..TableState::default()
            },
        );
    }

    /// Insert a row under a fresh ULID, creating the table if needed.
    pub fn insert_row(&self, table: &str, row: Row) -> RowId {
        let id = Ulid::new().to_string();
        self.insert_row_with_id(table, id.clone(), row);
        id
    }

    pub fn insert_row_with_id(&self, table: &str, id: RowId, row: Row) {
        let mut state = self.tables.entry(table.to_string()).or_default();
        if state.rows.insert(id.clone(), row).is_none() {
            state.order.push(id);
        }
    }

    /// Current value of one cell, if the row exists.
    pub fn value(&self, table: &str, row: &str, field: &str) -> Option<RawValue> {
        let state = self.tables.get(table)?;
        let row = state.rows.get(row)?;
        Some(row.get(field).cloned().unwrap_or_default())
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.tables.get(table).map_or(0, |t| t.order.len())
    }
}

#[async_trait]
impl RowStore for InMemoryStore {
    async fn list_fields(&self, table: &str) -> Result<Vec<FieldMeta>, StoreError> {
        let state = self
            .tables
            .get(table)
            .ok_or_else(|| StoreError::TableNotFound(table.to_string()))?;
        Ok(state.fields.clone())
    }

    async fn list_row_ids(&self, table: &str) -> Result<Vec<RowId>, StoreError> {
        let state = self
            .tables
            .get(table)
            .ok_or_else(|| StoreError::TableNotFound(table.to_string()))?;
        Ok(state.order.clone())
    }

    async fn read_row(&self, table: &str, row: &str) -> Result<Row, StoreError> {
        let state = self
            .tables
            .get(table)
            .ok_or_else(|| StoreError::TableNotFound(table.to_string()))?;
        state.rows.get(row).cloned().ok_or_else(|| StoreError::RowNotFound {
            table: table.to_string(),
            row: row.to_string(),
        })
    }

    async fn read_field(&self, table: &str, field: &str, row: &str) -> Result<RawValue, StoreError> {
        let values = self.read_row(table, row).await?;
        Ok(values.get(field).cloned().unwrap_or_default())
    }

    async fn write_field(&self, table: &str, field: &str, row: &str, value: RawValue) -> Result<(), StoreError> {
        let mut state = self
            .tables
            .get_mut(table)
            .ok_or_else(|| StoreError::TableNotFound(table.to_string()))?;
        let values = state.rows.get_mut(row).ok_or_else(|| StoreError::RowNotFound {
            table: table.to_string(),
            row: row.to_string(),
        })?;
        values.insert(field.to_string(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = r#"{
        "tables": {
            "staff": {
                "fields": [{"id": "fld_name", "name": "Name"}, {"id": "fld_level", "name": "Level"}],
                "rows": [
                    {"id": "rec_b", "fields": {"fld_name": "Bo", "fld_level": [{"text": "junior"}]}},
                    {"id": "rec_a", "fields": {"fld_name": {"text": "Ann"}}}
                ]
            },
            "loose": {
                "rows": [{"fields": {"when": 1714521600000}}]
            }
        }
    }"#;

    #[tokio::test]
    async fn load_preserves_row_order() {
        let store = InMemoryStore::from_json(BASE).unwrap();
        let ids = store.list_row_ids("staff").await.unwrap();
        assert_eq!(ids, vec!["rec_b", "rec_a"]);
    }

    #[tokio::test]
    async fn rows_without_ids_get_ulids() {
        let store = InMemoryStore::from_json(BASE).unwrap();
        let ids = store.list_row_ids("loose").await.unwrap();
        assert_eq!(ids.len(), 1);
        assert!(Ulid::from_string(&ids[0]).is_ok());
    }

    #[tokio::test]
    async fn undeclared_fields_are_derived_from_rows() {
        let store = InMemoryStore::from_json(BASE).unwrap();
        let fields = store.list_fields("loose").await.unwrap();
        assert_eq!(fields, vec![FieldMeta { id: "when".into(), name: "when".into() }]);
    }

    #[tokio::test]
    async fn read_field_shapes_and_absent_fields() {
        let store = InMemoryStore::from_json(BASE).unwrap();
        let level = store.read_field("staff", "fld_level", "rec_b").await.unwrap();
        assert_eq!(level, RawValue::Segments(vec![Segment::new("junior")]));
        let missing = store.read_field("staff", "fld_level", "rec_a").await.unwrap();
        assert!(missing.is_null());
    }

    #[tokio::test]
    async fn unknown_table_and_row_are_errors() {
        let store = InMemoryStore::from_json(BASE).unwrap();
        assert!(matches!(
            store.list_row_ids("nope").await,
            Err(StoreError::TableNotFound(_))
        ));
        assert!(matches!(
            store.read_row("staff", "rec_zzz").await,
            Err(StoreError::RowNotFound { .. })
        ));
        assert!(store
            .write_field("staff", "fld_name", "rec_zzz", RawValue::Null)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn write_then_read_and_round_trip_json() {
        let store = InMemoryStore::from_json(BASE).unwrap();
        store
            .write_field("staff", "fld_count", "rec_a", RawValue::count(3))
            .await
            .unwrap();
        assert_eq!(store.value("staff", "rec_a", "fld_count"), Some(RawValue::count(3)));

        let reloaded = InMemoryStore::from_json(&store.to_json().unwrap()).unwrap();
        assert_eq!(reloaded.value("staff", "rec_a", "fld_count"), Some(RawValue::count(3)));
        assert_eq!(reloaded.list_row_ids("staff").await.unwrap(), vec!["rec_b", "rec_a"]);
    }

    #[test]
    fn insert_row_creates_table() {
        let store = InMemoryStore::new();
        let id = store.insert_row("t", Row::from([("f".to_string(), RawValue::from("x"))]));
        assert_eq!(store.row_count("t"), 1);
        assert_eq!(store.value("t", &id, "f"), Some(RawValue::from("x")));
        assert_eq!(store.value("t", &id, "g"), Some(RawValue::Null));
    }
}
