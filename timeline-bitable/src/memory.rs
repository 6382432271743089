//! In-memory [`TableSource`] used for local development, the demo CLI and
//! tests.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::rc::Rc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use timeline_core::{FieldKind, FieldMeta};

use crate::source::{FieldValue, PageRequest, RecordIdPage, SourceError, TableSource};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MemoryTable {
    pub table_id: String,
    #[serde(default)]
    pub table_name: String,
    #[serde(default)]
    pub fields: Vec<FieldMeta>,
    #[serde(default)]
    pub records: Vec<MemoryRecord>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MemoryRecord {
    pub record_id: String,
    /// Cell values keyed by field id.
    #[serde(default)]
    pub values: BTreeMap<String, FieldValue>,
}

impl MemoryRecord {
    pub fn new(record_id: impl Into<String>) -> Self {
        Self {
            record_id: record_id.into(),
            values: BTreeMap::new(),
        }
    }

    pub fn with(mut self, field_id: impl Into<String>, value: FieldValue) -> Self {
        self.values.insert(field_id.into(), value);
        self
    }
}

#[derive(Debug, Deserialize)]
struct MemoryFixture {
    tables: Vec<MemoryTable>,
}

/// Serves tables from memory. Records are listed in insertion order and the
/// page token is the offset of the next record.
#[derive(Debug, Default)]
pub struct MemoryTableSource {
    tables: HashMap<String, Rc<MemoryTable>>,
    failing_records: RefCell<HashSet<String>>,
    list_calls: Cell<usize>,
}

impl MemoryTableSource {
    pub fn new(tables: impl IntoIterator<Item = MemoryTable>) -> Self {
        Self {
            tables: tables
                .into_iter()
                .map(|table| (table.table_id.clone(), Rc::new(table)))
                .collect(),
            ..Self::default()
        }
    }

    /// Load `{"tables": [...]}`.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let fixture: MemoryFixture = serde_json::from_str(json)?;
        Ok(Self::new(fixture.tables))
    }

    /// Placeholder table shown when no host is connected.
    pub fn sample() -> Self {
        const DAY: i64 = 24 * 60 * 60 * 1000;
        let base = 1_735_689_600_000; // 2025-01-01T00:00:00Z
        let events = [
            ("Project kickoff", base),
            ("Requirements review", base + 14 * DAY),
            ("Design sign-off", base + 45 * DAY),
            ("Beta release", base + 400 * DAY),
            ("General availability", base + 600 * DAY),
        ];

        let records = events
            .iter()
            .enumerate()
            .map(|(index, (name, time))| {
                MemoryRecord::new(format!("rec{index}"))
                    .with("event", FieldValue::text(*name))
                    .with("completeTime", FieldValue::Timestamp(*time))
            })
            .collect();

        Self::new([MemoryTable {
            table_id: "dev-table".to_string(),
            table_name: "Sample table".to_string(),
            fields: vec![
                FieldMeta {
                    field_id: "event".to_string(),
                    field_name: "Event".to_string(),
                    field_type: FieldKind::Text,
                },
                FieldMeta {
                    field_id: "completeTime".to_string(),
                    field_name: "Completion time".to_string(),
                    field_type: FieldKind::DateTime,
                },
            ],
            records,
        }])
    }

    /// Make every value lookup for `record_id` fail.
    pub fn failing_on(mut self, record_id: impl Into<String>) -> Self {
        self.failing_records.get_mut().insert(record_id.into());
        self
    }

    /// Start failing lookups for `record_id` on a source already in use.
    pub fn fail_on(&self, record_id: impl Into<String>) {
        self.failing_records.borrow_mut().insert(record_id.into());
    }

    pub fn table(&self, table_id: &str) -> Option<&MemoryTable> {
        self.tables.get(table_id).map(Rc::as_ref)
    }

    /// Number of record id pages served so far.
    pub fn list_calls(&self) -> usize {
        self.list_calls.get()
    }
}

#[async_trait(?Send)]
impl TableSource for MemoryTableSource {
    type Table = Rc<MemoryTable>;

    async fn resolve_table(&self, table_id: &str) -> Result<Self::Table, SourceError> {
        self.tables
            .get(table_id)
            .cloned()
            .ok_or_else(|| SourceError::TableNotFound(table_id.to_string()))
    }

    async fn list_record_ids(
        &self,
        table: &Self::Table,
        request: PageRequest,
    ) -> Result<RecordIdPage, SourceError> {
        self.list_calls.set(self.list_calls.get() + 1);

        let start = match request.page_token.as_deref() {
            None => 0,
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| SourceError::Host(format!("invalid page token {token:?}")))?,
        };
        let start = start.min(table.records.len());
        let end = (start + request.page_size).min(table.records.len());
        let has_more = end < table.records.len();

        Ok(RecordIdPage {
            record_ids: table.records[start..end]
                .iter()
                .map(|record| record.record_id.clone())
                .collect(),
            page_token: has_more.then(|| end.to_string()),
            has_more,
        })
    }

    async fn get_field_value(
        &self,
        table: &Self::Table,
        field_id: &str,
        record_id: &str,
    ) -> Result<Option<FieldValue>, SourceError> {
        if self.failing_records.borrow().contains(record_id) {
            return Err(SourceError::Host(format!("record {record_id} unavailable")));
        }

        let record = table
            .records
            .iter()
            .find(|record| record.record_id == record_id)
            .ok_or_else(|| SourceError::Host(format!("unknown record {record_id}")))?;
        Ok(record.values.get(field_id).cloned())
    }
}
