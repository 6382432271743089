//! Core timeline model: entries, completion status, assembly and render state.

mod config;
mod format;
mod render;

pub use config::{
    eligible_fields, ConfigBuilder, CustomConfig, DataCondition, DisplayConfig, DisplayMode,
    DisplayOptions, FieldKind, FieldMeta, FontSize, SavedConfig, Spacing, StatusMode,
    TimelineQuery, ValidationError,
};
pub use format::{abbreviate, format_date, remaining_days, status_caption, status_label};
pub use render::{select_render_mode, RenderMode, WidgetMode};

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Number of record ids requested per page, and the most entries a single
/// fetch cycle may accumulate.
pub const PAGE_SIZE: usize = 50;

/// Completion state of an entry relative to a reference time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Finished,
    Unfinished,
}

/// Classify a completion timestamp against `now` (both epoch millis).
///
/// A missing completion time is never finished; a timestamp equal to `now`
/// already is.
pub fn classify(completion_time: Option<i64>, now: i64) -> EntryStatus {
    match completion_time {
        Some(time) if time <= now => EntryStatus::Finished,
        _ => EntryStatus::Unfinished,
    }
}

/// Wall-clock time in epoch milliseconds.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// A record pulled from the host table before filtering.
///
/// Either value may be missing; [`assemble`] drops such records.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RawRecord {
    #[serde(default)]
    pub record_id: String,
    #[serde(default)]
    pub event_name: Option<String>,
    #[serde(default, alias = "completeTime")]
    pub completion_time: Option<i64>,
}

impl RawRecord {
    pub fn new(
        record_id: impl Into<String>,
        event_name: impl Into<String>,
        completion_time: i64,
    ) -> Self {
        Self {
            record_id: record_id.into(),
            event_name: Some(event_name.into()),
            completion_time: Some(completion_time),
        }
    }
}

/// One point on the timeline.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEntry {
    event_name: String,
    completion_time: i64,
    status: EntryStatus,
}

impl TimelineEntry {
    /// Build an entry, classifying it against `now`.
    pub fn new(
        event_name: impl Into<String>,
        completion_time: i64,
        now: i64,
    ) -> Result<Self, TimelineError> {
        let event_name = event_name.into();
        if event_name.is_empty() {
            return Err(TimelineError::EmptyEventName);
        }
        if completion_time <= 0 {
            return Err(TimelineError::InvalidCompletionTime(completion_time));
        }

        Ok(Self {
            event_name,
            completion_time,
            status: classify(Some(completion_time), now),
        })
    }

    pub fn event_name(&self) -> &str {
        &self.event_name
    }

    pub fn completion_time(&self) -> i64 {
        self.completion_time
    }

    /// Status as classified when the entry was assembled.
    pub fn status(&self) -> EntryStatus {
        self.status
    }

    /// Status relative to a fresh reference time.
    pub fn status_at(&self, now: i64) -> EntryStatus {
        classify(Some(self.completion_time), now)
    }

    /// Copy of the entry re-classified against `now`.
    pub fn refreshed(&self, now: i64) -> Self {
        Self {
            status: self.status_at(now),
            ..self.clone()
        }
    }
}

/// Turn raw records into the ordered timeline.
///
/// Records lacking a non-empty event name or a positive completion time are
/// skipped. The sort is stable, so entries sharing a completion time keep
/// their retrieval order.
pub fn assemble<I>(records: I, now: i64) -> Vec<TimelineEntry>
where
    I: IntoIterator<Item = RawRecord>,
{
    let mut entries: Vec<TimelineEntry> = records
        .into_iter()
        .filter_map(|record| {
            let name = record.event_name?;
            let time = record.completion_time?;
            TimelineEntry::new(name, time, now).ok()
        })
        .collect();
    entries.sort_by_key(TimelineEntry::completion_time);
    entries
}

/// State of the fetch pipeline as seen by renderers.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FetchState {
    pub entries: Vec<TimelineEntry>,
    pub continuation_token: Option<String>,
    pub has_more: bool,
    pub is_loading: bool,
    pub table_missing: bool,
}

impl FetchState {
    /// Drop everything gathered for the previous query.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Errors raised while building timeline values.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TimelineError {
    #[error("event name must not be empty")]
    EmptyEventName,
    #[error("completion time must be a positive epoch-millis value, got {0}")]
    InvalidCompletionTime(i64),
    #[error("saved config is missing its data condition")]
    MissingData,
}
