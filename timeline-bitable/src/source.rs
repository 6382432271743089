//! Seam to the host platform's table API.

use std::fmt;

use async_trait::async_trait;
use serde::de::{self, Deserializer, Unexpected, Visitor};
use serde::{Deserialize, Serialize};

/// One run of a rich-text cell.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TextSegment {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default)]
    pub text: String,
}

/// Cell value as returned by the host. Text cells arrive as segment arrays,
/// date-time cells as epoch milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum FieldValue {
    Timestamp(#[serde(deserialize_with = "epoch_millis")] i64),
    Text(Vec<TextSegment>),
}

/// JS hosts hand numbers over as doubles; accept any integral value.
fn epoch_millis<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    struct MillisVisitor;

    impl<'de> Visitor<'de> for MillisVisitor {
        type Value = i64;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("an integral epoch-millis timestamp")
        }

        fn visit_i64<E: de::Error>(self, value: i64) -> Result<i64, E> {
            Ok(value)
        }

        fn visit_u64<E: de::Error>(self, value: u64) -> Result<i64, E> {
            i64::try_from(value).map_err(|_| E::invalid_value(Unexpected::Unsigned(value), &self))
        }

        fn visit_f64<E: de::Error>(self, value: f64) -> Result<i64, E> {
            if value.is_finite() && value.fract() == 0.0 {
                Ok(value as i64)
            } else {
                Err(E::invalid_value(Unexpected::Float(value), &self))
            }
        }
    }

    deserializer.deserialize_any(MillisVisitor)
}

impl FieldValue {
    pub fn text(text: impl Into<String>) -> Self {
        FieldValue::Text(vec![TextSegment {
            kind: Some("text".to_string()),
            text: text.into(),
        }])
    }

    /// Label carried by the first segment, if non-empty.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(segments) => segments
                .first()
                .map(|segment| segment.text.as_str())
                .filter(|text| !text.is_empty()),
            FieldValue::Timestamp(_) => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<i64> {
        match self {
            FieldValue::Timestamp(millis) if *millis > 0 => Some(*millis),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_token: Option<String>,
    pub page_size: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordIdPage {
    #[serde(default)]
    pub record_ids: Vec<String>,
    #[serde(default)]
    pub page_token: Option<String>,
    #[serde(default)]
    pub has_more: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    #[error("table {0} not found or not accessible")]
    TableNotFound(String),
    #[error("host request failed: {0}")]
    Host(String),
}

/// Read access to the host's tables.
///
/// Futures are not `Send`: the widget runs on a single-threaded event loop.
#[async_trait(?Send)]
pub trait TableSource {
    type Table;

    async fn resolve_table(&self, table_id: &str) -> Result<Self::Table, SourceError>;

    async fn list_record_ids(
        &self,
        table: &Self::Table,
        request: PageRequest,
    ) -> Result<RecordIdPage, SourceError>;

    async fn get_field_value(
        &self,
        table: &Self::Table,
        field_id: &str,
        record_id: &str,
    ) -> Result<Option<FieldValue>, SourceError>;
}
