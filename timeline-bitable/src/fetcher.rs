//! Paginated record retrieval against a [`TableSource`].

use timeline_core::{RawRecord, TimelineQuery};
use tracing::{debug, warn};

use crate::settings::PipelineSettings;
use crate::source::{FieldValue, PageRequest, SourceError, TableSource};

/// Records gathered by one fetch cycle, in retrieval order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchedBatch {
    pub records: Vec<RawRecord>,
    pub continuation_token: Option<String>,
    /// More matching records may exist beyond the cap.
    pub has_more: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("table {table_id} could not be resolved: {source}")]
    TableMissing {
        table_id: String,
        source: SourceError,
    },
    #[error("fetch aborted after {} records: {}", .partial.records.len(), .source)]
    Transient {
        partial: FetchedBatch,
        source: SourceError,
    },
}

/// Walks the pages of one table, yielding records with both values present
/// until the source runs dry or the cap is hit.
pub struct RecordFetcher<'a, S: TableSource> {
    source: &'a S,
    table: S::Table,
    query: &'a TimelineQuery,
    page_size: usize,
    cap: usize,
    page_token: Option<String>,
    collected: usize,
    exhausted: bool,
    more_available: bool,
}

impl<'a, S: TableSource> RecordFetcher<'a, S> {
    /// Resolve the table. Any failure here is reported as a missing table.
    pub async fn open(
        source: &'a S,
        query: &'a TimelineQuery,
        settings: &PipelineSettings,
    ) -> Result<Self, FetchError> {
        let table = source
            .resolve_table(&query.table_id)
            .await
            .map_err(|source| FetchError::TableMissing {
                table_id: query.table_id.clone(),
                source,
            })?;

        Ok(Self {
            source,
            table,
            query,
            page_size: settings.page_size.max(1),
            cap: settings.record_cap,
            page_token: None,
            collected: 0,
            exhausted: false,
            more_available: false,
        })
    }

    pub fn has_more(&self) -> bool {
        self.more_available
    }

    pub fn continuation_token(&self) -> Option<&str> {
        self.page_token.as_deref()
    }

    /// Next batch of usable records, `None` once finished.
    pub async fn next_page(&mut self) -> Result<Option<Vec<RawRecord>>, SourceError> {
        let mut records = Vec::new();
        if self.fill_page(&mut records).await? {
            Ok(Some(records))
        } else {
            Ok(None)
        }
    }

    /// Drain every page into one batch.
    pub async fn collect(mut self) -> Result<FetchedBatch, FetchError> {
        let mut records = Vec::new();
        loop {
            match self.fill_page(&mut records).await {
                Ok(true) => {}
                Ok(false) => break,
                Err(source) => {
                    return Err(FetchError::Transient {
                        partial: FetchedBatch {
                            records,
                            continuation_token: self.page_token,
                            has_more: false,
                        },
                        source,
                    })
                }
            }
        }

        Ok(FetchedBatch {
            records,
            continuation_token: self.page_token,
            has_more: self.more_available,
        })
    }

    /// Returns `false` without touching the source once finished.
    async fn fill_page(&mut self, out: &mut Vec<RawRecord>) -> Result<bool, SourceError> {
        if self.exhausted || self.collected >= self.cap {
            self.exhausted = true;
            return Ok(false);
        }

        let sent = self.page_token.clone();
        let request = PageRequest {
            page_token: sent.clone(),
            page_size: self.page_size,
        };
        let page = self.source.list_record_ids(&self.table, request).await?;
        debug!(
            table_id = %self.query.table_id,
            ids = page.record_ids.len(),
            has_more = page.has_more,
            "fetched record id page"
        );
        self.page_token = page.page_token.filter(|token| !token.is_empty());
        let stalled = sent.is_some() && self.page_token == sent;

        let mut ids = page.record_ids.iter();
        while let Some(record_id) = ids.next() {
            let event = self
                .source
                .get_field_value(&self.table, &self.query.event_field_id, record_id)
                .await?;
            let completion = self
                .source
                .get_field_value(&self.table, &self.query.completion_field_id, record_id)
                .await?;

            let name = event.as_ref().and_then(FieldValue::as_text);
            let time = completion.as_ref().and_then(FieldValue::as_timestamp);
            let (Some(name), Some(time)) = (name, time) else {
                debug!(record_id = %record_id, "skipping record with incomplete values");
                continue;
            };

            out.push(RawRecord::new(record_id.as_str(), name, time));
            self.collected += 1;
            if self.collected >= self.cap {
                self.exhausted = true;
                self.more_available = page.has_more || ids.len() > 0;
                return Ok(true);
            }
        }

        if !page.has_more {
            self.exhausted = true;
        } else if self.page_token.is_none() {
            warn!(
                table_id = %self.query.table_id,
                "source reported more pages without a continuation token"
            );
            self.exhausted = true;
        } else if stalled {
            warn!(
                table_id = %self.query.table_id,
                page_token = ?self.page_token,
                "source returned the page token it was sent"
            );
            self.exhausted = true;
        }
        Ok(true)
    }
}

/// Run a full fetch for `query`.
pub async fn fetch_records<S: TableSource>(
    source: &S,
    query: &TimelineQuery,
    settings: &PipelineSettings,
) -> Result<FetchedBatch, FetchError> {
    RecordFetcher::open(source, query, settings)
        .await?
        .collect()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    use crate::memory::{MemoryRecord, MemoryTable, MemoryTableSource};
    use crate::source::RecordIdPage;
    use async_trait::async_trait;
    use futures::executor::block_on;

    fn query() -> TimelineQuery {
        TimelineQuery {
            table_id: "tbl".into(),
            event_field_id: "event".into(),
            completion_field_id: "done".into(),
        }
    }

    fn table(count: usize) -> MemoryTable {
        MemoryTable {
            table_id: "tbl".into(),
            records: (1..=count)
                .map(|n| {
                    MemoryRecord::new(format!("rec{n}"))
                        .with("event", FieldValue::text(format!("event {n}")))
                        .with("done", FieldValue::Timestamp(n as i64))
                })
                .collect(),
            ..MemoryTable::default()
        }
    }

    fn settings(page_size: usize, record_cap: usize) -> PipelineSettings {
        PipelineSettings {
            page_size,
            record_cap,
            ..PipelineSettings::default()
        }
    }

    #[test]
    fn stops_at_cap_and_reports_more() {
        let source = MemoryTableSource::new(vec![table(60)]);
        let batch = block_on(fetch_records(&source, &query(), &PipelineSettings::default()))
            .expect("fetch succeeds");

        assert_eq!(batch.records.len(), 50);
        assert_eq!(batch.records[0].record_id, "rec1");
        assert_eq!(batch.records[49].record_id, "rec50");
        assert!(batch.has_more);
        assert_eq!(batch.continuation_token.as_deref(), Some("50"));
    }

    #[test]
    fn exact_fit_has_no_more() {
        let source = MemoryTableSource::new(vec![table(50)]);
        let batch = block_on(fetch_records(&source, &query(), &PipelineSettings::default()))
            .expect("fetch succeeds");

        assert_eq!(batch.records.len(), 50);
        assert!(!batch.has_more);
    }

    #[test]
    fn cap_inside_a_page_counts_unread_ids() {
        let source = MemoryTableSource::new(vec![table(10)]);
        let batch = block_on(fetch_records(&source, &query(), &settings(10, 4)))
            .expect("fetch succeeds");

        assert_eq!(batch.records.len(), 4);
        assert!(batch.has_more);
        assert_eq!(source.list_calls(), 1);
    }

    #[test]
    fn walks_multiple_pages_until_source_is_dry() {
        let source = MemoryTableSource::new(vec![table(7)]);
        let query = query();
        let mut fetcher =
            block_on(RecordFetcher::open(&source, &query, &settings(3, 50))).expect("opens");

        let mut sizes = Vec::new();
        while let Some(page) = block_on(fetcher.next_page()).expect("page loads") {
            sizes.push(page.len());
        }

        assert_eq!(sizes, vec![3, 3, 1]);
        assert!(!fetcher.has_more());
        assert_eq!(fetcher.continuation_token(), None);
        assert_eq!(source.list_calls(), 3);
    }

    #[test]
    fn skipped_records_do_not_count_towards_cap() {
        let mut tbl = table(6);
        tbl.records[0].values.remove("done");
        tbl.records[2].values.insert("event".into(), FieldValue::text(""));
        let source = MemoryTableSource::new(vec![tbl]);

        let batch = block_on(fetch_records(&source, &query(), &settings(2, 3)))
            .expect("fetch succeeds");

        let ids: Vec<&str> = batch.records.iter().map(|r| r.record_id.as_str()).collect();
        assert_eq!(ids, vec!["rec2", "rec4", "rec5"]);
        assert!(batch.has_more);
    }

    #[test]
    fn unresolvable_table_is_missing() {
        let source = MemoryTableSource::new(Vec::new());
        let err = block_on(fetch_records(&source, &query(), &PipelineSettings::default()))
            .expect_err("table is absent");

        assert!(matches!(err, FetchError::TableMissing { ref table_id, .. } if table_id == "tbl"));
    }

    #[test]
    fn record_failure_keeps_partial_batch_in_error() {
        let source = MemoryTableSource::new(vec![table(5)]).failing_on("rec4");
        let err = block_on(fetch_records(&source, &query(), &settings(2, 50)))
            .expect_err("record 4 fails");

        let FetchError::Transient { partial, source } = err else {
            panic!("expected transient failure");
        };
        assert_eq!(partial.records.len(), 3);
        assert!(!partial.has_more);
        assert!(matches!(source, SourceError::Host(_)));
    }

    /// Always claims another page behind the same token, with records that
    /// carry no values.
    #[derive(Default)]
    struct StuckSource {
        list_calls: Cell<usize>,
    }

    #[async_trait(?Send)]
    impl TableSource for StuckSource {
        type Table = ();

        async fn resolve_table(&self, _table_id: &str) -> Result<(), SourceError> {
            Ok(())
        }

        async fn list_record_ids(
            &self,
            _table: &(),
            _request: PageRequest,
        ) -> Result<RecordIdPage, SourceError> {
            self.list_calls.set(self.list_calls.get() + 1);
            Ok(RecordIdPage {
                record_ids: vec!["blank".to_string()],
                page_token: Some("same".to_string()),
                has_more: true,
            })
        }

        async fn get_field_value(
            &self,
            _table: &(),
            _field_id: &str,
            _record_id: &str,
        ) -> Result<Option<FieldValue>, SourceError> {
            Ok(None)
        }
    }

    #[test]
    fn repeated_page_token_ends_the_walk() {
        let source = StuckSource::default();
        let batch = block_on(fetch_records(&source, &query(), &PipelineSettings::default()))
            .expect("fetch succeeds");

        assert!(batch.records.is_empty());
        assert!(!batch.has_more);
        assert_eq!(batch.continuation_token.as_deref(), Some("same"));
        assert_eq!(source.list_calls.get(), 2);
    }
}
