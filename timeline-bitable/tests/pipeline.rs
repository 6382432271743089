use std::cell::{Cell, RefCell};
use std::rc::Rc;

use async_trait::async_trait;
use futures::channel::oneshot;
use futures::executor::block_on;
use futures::future::ready;
use timeline_bitable::{
    CycleOutcome, FieldValue, MemoryRecord, MemoryTable, MemoryTableSource, PageRequest,
    PartialResults, PipelineSettings, RecordIdPage, SourceError, TableSource, TimelinePipeline,
};
use timeline_core::{EntryStatus, RenderMode, TimelineQuery, WidgetMode};

fn fixed_now() -> i64 {
    75
}

fn query(table_id: &str) -> TimelineQuery {
    TimelineQuery {
        table_id: table_id.into(),
        event_field_id: "event".into(),
        completion_field_id: "done".into(),
    }
}

fn record(id: &str, name: Option<&str>, done: Option<i64>) -> MemoryRecord {
    let mut record = MemoryRecord::new(id);
    if let Some(name) = name {
        record = record.with("event", FieldValue::text(name));
    }
    if let Some(done) = done {
        record = record.with("done", FieldValue::Timestamp(done));
    }
    record
}

fn table(table_id: &str, records: Vec<MemoryRecord>) -> MemoryTable {
    MemoryTable {
        table_id: table_id.into(),
        records,
        ..MemoryTable::default()
    }
}

fn numbered(table_id: &str, count: i64) -> MemoryTable {
    table(
        table_id,
        (1..=count)
            .map(|n| record(&format!("r{n}"), Some(&format!("event {n}")), Some(n)))
            .collect(),
    )
}

fn pipeline(tables: Vec<MemoryTable>) -> TimelinePipeline<MemoryTableSource> {
    TimelinePipeline::new(MemoryTableSource::new(tables), PipelineSettings::default())
        .with_clock(fixed_now)
}

fn load(pipeline: &TimelinePipeline<MemoryTableSource>, table_id: &str) -> CycleOutcome {
    let generation = pipeline
        .reconfigure(Some(query(table_id)))
        .expect("query changed");
    block_on(pipeline.run(generation))
}

#[test]
fn three_record_scenario_sorts_and_excludes_incomplete() {
    let pipeline = pipeline(vec![table(
        "tbl",
        vec![
            record("a", Some("A"), Some(100)),
            record("b", Some("B"), Some(50)),
            record("c", Some("C"), None),
        ],
    )]);

    assert_eq!(
        load(&pipeline, "tbl"),
        CycleOutcome::Committed {
            entries: 2,
            has_more: false
        }
    );

    let state = pipeline.snapshot();
    let got: Vec<(&str, i64, EntryStatus)> = state
        .entries
        .iter()
        .map(|entry| (entry.event_name(), entry.completion_time(), entry.status()))
        .collect();
    assert_eq!(
        got,
        vec![
            ("B", 50, EntryStatus::Finished),
            ("A", 100, EntryStatus::Unfinished),
        ]
    );
    assert!(!state.is_loading);
}

#[test]
fn sixty_records_are_truncated_to_first_fifty() {
    let pipeline = pipeline(vec![numbered("tbl", 60)]);

    load(&pipeline, "tbl");

    let state = pipeline.snapshot();
    assert_eq!(state.entries.len(), 50);
    assert_eq!(state.entries[0].event_name(), "event 1");
    assert_eq!(state.entries[49].event_name(), "event 50");
    assert!(state.has_more);

    match pipeline.render(WidgetMode::View) {
        RenderMode::HasData { entries, has_more } => {
            assert_eq!(entries.len(), 50);
            assert!(has_more);
        }
        other => panic!("expected data, got {other:?}"),
    }
}

#[test]
fn cap_holds_when_truncation_skips_sorting_order() {
    // Descending times: the cap keeps the first fifty retrieved, not the
    // fifty smallest.
    let records = (1..=60)
        .map(|n| record(&format!("r{n}"), Some(&format!("e{n}")), Some(1_000 - n)))
        .collect();
    let pipeline = pipeline(vec![table("tbl", records)]);

    load(&pipeline, "tbl");

    let state = pipeline.snapshot();
    assert_eq!(state.entries.len(), 50);
    assert_eq!(state.entries[0].event_name(), "e50");
    assert_eq!(state.entries[49].event_name(), "e1");
}

#[test]
fn missing_table_surfaces_only_in_view_mode() {
    let pipeline = pipeline(Vec::new());

    assert_eq!(load(&pipeline, "gone"), CycleOutcome::TableMissing);

    let state = pipeline.snapshot();
    assert!(state.table_missing);
    assert!(state.entries.is_empty());
    assert_eq!(pipeline.render(WidgetMode::View), RenderMode::TableMissing);
    assert_eq!(pipeline.render(WidgetMode::Config), RenderMode::Empty);
}

#[test]
fn empty_table_renders_empty() {
    let pipeline = pipeline(vec![table("tbl", vec![record("a", None, Some(1))])]);

    assert_eq!(
        load(&pipeline, "tbl"),
        CycleOutcome::Committed {
            entries: 0,
            has_more: false
        }
    );
    assert_eq!(pipeline.render(WidgetMode::View), RenderMode::Empty);
}

#[test]
fn rapid_reconfiguration_only_fetches_last_selection() {
    let pipeline = pipeline(vec![numbered("a", 3), numbered("b", 4), numbered("c", 5)]);

    let generations: Vec<_> = ["a", "b", "c"]
        .into_iter()
        .map(|table_id| {
            pipeline
                .reconfigure(Some(query(table_id)))
                .expect("query changed")
        })
        .collect();

    let outcomes: Vec<CycleOutcome> = generations
        .into_iter()
        .map(|generation| {
            if block_on(pipeline.settle(generation, ready(()))) {
                block_on(pipeline.run(generation))
            } else {
                CycleOutcome::Stale
            }
        })
        .collect();

    assert_eq!(
        outcomes,
        vec![
            CycleOutcome::Stale,
            CycleOutcome::Stale,
            CycleOutcome::Committed {
                entries: 5,
                has_more: false
            },
        ]
    );
    assert_eq!(pipeline.source().list_calls(), 1);
}

#[test]
fn trigger_debounces_and_skips_unchanged_queries() {
    let pipeline = pipeline(vec![numbered("a", 2)]);
    let slept = Cell::new(None);

    let outcome = block_on(pipeline.trigger(Some(query("a")), |delay| {
        slept.set(Some(delay));
        ready(())
    }));
    assert_eq!(
        outcome,
        CycleOutcome::Committed {
            entries: 2,
            has_more: false
        }
    );
    assert_eq!(slept.get(), Some(pipeline.settings().debounce()));

    let again = block_on(pipeline.trigger(Some(query("a")), |_| ready(())));
    assert_eq!(again, CycleOutcome::Unchanged);

    let incomplete = block_on(pipeline.trigger(None, |_| ready(())));
    assert_eq!(incomplete, CycleOutcome::Unchanged);
    assert_eq!(pipeline.source().list_calls(), 1);
}

/// Holds the first page request until the test releases it.
struct GatedSource {
    inner: MemoryTableSource,
    gate: RefCell<Option<oneshot::Receiver<()>>>,
}

#[async_trait(?Send)]
impl TableSource for GatedSource {
    type Table = <MemoryTableSource as TableSource>::Table;

    async fn resolve_table(&self, table_id: &str) -> Result<Self::Table, SourceError> {
        self.inner.resolve_table(table_id).await
    }

    async fn list_record_ids(
        &self,
        table: &Self::Table,
        request: PageRequest,
    ) -> Result<RecordIdPage, SourceError> {
        let gate = self.gate.borrow_mut().take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        self.inner.list_record_ids(table, request).await
    }

    async fn get_field_value(
        &self,
        table: &Self::Table,
        field_id: &str,
        record_id: &str,
    ) -> Result<Option<FieldValue>, SourceError> {
        self.inner.get_field_value(table, field_id, record_id).await
    }
}

#[test]
fn superseded_cycle_does_not_overwrite_newer_results() {
    let (release, gate) = oneshot::channel();
    let source = GatedSource {
        inner: MemoryTableSource::new(vec![numbered("old", 7), numbered("new", 2)]),
        gate: RefCell::new(Some(gate)),
    };
    let pipeline = TimelinePipeline::new(source, PipelineSettings::default()).with_clock(fixed_now);

    let first = pipeline
        .reconfigure(Some(query("old")))
        .expect("query changed");

    let (old_outcome, new_outcome) = block_on(async {
        let old_cycle = pipeline.run(first);
        let new_cycle = async {
            let second = pipeline
                .reconfigure(Some(query("new")))
                .expect("query changed");
            let outcome = pipeline.run(second).await;
            let _ = release.send(());
            outcome
        };
        futures::join!(old_cycle, new_cycle)
    });

    assert_eq!(old_outcome, CycleOutcome::Stale);
    assert_eq!(
        new_outcome,
        CycleOutcome::Committed {
            entries: 2,
            has_more: false
        }
    );

    let state = pipeline.snapshot();
    assert_eq!(state.entries.len(), 2);
    assert!(!state.is_loading);
}

#[test]
fn failure_discards_partial_results_by_default() {
    let source = MemoryTableSource::new(vec![numbered("tbl", 5)]).failing_on("r4");
    let pipeline =
        TimelinePipeline::new(source, PipelineSettings::default()).with_clock(fixed_now);

    let generation = pipeline.reconfigure(Some(query("tbl"))).expect("query changed");
    assert_eq!(block_on(pipeline.run(generation)), CycleOutcome::Failed);

    let state = pipeline.snapshot();
    assert!(state.entries.is_empty());
    assert!(!state.is_loading);
    assert!(!state.table_missing);
    assert_eq!(pipeline.render(WidgetMode::View), RenderMode::Empty);
}

#[test]
fn failure_can_keep_partial_results() {
    let source = MemoryTableSource::new(vec![numbered("tbl", 5)]).failing_on("r4");
    let settings = PipelineSettings {
        partial_results: PartialResults::Keep,
        ..PipelineSettings::default()
    };
    let pipeline = TimelinePipeline::new(source, settings).with_clock(fixed_now);

    let generation = pipeline.reconfigure(Some(query("tbl"))).expect("query changed");
    assert_eq!(block_on(pipeline.run(generation)), CycleOutcome::Failed);

    let state = pipeline.snapshot();
    assert_eq!(state.entries.len(), 3);
    assert!(!state.has_more);
}

#[test]
fn failed_refresh_keeps_previous_truncation_state() {
    let pipeline = pipeline(vec![numbered("tbl", 60)]);
    load(&pipeline, "tbl");
    let before = pipeline.snapshot();
    assert!(before.has_more);
    assert_eq!(before.continuation_token.as_deref(), Some("50"));

    pipeline.source().fail_on("r10");
    let generation = pipeline.refresh().expect("query is set");
    assert_eq!(block_on(pipeline.run(generation)), CycleOutcome::Failed);

    let after = pipeline.snapshot();
    assert_eq!(after.entries.len(), 50);
    assert!(after.has_more);
    assert_eq!(after.continuation_token.as_deref(), Some("50"));
    assert!(!after.is_loading);
    match pipeline.render(WidgetMode::View) {
        RenderMode::HasData { entries, has_more } => {
            assert_eq!(entries.len(), 50);
            assert!(has_more);
        }
        other => panic!("expected data, got {other:?}"),
    }
}

#[test]
fn kept_partial_results_replace_truncation_state() {
    let settings = PipelineSettings {
        partial_results: PartialResults::Keep,
        ..PipelineSettings::default()
    };
    let source = MemoryTableSource::new(vec![numbered("tbl", 60)]);
    let pipeline = TimelinePipeline::new(source, settings).with_clock(fixed_now);
    load(&pipeline, "tbl");

    pipeline.source().fail_on("r10");
    let generation = pipeline.refresh().expect("query is set");
    assert_eq!(block_on(pipeline.run(generation)), CycleOutcome::Failed);

    let state = pipeline.snapshot();
    assert_eq!(state.entries.len(), 9);
    assert!(!state.has_more);
    assert_eq!(state.continuation_token.as_deref(), Some("50"));
}

#[test]
fn refresh_keeps_entries_while_reloading() {
    let pipeline = pipeline(vec![numbered("tbl", 3)]);
    load(&pipeline, "tbl");

    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    pipeline.set_listener(move |state| {
        sink.borrow_mut()
            .push((state.is_loading, state.entries.len()));
    });

    let generation = pipeline.refresh().expect("query is set");
    block_on(pipeline.run(generation));

    assert_eq!(*seen.borrow(), vec![(true, 3), (false, 3)]);
}

#[test]
fn new_query_resets_state_before_fetching() {
    let pipeline = pipeline(vec![numbered("a", 3), numbered("b", 1)]);
    load(&pipeline, "a");

    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    pipeline.set_listener(move |state| {
        sink.borrow_mut()
            .push((state.is_loading, state.entries.len()));
    });

    load(&pipeline, "b");

    assert_eq!(*seen.borrow(), vec![(true, 0), (false, 1)]);
}
