//! Drives fetch cycles for one widget instance and owns its [`FetchState`].

use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::rc::Rc;
use std::time::Duration;

use timeline_core::{
    assemble, now_millis, select_render_mode, FetchState, RenderMode, TimelineQuery, WidgetMode,
};
use tracing::{debug, info, warn};

use crate::fetcher::{fetch_records, FetchError, FetchedBatch};
use crate::settings::{PartialResults, PipelineSettings};
use crate::source::TableSource;

/// Monotonic ticket issued per requested cycle. Only the latest one may
/// commit results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Committed { entries: usize, has_more: bool },
    TableMissing,
    Failed,
    /// A newer generation was issued; nothing was written.
    Stale,
    /// The query did not change, so no cycle was started.
    Unchanged,
}

type Listener = Rc<dyn Fn(&FetchState)>;

#[derive(Default)]
struct Inner {
    state: FetchState,
    latest: u64,
    query: Option<TimelineQuery>,
    loaded_query: Option<TimelineQuery>,
}

pub struct TimelinePipeline<S: TableSource> {
    source: S,
    settings: PipelineSettings,
    clock: fn() -> i64,
    inner: RefCell<Inner>,
    listener: RefCell<Option<Listener>>,
}

impl<S: TableSource> TimelinePipeline<S> {
    pub fn new(source: S, settings: PipelineSettings) -> Self {
        Self {
            source,
            settings,
            clock: now_millis,
            inner: RefCell::new(Inner::default()),
            listener: RefCell::new(None),
        }
    }

    /// Replace the wall clock used to classify entries.
    pub fn with_clock(mut self, clock: fn() -> i64) -> Self {
        self.clock = clock;
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Called with the new state every time a cycle starts or commits.
    pub fn set_listener(&self, listener: impl Fn(&FetchState) + 'static) {
        *self.listener.borrow_mut() = Some(Rc::new(listener));
    }

    pub fn snapshot(&self) -> FetchState {
        self.inner.borrow().state.clone()
    }

    pub fn query(&self) -> Option<TimelineQuery> {
        self.inner.borrow().query.clone()
    }

    pub fn render(&self, mode: WidgetMode) -> RenderMode {
        select_render_mode(&self.inner.borrow().state, mode, (self.clock)())
    }

    /// Record a new query and issue a generation for it.
    ///
    /// Returns `None` for an incomplete config or when the query is the one
    /// already requested.
    pub fn reconfigure(&self, query: Option<TimelineQuery>) -> Option<Generation> {
        let query = query?;
        let mut inner = self.inner.borrow_mut();
        if inner.query.as_ref() == Some(&query) {
            return None;
        }
        inner.latest += 1;
        debug!(
            generation = inner.latest,
            table_id = %query.table_id,
            "timeline reconfigured"
        );
        inner.query = Some(query);
        Some(Generation(inner.latest))
    }

    /// Issue a generation that re-fetches the current query.
    pub fn refresh(&self) -> Option<Generation> {
        let mut inner = self.inner.borrow_mut();
        inner.query.as_ref()?;
        inner.latest += 1;
        Some(Generation(inner.latest))
    }

    pub fn is_current(&self, generation: Generation) -> bool {
        self.inner.borrow().latest == generation.0
    }

    /// Wait out the debounce window; `true` if `generation` survived it.
    pub async fn settle<F>(&self, generation: Generation, sleep: F) -> bool
    where
        F: Future<Output = ()>,
    {
        sleep.await;
        self.is_current(generation)
    }

    /// Reconfigure, wait for `sleep(debounce)` and run the cycle if no newer
    /// request arrived meanwhile.
    pub async fn trigger<F, Fut>(&self, query: Option<TimelineQuery>, sleep: F) -> CycleOutcome
    where
        F: FnOnce(Duration) -> Fut,
        Fut: Future<Output = ()>,
    {
        let Some(generation) = self.reconfigure(query) else {
            return CycleOutcome::Unchanged;
        };
        if !self.settle(generation, sleep(self.settings.debounce())).await {
            debug!(%generation, "superseded during debounce");
            return CycleOutcome::Stale;
        }
        self.run(generation).await
    }

    /// Fetch, assemble and commit one cycle for `generation`.
    pub async fn run(&self, generation: Generation) -> CycleOutcome {
        let Some(query) = self.begin(generation) else {
            return CycleOutcome::Stale;
        };

        let result = fetch_records(&self.source, &query, &self.settings).await;
        let outcome = self.commit(generation, query, result);
        if outcome != CycleOutcome::Stale {
            self.notify();
        }
        outcome
    }

    fn begin(&self, generation: Generation) -> Option<TimelineQuery> {
        let mut inner = self.inner.borrow_mut();
        if inner.latest != generation.0 {
            return None;
        }
        let query = inner.query.clone()?;
        if inner.loaded_query.as_ref() != Some(&query) {
            inner.state.reset();
            inner.loaded_query = None;
        }
        inner.state.is_loading = true;
        inner.state.table_missing = false;
        debug!(%generation, table_id = %query.table_id, "fetch cycle started");
        drop(inner);

        self.notify();
        Some(query)
    }

    fn commit(
        &self,
        generation: Generation,
        query: TimelineQuery,
        result: Result<FetchedBatch, FetchError>,
    ) -> CycleOutcome {
        let mut inner = self.inner.borrow_mut();
        if inner.latest != generation.0 {
            warn!(
                %generation,
                latest = inner.latest,
                table_id = %query.table_id,
                "discarding results of superseded fetch cycle"
            );
            return CycleOutcome::Stale;
        }

        let now = (self.clock)();
        let inner = &mut *inner;
        inner.state.is_loading = false;
        match result {
            Ok(batch) => {
                inner.state.entries = assemble(batch.records, now);
                inner.state.has_more = batch.has_more;
                inner.state.continuation_token = batch.continuation_token;
                inner.loaded_query = Some(query);
                info!(
                    %generation,
                    entries = inner.state.entries.len(),
                    has_more = inner.state.has_more,
                    "timeline loaded"
                );
                CycleOutcome::Committed {
                    entries: inner.state.entries.len(),
                    has_more: inner.state.has_more,
                }
            }
            Err(FetchError::TableMissing { table_id, source }) => {
                warn!(%generation, %table_id, error = %source, "table unavailable");
                inner.state.reset();
                inner.state.table_missing = true;
                inner.loaded_query = None;
                CycleOutcome::TableMissing
            }
            Err(FetchError::Transient { partial, source }) => {
                warn!(
                    %generation,
                    table_id = %query.table_id,
                    fetched = partial.records.len(),
                    error = %source,
                    "fetch cycle aborted"
                );
                // Under `Discard` the previous commit stays whole, flags included.
                if self.settings.partial_results == PartialResults::Keep {
                    inner.state.entries = assemble(partial.records, now);
                    inner.state.has_more = partial.has_more;
                    inner.state.continuation_token = partial.continuation_token;
                    inner.loaded_query = Some(query);
                }
                CycleOutcome::Failed
            }
        }
    }

    fn notify(&self) {
        let listener = self.listener.borrow().clone();
        if let Some(listener) = listener {
            let state = self.snapshot();
            listener(&state);
        }
    }
}
