//! Pulls timeline records out of a Base table and keeps the widget's fetch
//! state.
//!
//! The host table API sits behind [`TableSource`]. [`RecordFetcher`] walks its
//! pages and [`TimelinePipeline`] runs debounced, generation-guarded fetch
//! cycles on top of it.

mod fetcher;
mod memory;
mod pipeline;
mod settings;
mod source;

pub use fetcher::{fetch_records, FetchError, FetchedBatch, RecordFetcher};
pub use memory::{MemoryRecord, MemoryTable, MemoryTableSource};
pub use pipeline::{CycleOutcome, Generation, TimelinePipeline};
pub use settings::{PartialResults, PipelineSettings};
pub use source::{FieldValue, PageRequest, RecordIdPage, SourceError, TableSource, TextSegment};
