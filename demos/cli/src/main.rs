use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, ValueEnum};
use futures::executor::block_on;
use futures::future::ready;
use timeline_bitable::{MemoryTableSource, PartialResults, PipelineSettings, TimelinePipeline};
use timeline_core::{
    format_date, now_millis, select_render_mode, status_caption, ConfigBuilder, RenderMode,
    StatusMode, WidgetMode,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Create,
    Config,
    View,
    FullScreen,
}

impl From<ModeArg> for WidgetMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Create => WidgetMode::Create,
            ModeArg::Config => WidgetMode::Config,
            ModeArg::View => WidgetMode::View,
            ModeArg::FullScreen => WidgetMode::FullScreen,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CaptionArg {
    None,
    Completion,
    RemainingDays,
}

impl From<CaptionArg> for StatusMode {
    fn from(caption: CaptionArg) -> Self {
        match caption {
            CaptionArg::None => StatusMode::None,
            CaptionArg::Completion => StatusMode::Completion,
            CaptionArg::RemainingDays => StatusMode::RemainingDays,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "timeline-cli",
    about = "Render a Base timeline from a table snapshot in JSON."
)]
struct Args {
    /// Table snapshot (`{"tables": [...]}`). Uses the built-in sample when omitted.
    #[arg(short, long)]
    input: Option<PathBuf>,

    #[arg(short, long, default_value = "dev-table")]
    table: String,

    /// Event name field. Picked from the table's fields when omitted.
    #[arg(long)]
    event_field: Option<String>,

    /// Completion time field. Picked from the table's fields when omitted.
    #[arg(long)]
    completion_field: Option<String>,

    #[arg(long, value_enum, default_value_t = ModeArg::View)]
    mode: ModeArg,

    #[arg(long, value_enum, default_value_t = CaptionArg::Completion)]
    caption: CaptionArg,

    #[arg(long)]
    page_size: Option<usize>,

    #[arg(long)]
    record_cap: Option<usize>,

    /// Commit records gathered before a failed lookup.
    #[arg(long)]
    keep_partial: bool,

    /// Evaluate statuses at this epoch-millis instant instead of now.
    #[arg(long)]
    now: Option<i64>,
}

impl Args {
    fn settings(&self) -> PipelineSettings {
        let mut settings = PipelineSettings::default();
        if let Some(page_size) = self.page_size {
            settings.page_size = page_size;
        }
        if let Some(record_cap) = self.record_cap {
            settings.record_cap = record_cap;
        }
        if self.keep_partial {
            settings.partial_results = PartialResults::Keep;
        }
        settings
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_source(input: Option<&PathBuf>) -> anyhow::Result<MemoryTableSource> {
    match input {
        Some(path) => {
            let data = std::fs::read_to_string(path)
                .with_context(|| format!("Cannot read {}", path.display()))?;
            MemoryTableSource::from_json(&data)
                .with_context(|| format!("Cannot parse table snapshot {}", path.display()))
        }
        None => Ok(MemoryTableSource::sample()),
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging();

    let source = load_source(args.input.as_ref())?;

    let mut builder = ConfigBuilder::new();
    builder.select_table(args.table.as_str());
    match source.table(&args.table) {
        Some(table) => builder.auto_select_fields(&table.fields),
        None => warn!(table_id = %args.table, "table not in snapshot"),
    }
    if let Some(field_id) = &args.event_field {
        builder.set_event_field(field_id.as_str());
    }
    if let Some(field_id) = &args.completion_field {
        builder.set_completion_field(field_id.as_str());
    }
    builder.set_status_mode(args.caption.into());
    let config = builder.validate().context("Incomplete widget configuration")?;

    let now = args.now.unwrap_or_else(now_millis);
    let pipeline = TimelinePipeline::new(source, args.settings());
    let outcome = block_on(pipeline.trigger(config.query(), |_| ready(())));
    info!(?outcome, "fetch cycle settled");

    match select_render_mode(&pipeline.snapshot(), args.mode.into(), now) {
        RenderMode::Loading => println!("Loading..."),
        RenderMode::TableMissing => println!("No permission to view this widget"),
        RenderMode::Empty => println!("No timeline data yet"),
        RenderMode::HasData { entries, has_more } => {
            for entry in &entries {
                let caption = status_caption(entry, config.options.status_mode, now)
                    .map(|caption| format!("  ({caption})"))
                    .unwrap_or_default();
                println!(
                    "{}  {}{}",
                    format_date(entry.completion_time(), &Utc),
                    entry.event_name(),
                    caption
                );
            }
            if has_more {
                println!("{} records shown", entries.len());
            }
        }
    }

    Ok(())
}
