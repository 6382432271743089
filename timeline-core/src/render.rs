use serde::{Deserialize, Serialize};

use crate::{FetchState, TimelineEntry};

/// Host lifecycle state of the widget.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum WidgetMode {
    Create,
    Config,
    #[default]
    View,
    FullScreen,
}

impl WidgetMode {
    /// The editor is open (creating or reconfiguring the widget).
    pub fn is_configuring(self) -> bool {
        matches!(self, WidgetMode::Create | WidgetMode::Config)
    }
}

/// What the widget body should show.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum RenderMode {
    Loading,
    TableMissing,
    Empty,
    HasData {
        entries: Vec<TimelineEntry>,
        #[serde(rename = "hasMore")]
        has_more: bool,
    },
}

/// Pick the presentation for `state`.
///
/// A missing table is only surfaced outside the editor; while configuring it
/// falls through to the empty check. Entry statuses are re-evaluated against
/// `now`.
pub fn select_render_mode(state: &FetchState, mode: WidgetMode, now: i64) -> RenderMode {
    if state.is_loading {
        return RenderMode::Loading;
    }
    if state.table_missing && !mode.is_configuring() {
        return RenderMode::TableMissing;
    }
    if state.entries.is_empty() {
        return RenderMode::Empty;
    }

    RenderMode::HasData {
        entries: state
            .entries
            .iter()
            .map(|entry| entry.refreshed(now))
            .collect(),
        has_more: state.has_more,
    }
}
