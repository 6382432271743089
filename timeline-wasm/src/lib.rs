//! Framework-neutral WASM <-> JavaScript bridge for the Base timeline widget.

mod host;

use std::rc::Rc;

use serde::Deserialize;
use serde_wasm_bindgen::{from_value, to_value};
use tracing::warn;
use timeline_bitable::{CycleOutcome, PipelineSettings, TimelinePipeline};
use timeline_core::{
    assemble, classify, now_millis, select_render_mode, ConfigBuilder, DisplayConfig,
    EntryStatus, FetchState, RawRecord, SavedConfig, WidgetMode,
};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;

pub use host::{sleep, JsTableSource};

/// Route Rust panics to the browser console.
pub fn set_panic_hook() {
    #[cfg(target_arch = "wasm32")]
    console_error_panic_hook::set_once();
}

fn js_error(context: &str, err: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&format!("{context}: {err}"))
}

fn now_or(now: Option<f64>) -> i64 {
    now.map(|value| value as i64).unwrap_or_else(now_millis)
}

/// Filter, classify and sort plain `{eventName, completeTime}` records.
#[wasm_bindgen]
pub fn assemble_records(records: JsValue, now: Option<f64>) -> Result<JsValue, JsValue> {
    set_panic_hook();

    let records: Vec<RawRecord> =
        from_value(records).map_err(|err| js_error("Cannot read records", err))?;
    let entries = assemble(records, now_or(now));
    to_value(&entries).map_err(|err| js_error("Cannot serialize entries", err))
}

#[wasm_bindgen]
pub fn classify_status(completion_time: Option<f64>, now: Option<f64>) -> String {
    match classify(completion_time.map(|value| value as i64), now_or(now)) {
        EntryStatus::Finished => "finished".to_string(),
        EntryStatus::Unfinished => "unfinished".to_string(),
    }
}

/// Panel fields as the host form collects them.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct JsPanelState {
    #[serde(default)]
    base_token: Option<String>,
    #[serde(flatten)]
    config: DisplayConfig,
}

/// Validate the configuration panel and return the shape to persist.
#[wasm_bindgen]
pub fn build_saved_config(panel: JsValue) -> Result<JsValue, JsValue> {
    let panel: JsPanelState =
        from_value(panel).map_err(|err| js_error("Cannot read panel state", err))?;

    let mut builder = ConfigBuilder::new();
    builder.load(&panel.config, panel.base_token);
    let saved = builder
        .save()
        .map_err(|err| js_error("Invalid configuration", err))?;
    to_value(&saved).map_err(|err| js_error("Cannot serialize config", err))
}

/// Restore the widget config from what the host persisted.
#[wasm_bindgen]
pub fn read_saved_config(saved: JsValue) -> Result<JsValue, JsValue> {
    let saved: SavedConfig =
        from_value(saved).map_err(|err| js_error("Cannot read saved config", err))?;
    let config =
        DisplayConfig::from_saved(&saved).map_err(|err| js_error("Invalid saved config", err))?;
    to_value(&config).map_err(|err| js_error("Cannot serialize config", err))
}

fn outcome_label(outcome: CycleOutcome) -> &'static str {
    match outcome {
        CycleOutcome::Committed { .. } => "committed",
        CycleOutcome::TableMissing => "tableMissing",
        CycleOutcome::Failed => "failed",
        CycleOutcome::Stale => "stale",
        CycleOutcome::Unchanged => "unchanged",
    }
}

/// Hand `state` to a host callback. Returns `false` when it did not arrive.
fn deliver_state(callback: &js_sys::Function, state: &FetchState) -> bool {
    let value = match to_value(state) {
        Ok(value) => value,
        Err(err) => {
            warn!(error = %err, "cannot serialize state for onChange");
            return false;
        }
    };
    match callback.call1(&JsValue::NULL, &value) {
        Ok(_) => true,
        Err(err) => {
            warn!(error = %host::describe(&err), "onChange callback threw");
            false
        }
    }
}

/// One widget instance driving its own fetch pipeline against the host.
#[wasm_bindgen]
pub struct TimelineWidget {
    pipeline: Rc<TimelinePipeline<JsTableSource>>,
}

#[wasm_bindgen]
impl TimelineWidget {
    #[wasm_bindgen(constructor)]
    pub fn new(base: JsValue, settings: Option<JsValue>) -> Result<TimelineWidget, JsValue> {
        set_panic_hook();

        let settings = match settings {
            Some(js_settings) => from_value::<PipelineSettings>(js_settings)
                .map_err(|err| js_error("Cannot read settings", err))?,
            None => PipelineSettings::default(),
        };
        Ok(Self {
            pipeline: Rc::new(TimelinePipeline::new(JsTableSource::new(base), settings)),
        })
    }

    /// Apply a new config. Resolves with the cycle outcome once the debounced
    /// fetch settles.
    pub fn configure(&self, config: JsValue) -> Result<js_sys::Promise, JsValue> {
        let config: DisplayConfig =
            from_value(config).map_err(|err| js_error("Cannot read config", err))?;
        let pipeline = Rc::clone(&self.pipeline);

        Ok(future_to_promise(async move {
            let outcome = pipeline.trigger(config.query(), sleep).await;
            Ok(JsValue::from_str(outcome_label(outcome)))
        }))
    }

    /// Re-fetch the current query without clearing what is shown.
    pub fn refresh(&self) -> js_sys::Promise {
        let pipeline = Rc::clone(&self.pipeline);
        future_to_promise(async move {
            let outcome = match pipeline.refresh() {
                Some(generation) => pipeline.run(generation).await,
                None => CycleOutcome::Unchanged,
            };
            Ok(JsValue::from_str(outcome_label(outcome)))
        })
    }

    /// Register `callback(state)`, invoked whenever a cycle starts or commits.
    #[wasm_bindgen(js_name = onChange)]
    pub fn on_change(&self, callback: js_sys::Function) {
        self.pipeline.set_listener(move |state: &FetchState| {
            deliver_state(&callback, state);
        });
    }

    pub fn snapshot(&self) -> Result<JsValue, JsValue> {
        to_value(&self.pipeline.snapshot()).map_err(|err| js_error("Cannot serialize state", err))
    }

    /// Presentation for the given host mode (`create`, `config`, `view`,
    /// `fullScreen`).
    pub fn render(&self, mode: JsValue) -> Result<JsValue, JsValue> {
        let mode: WidgetMode = if mode.is_undefined() || mode.is_null() {
            WidgetMode::default()
        } else {
            from_value(mode).map_err(|err| js_error("Cannot read widget mode", err))?
        };
        let render = select_render_mode(&self.pipeline.snapshot(), mode, now_millis());
        to_value(&render).map_err(|err| js_error("Cannot serialize render state", err))
    }
}


#[cfg(all(test, target_arch = "wasm32"))]
mod wasm_tests {
    use super::*;
    use wasm_bindgen_test::wasm_bindgen_test;

    #[wasm_bindgen_test]
    fn change_callback_errors_are_reported() {
        let throwing = js_sys::Function::new_no_args("throw new Error('listener failed')");
        assert!(!deliver_state(&throwing, &FetchState::default()));

        let quiet = js_sys::Function::new_with_args("state", "return state.isLoading;");
        assert!(deliver_state(&quiet, &FetchState::default()));
    }
}
