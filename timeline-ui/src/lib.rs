//! Yew rendering of the Base timeline widget for WebAssembly hosts.

#[cfg_attr(not(target_arch = "wasm32"), allow(dead_code))]
mod fallback;
#[cfg(target_arch = "wasm32")]
mod styles;

#[cfg(target_arch = "wasm32")]
mod wasm_ui {
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::sync::Once;

    use crate::{fallback, styles};
    use chrono::Local;
    use serde::Deserialize;
    use serde_wasm_bindgen::from_value;
    use timeline_bitable::{PipelineSettings, TimelinePipeline};
    use timeline_core::{
        abbreviate, format_date, now_millis, select_render_mode, status_caption, DisplayConfig,
        DisplayMode, DisplayOptions, EntryStatus, RenderMode, TimelineEntry, WidgetMode,
    };
    use timeline_wasm::JsTableSource;
    use wasm_bindgen::prelude::*;
    use web_sys::{console, Document, Element, Window};
    use yew::platform::{spawn_local, time::sleep};
    use yew::prelude::*;
    use yew::AppHandle;

    const NAME_LIMIT: usize = 50;

    type Pipeline = TimelinePipeline<JsTableSource>;

    #[derive(Properties)]
    pub struct TimelineWidgetProps {
        pub pipeline: Rc<Pipeline>,
        pub config: DisplayConfig,
        pub mode: WidgetMode,
    }

    impl PartialEq for TimelineWidgetProps {
        fn eq(&self, other: &Self) -> bool {
            Rc::ptr_eq(&self.pipeline, &other.pipeline)
                && self.config == other.config
                && self.mode == other.mode
        }
    }

    #[function_component(TimelineWidget)]
    fn timeline_widget(props: &TimelineWidgetProps) -> Html {
        use_effect_with((), |_| {
            if let Some(document) = web_sys::window().and_then(|window| window.document()) {
                if let Err(err) = styles::ensure_styles(&document) {
                    console::error_1(&err);
                }
            }
            || ()
        });

        let state = use_state(|| props.pipeline.snapshot());
        {
            let pipeline = Rc::clone(&props.pipeline);
            let state = state.clone();
            use_effect_with((), move |_| {
                pipeline.set_listener(move |snapshot| state.set(snapshot.clone()));
                || ()
            });
        }
        {
            let pipeline = Rc::clone(&props.pipeline);
            use_effect_with(props.config.query(), move |query| {
                let query = query.clone();
                spawn_local(async move {
                    pipeline.trigger(query, sleep).await;
                });
                || ()
            });
        }

        let now = now_millis();
        let render = select_render_mode(&state, props.mode, now);
        let options = props.config.options;

        html! {
            <div
                class={classes!("timeline-widget", props.mode.is_configuring().then_some("config"))}
                style={widget_style(&options)}
            >
                { render_body(&render, &options, now) }
            </div>
        }
    }

    fn widget_style(options: &DisplayOptions) -> String {
        format!(
            "--timeline-font-size: {}px; --timeline-gap: {}px;",
            options.font_size.pixels(),
            options.spacing.pixels()
        )
    }

    fn render_body(render: &RenderMode, options: &DisplayOptions, now: i64) -> Html {
        match render {
            RenderMode::Loading => render_placeholder(html! { {"⏳"} }, "Loading..."),
            RenderMode::TableMissing => {
                render_placeholder(no_access_illustration(), "No permission to view this widget")
            }
            RenderMode::Empty => render_placeholder(html! { {"📅"} }, "No timeline data yet"),
            RenderMode::HasData { entries, has_more } => {
                render_timeline(entries, *has_more, options, now)
            }
        }
    }

    fn render_placeholder(icon: Html, text: &str) -> Html {
        html! {
            <div class="timeline-empty">
                <div class="empty-icon">{ icon }</div>
                <div class="empty-text">{ text.to_string() }</div>
            </div>
        }
    }

    fn no_access_illustration() -> Html {
        html! {
            <svg class="no-access" viewBox="0 0 64 64" width="64" height="64" aria-hidden="true">
                <rect x="14" y="28" width="36" height="26" rx="4" />
                <path d="M22 28v-8a10 10 0 0 1 20 0v8" fill="none" stroke-width="4" />
            </svg>
        }
    }

    fn render_timeline(
        entries: &[TimelineEntry],
        has_more: bool,
        options: &DisplayOptions,
        now: i64,
    ) -> Html {
        let orientation = match options.display_mode {
            DisplayMode::Vertical => "timeline-vertical",
            DisplayMode::Horizontal => "timeline-horizontal",
        };

        html! {
            <>
                <div class="timeline-container">
                    <ol class={classes!("timeline-list", orientation)}>
                        { for entries.iter().map(|entry| render_entry(entry, options, now)) }
                    </ol>
                </div>
                {
                    if has_more {
                        html! {
                            <div class="timeline-more">
                                { format!("{} records shown", entries.len()) }
                            </div>
                        }
                    } else {
                        Html::default()
                    }
                }
            </>
        }
    }

    fn render_entry(entry: &TimelineEntry, options: &DisplayOptions, now: i64) -> Html {
        let (level, icon) = match entry.status() {
            EntryStatus::Finished => ("finished", "✓"),
            EntryStatus::Unfinished => ("unfinished", "○"),
        };
        let name = entry.event_name();
        let full_name = (name.chars().count() > NAME_LIMIT).then(|| name.to_string());
        let date = format_date(entry.completion_time(), &Local);
        let caption = status_caption(entry, options.status_mode, now);

        html! {
            <li class="timeline-item" data-status={level}>
                <div class="timeline-node">
                    <span class="status-icon">{ icon }</span>
                </div>
                <div class="timeline-event">
                    <div class="timeline-event-name" title={full_name}>
                        { abbreviate(name, NAME_LIMIT) }
                    </div>
                    <div class="timeline-event-time" title={format!("Completion time: {date}")}>
                        { date.clone() }
                    </div>
                    {
                        caption
                            .map(|text| html! { <div class="timeline-event-status">{ text }</div> })
                            .unwrap_or_default()
                    }
                </div>
            </li>
        }
    }

    #[function_component(FallbackView)]
    fn fallback_view() -> Html {
        html! {
            <div class="timeline-fallback">
                <div class="fallback-title">{ fallback::TITLE }</div>
                <div class="fallback-hint">{ fallback::HINT }</div>
            </div>
        }
    }

    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct MountOptions {
        #[serde(default)]
        config: DisplayConfig,
        #[serde(default)]
        mode: WidgetMode,
        #[serde(default)]
        settings: PipelineSettings,
    }

    /// Handle returned to the host so it can push config and mode changes.
    #[wasm_bindgen]
    pub struct MountedTimeline {
        handle: AppHandle<TimelineWidget>,
        pipeline: Rc<Pipeline>,
    }

    #[wasm_bindgen]
    impl MountedTimeline {
        pub fn update(&mut self, config: JsValue, mode: JsValue) -> Result<(), JsValue> {
            let config: DisplayConfig = from_value(config)?;
            let mode: WidgetMode = from_value(mode)?;
            self.handle.update(TimelineWidgetProps {
                pipeline: Rc::clone(&self.pipeline),
                config,
                mode,
            });
            Ok(())
        }
    }

    thread_local! {
        static MOUNTED_SELECTORS: RefCell<Vec<String>> = RefCell::new(Vec::new());
    }

    static FALLBACK_HOOK: Once = Once::new();

    /// Panics leave Yew unable to render, so the hook writes the fallback
    /// markup directly into every mounted target.
    fn install_fallback_hook(selector: &str) {
        MOUNTED_SELECTORS.with(|selectors| {
            let mut selectors = selectors.borrow_mut();
            if !selectors.iter().any(|known| known == selector) {
                selectors.push(selector.to_string());
            }
        });
        FALLBACK_HOOK.call_once(|| {
            std::panic::set_hook(Box::new(|info| {
                console_error_panic_hook::hook(info);
                let Some(document) = web_sys::window().and_then(|window| window.document())
                else {
                    return;
                };
                MOUNTED_SELECTORS.with(|selectors| {
                    let Ok(selectors) = selectors.try_borrow() else {
                        return;
                    };
                    for selector in selectors.iter() {
                        if let Ok(Some(target)) = document.query_selector(selector) {
                            target.set_inner_html(&fallback::markup());
                        }
                    }
                });
            }));
        });
    }

    fn mount_target(selector: &str) -> Result<Element, JsValue> {
        let window: Window = web_sys::window().ok_or_else(|| JsValue::from_str("No window"))?;
        let document: Document = window
            .document()
            .ok_or_else(|| JsValue::from_str("No document"))?;

        document
            .query_selector(selector)
            .map_err(|err| JsValue::from_str(&format!("Invalid selector: {err:?}")))?
            .ok_or_else(|| JsValue::from_str("No element matches the selector"))
    }

    #[wasm_bindgen]
    pub fn mount_timeline_widget(
        selector: &str,
        base: JsValue,
        options: JsValue,
    ) -> Result<MountedTimeline, JsValue> {
        let target = mount_target(selector)?;
        // `set_panic_hook` installs once; it has to run before the fallback hook.
        timeline_wasm::set_panic_hook();
        install_fallback_hook(selector);

        let options: MountOptions = match from_value(options) {
            Ok(options) => options,
            Err(err) => {
                yew::Renderer::<FallbackView>::with_root(target).render();
                return Err(JsValue::from_str(&format!("Cannot read widget options: {err}")));
            }
        };

        let pipeline = Rc::new(TimelinePipeline::new(
            JsTableSource::new(base),
            options.settings,
        ));
        let handle = yew::Renderer::<TimelineWidget>::with_root_and_props(
            target,
            TimelineWidgetProps {
                pipeline: Rc::clone(&pipeline),
                config: options.config,
                mode: options.mode,
            },
        )
        .render();

        Ok(MountedTimeline { handle, pipeline })
    }
}

#[cfg(target_arch = "wasm32")]
pub use wasm_ui::{mount_timeline_widget, MountedTimeline};

#[cfg(not(target_arch = "wasm32"))]
pub fn mount_timeline_widget(
    _: &str,
    _: wasm_bindgen::JsValue,
    _: wasm_bindgen::JsValue,
) -> Result<(), wasm_bindgen::JsValue> {
    Err(wasm_bindgen::JsValue::from_str(
        "timeline-ui only supports the wasm32 target",
    ))
}
