#![cfg(target_arch = "wasm32")]

use wasm_bindgen::{JsCast, JsValue};
use web_sys::{Document, Node};

const STYLE_TAG_SELECTOR: &str = "style[data-timeline-widget]";

/// Default CSS for the widget. Colours are tokens so hosts can theme them;
/// `--timeline-font-size` and `--timeline-gap` are set per instance.
pub const DEFAULT_STYLES: &str = r#"
:root {
  --timeline-font-family: 'Inter', system-ui, -apple-system, BlinkMacSystemFont, 'Segoe UI', sans-serif;
  --timeline-text: #1f2329;
  --timeline-caption: #8f959e;
  --timeline-line: #dee0e3;
  --timeline-node-bg: #ffffff;
  --finished: #2ea121;
  --bg-finished: rgba(46, 161, 33, 0.1);
  --unfinished: #3370ff;
  --bg-unfinished: rgba(51, 112, 255, 0.1);
}

body[theme-mode='dark'] {
  --timeline-text: #ebebeb;
  --timeline-caption: #a6a6a6;
  --timeline-line: #373c43;
  --timeline-node-bg: #1a1a1a;
  --finished: #51ba43;
  --bg-finished: rgba(81, 186, 67, 0.16);
  --unfinished: #4c88ff;
  --bg-unfinished: rgba(76, 136, 255, 0.16);
}

.timeline-widget {
  font-family: var(--timeline-font-family);
  font-size: var(--timeline-font-size, 16px);
  color: var(--timeline-text);
  height: 100%;
  overflow: auto;
  box-sizing: border-box;
  padding: 16px;
}

.timeline-widget.config {
  padding: 24px;
}

.timeline-empty,
.timeline-fallback {
  display: flex;
  flex-direction: column;
  align-items: center;
  justify-content: center;
  gap: 8px;
  height: 100%;
  min-height: 160px;
  color: var(--timeline-caption);
}

.empty-icon {
  font-size: 40px;
  line-height: 1;
}

.no-access {
  fill: var(--timeline-line);
  stroke: var(--timeline-line);
}

.fallback-title {
  font-size: 16px;
  color: var(--timeline-text);
}

.fallback-hint {
  font-size: 12px;
}

.timeline-list {
  position: relative;
  list-style: none;
  margin: 0;
  padding: 0;
  display: flex;
  gap: var(--timeline-gap, 16px);
}

.timeline-vertical {
  flex-direction: column;
  padding-left: 28px;
}

.timeline-vertical::before {
  content: '';
  position: absolute;
  left: 11px;
  top: 4px;
  bottom: 4px;
  width: 2px;
  background: var(--timeline-line);
}

.timeline-horizontal {
  flex-direction: row;
  overflow-x: auto;
  padding-top: 28px;
}

.timeline-horizontal::before {
  content: '';
  position: absolute;
  top: 11px;
  left: 4px;
  right: 4px;
  height: 2px;
  background: var(--timeline-line);
}

.timeline-item {
  --status-color: var(--unfinished);
  --status-bg: var(--bg-unfinished);
  position: relative;
}

.timeline-item[data-status='finished'] {
  --status-color: var(--finished);
  --status-bg: var(--bg-finished);
}

.timeline-node {
  position: absolute;
  width: 20px;
  height: 20px;
  border-radius: 50%;
  border: 2px solid var(--status-color);
  background: var(--timeline-node-bg);
  display: flex;
  align-items: center;
  justify-content: center;
  box-sizing: border-box;
}

.timeline-vertical .timeline-node {
  left: -27px;
  top: 6px;
}

.timeline-horizontal .timeline-node {
  top: -27px;
  left: 12px;
}

.status-icon {
  font-size: 11px;
  color: var(--status-color);
}

.timeline-event {
  border: 1px solid var(--status-color);
  background: var(--status-bg);
  border-radius: 8px;
  padding: 8px 12px;
  min-width: 140px;
}

.timeline-event-name {
  color: var(--status-color);
  font-weight: 600;
  word-break: break-word;
}

.timeline-event-time {
  margin-top: 4px;
  font-size: 0.8em;
  color: var(--timeline-caption);
}

.timeline-event-status {
  margin-top: 2px;
  font-size: 0.8em;
  color: var(--status-color);
}

.timeline-more {
  text-align: center;
  padding: 20px;
  font-size: 12px;
  color: var(--timeline-caption);
}
"#;

pub fn ensure_styles(document: &Document) -> Result<(), JsValue> {
    if document.query_selector(STYLE_TAG_SELECTOR)?.is_some() {
        return Ok(());
    }

    let head = document
        .head()
        .ok_or_else(|| JsValue::from_str("Document has no <head>"))?;

    let style_el = document.create_element("style")?;
    style_el.set_attribute("data-timeline-widget", "v1")?;
    style_el.set_text_content(Some(DEFAULT_STYLES));
    head.append_child(&style_el.clone().dyn_into::<Node>()?)?;

    Ok(())
}
