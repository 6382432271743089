//! Static fallback shown when the widget cannot render.

pub(crate) const TITLE: &str = "Failed to load the widget";
pub(crate) const HINT: &str = "Refresh the page or check the configuration";

/// Markup written straight into a mount target once Yew can no longer
/// render it.
pub(crate) fn markup() -> String {
    format!(
        r#"<div class="timeline-fallback"><div class="fallback-title">{TITLE}</div><div class="fallback-hint">{HINT}</div></div>"#
    )
}
