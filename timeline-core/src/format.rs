use std::fmt::Display;

use chrono::{DateTime, TimeZone};

use crate::{EntryStatus, StatusMode, TimelineEntry};

const DAY_MILLIS: i64 = 24 * 60 * 60 * 1000;

/// Render epoch millis as `YYYY-MM-DD` in the given time zone.
pub fn format_date<Tz>(millis: i64, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    DateTime::from_timestamp_millis(millis)
        .map(|dt| dt.with_timezone(tz).format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "--".to_string())
}

/// Keep the first `max_chars` characters and mark the cut with `...`.
pub fn abbreviate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// Whole days from `now` until `completion_time`. Upcoming deadlines round
/// up; past ones count only completed days, so the first 24 hours are `0`.
pub fn remaining_days(completion_time: i64, now: i64) -> i64 {
    let delta = completion_time - now;
    if delta >= 0 {
        (delta + DAY_MILLIS - 1) / DAY_MILLIS
    } else {
        delta / DAY_MILLIS
    }
}

pub fn status_label(status: EntryStatus) -> &'static str {
    match status {
        EntryStatus::Finished => "Finished",
        EntryStatus::Unfinished => "Unfinished",
    }
}

/// Caption under an entry for the configured status mode.
pub fn status_caption(entry: &TimelineEntry, mode: StatusMode, now: i64) -> Option<String> {
    match mode {
        StatusMode::None => None,
        StatusMode::Completion => Some(status_label(entry.status_at(now)).to_string()),
        StatusMode::RemainingDays => {
            let days = remaining_days(entry.completion_time(), now);
            let caption = match entry.status_at(now) {
                EntryStatus::Unfinished if days <= 1 => "Due today".to_string(),
                EntryStatus::Unfinished => format!("{days} days left"),
                EntryStatus::Finished if days == 0 => "Today".to_string(),
                EntryStatus::Finished if days == -1 => "1 day ago".to_string(),
                EntryStatus::Finished => format!("{} days ago", -days),
            };
            Some(caption)
        }
    }
}
