//! Widget configuration: presentation options, the persisted host shape and
//! the builder used by the configuration panel.

use serde::{Deserialize, Serialize};

use crate::TimelineError;

/// Text size of timeline labels.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum FontSize {
    XSmall,
    Small,
    #[default]
    Medium,
    Large,
    XLarge,
}

impl FontSize {
    pub fn pixels(self) -> u32 {
        match self {
            FontSize::XSmall => 12,
            FontSize::Small => 14,
            FontSize::Medium => 16,
            FontSize::Large => 18,
            FontSize::XLarge => 20,
        }
    }
}

/// Gap between consecutive timeline items.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Spacing {
    XTight,
    Tight,
    #[default]
    Medium,
    Loose,
    XLoose,
}

impl Spacing {
    pub fn pixels(self) -> u32 {
        match self {
            Spacing::XTight => 8,
            Spacing::Tight => 12,
            Spacing::Medium => 16,
            Spacing::Loose => 24,
            Spacing::XLoose => 32,
        }
    }
}

/// Orientation of the timeline axis.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    #[default]
    Vertical,
    Horizontal,
}

/// Caption shown under each entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum StatusMode {
    #[default]
    None,
    Completion,
    RemainingDays,
}

/// Presentation options. Changing them never triggers a re-fetch.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct DisplayOptions {
    pub font_size: FontSize,
    pub spacing: Spacing,
    pub display_mode: DisplayMode,
    pub status_mode: StatusMode,
}

/// The three identifiers that decide what gets fetched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineQuery {
    pub table_id: String,
    pub event_field_id: String,
    pub completion_field_id: String,
}

/// Effective widget configuration, read-only to the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct DisplayConfig {
    #[serde(default)]
    pub selected_table_id: Option<String>,
    #[serde(default)]
    pub event_field_id: Option<String>,
    #[serde(default, rename = "completeTimeFieldId")]
    pub completion_field_id: Option<String>,
    #[serde(flatten)]
    pub options: DisplayOptions,
}

impl DisplayConfig {
    /// Fetch query, or `None` while any identifier is still unset.
    pub fn query(&self) -> Option<TimelineQuery> {
        Some(TimelineQuery {
            table_id: non_empty(&self.selected_table_id)?,
            event_field_id: non_empty(&self.event_field_id)?,
            completion_field_id: non_empty(&self.completion_field_id)?,
        })
    }

    /// Rebuild the config from its persisted form. The table id lives in the
    /// first data condition.
    pub fn from_saved(saved: &SavedConfig) -> Result<Self, TimelineError> {
        let condition = saved
            .data_conditions
            .first()
            .ok_or(TimelineError::MissingData)?;

        Ok(Self {
            selected_table_id: condition.table_id.clone(),
            event_field_id: saved.custom_config.event_field_id.clone(),
            completion_field_id: saved.custom_config.completion_field_id.clone(),
            options: saved.custom_config.options,
        })
    }

    pub fn to_saved(&self, base_token: Option<String>) -> SavedConfig {
        SavedConfig {
            custom_config: CustomConfig {
                event_field_id: self.event_field_id.clone(),
                completion_field_id: self.completion_field_id.clone(),
                options: self.options,
            },
            data_conditions: vec![DataCondition {
                table_id: self.selected_table_id.clone(),
                base_token,
            }],
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|id| !id.is_empty()).cloned()
}

/// Shape the host config store persists.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SavedConfig {
    #[serde(default)]
    pub custom_config: CustomConfig,
    #[serde(default)]
    pub data_conditions: Vec<DataCondition>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct CustomConfig {
    #[serde(default)]
    pub event_field_id: Option<String>,
    #[serde(default, rename = "completeTimeFieldId")]
    pub completion_field_id: Option<String>,
    #[serde(flatten)]
    pub options: DisplayOptions,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct DataCondition {
    #[serde(default)]
    pub table_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_token: Option<String>,
}

/// Field types the widget cares about. Host codes: 1 = text, 5 = date-time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(from = "u32", into = "u32")]
pub enum FieldKind {
    Text,
    DateTime,
    Other(u32),
}

impl From<u32> for FieldKind {
    fn from(code: u32) -> Self {
        match code {
            1 => FieldKind::Text,
            5 => FieldKind::DateTime,
            other => FieldKind::Other(other),
        }
    }
}

impl From<FieldKind> for u32 {
    fn from(kind: FieldKind) -> Self {
        match kind {
            FieldKind::Text => 1,
            FieldKind::DateTime => 5,
            FieldKind::Other(code) => code,
        }
    }
}

/// Field metadata as listed by the host for a table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FieldMeta {
    pub field_id: String,
    #[serde(default)]
    pub field_name: String,
    pub field_type: FieldKind,
}

/// Picker options for one field slot.
pub fn eligible_fields(fields: &[FieldMeta], kind: FieldKind) -> impl Iterator<Item = &FieldMeta> {
    fields.iter().filter(move |field| field.field_type == kind)
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("no table selected")]
    MissingTable,
    #[error("no event field selected")]
    MissingEventField,
    #[error("no completion time field selected")]
    MissingCompletionField,
}

/// Editable configuration held by one configuration panel instance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigBuilder {
    base_token: Option<String>,
    table_id: Option<String>,
    event_field_id: Option<String>,
    completion_field_id: Option<String>,
    options: DisplayOptions,
    initialized: bool,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn initialized(&self) -> bool {
        self.initialized
    }

    /// Seed the builder from a stored config. Only the first load applies so
    /// later host pushes do not clobber in-progress edits.
    pub fn load(&mut self, config: &DisplayConfig, base_token: Option<String>) -> bool {
        if self.initialized {
            return false;
        }
        self.base_token = base_token;
        self.table_id = config.selected_table_id.clone();
        self.event_field_id = config.event_field_id.clone();
        self.completion_field_id = config.completion_field_id.clone();
        self.options = config.options;
        self.initialized = true;
        true
    }

    /// Switching base invalidates every table and field choice.
    pub fn change_base(&mut self, base_token: impl Into<String>) {
        self.base_token = Some(base_token.into());
        self.table_id = None;
        self.event_field_id = None;
        self.completion_field_id = None;
    }

    /// Field ids belong to a table, so a new table clears them.
    pub fn select_table(&mut self, table_id: impl Into<String>) {
        let table_id = table_id.into();
        if self.table_id.as_deref() != Some(table_id.as_str()) {
            self.event_field_id = None;
            self.completion_field_id = None;
        }
        self.table_id = Some(table_id);
    }

    pub fn set_event_field(&mut self, field_id: impl Into<String>) {
        self.event_field_id = Some(field_id.into());
    }

    pub fn set_completion_field(&mut self, field_id: impl Into<String>) {
        self.completion_field_id = Some(field_id.into());
    }

    pub fn set_font_size(&mut self, font_size: FontSize) {
        self.options.font_size = font_size;
    }

    pub fn set_spacing(&mut self, spacing: Spacing) {
        self.options.spacing = spacing;
    }

    pub fn set_display_mode(&mut self, display_mode: DisplayMode) {
        self.options.display_mode = display_mode;
    }

    pub fn set_status_mode(&mut self, status_mode: StatusMode) {
        self.options.status_mode = status_mode;
    }

    /// Default picks for a freshly created widget: walking the field list
    /// from the end, the first text field becomes the event and the first
    /// date-time field the completion time.
    pub fn auto_select_fields(&mut self, fields: &[FieldMeta]) {
        let mut event = None;
        let mut completion = None;
        for field in fields.iter().rev() {
            match field.field_type {
                FieldKind::Text if event.is_none() => event = Some(field.field_id.clone()),
                FieldKind::DateTime if completion.is_none() => {
                    completion = Some(field.field_id.clone())
                }
                _ => {}
            }
        }
        if event.is_some() {
            self.event_field_id = event;
        }
        if completion.is_some() {
            self.completion_field_id = completion;
        }
    }

    /// Config for the live preview, once all three ids are chosen.
    pub fn preview(&self) -> Option<DisplayConfig> {
        self.validate().ok()
    }

    pub fn validate(&self) -> Result<DisplayConfig, ValidationError> {
        let table_id = non_empty(&self.table_id).ok_or(ValidationError::MissingTable)?;
        let event_field_id =
            non_empty(&self.event_field_id).ok_or(ValidationError::MissingEventField)?;
        let completion_field_id =
            non_empty(&self.completion_field_id).ok_or(ValidationError::MissingCompletionField)?;

        Ok(DisplayConfig {
            selected_table_id: Some(table_id),
            event_field_id: Some(event_field_id),
            completion_field_id: Some(completion_field_id),
            options: self.options,
        })
    }

    /// Validated config in the form the host persists.
    pub fn save(&self) -> Result<SavedConfig, ValidationError> {
        Ok(self.validate()?.to_saved(self.base_token.clone()))
    }
}
