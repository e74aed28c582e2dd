use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// One row of a code table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CodeEntry {
    pub code: String,
    #[serde(default)]
    pub display: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub localized_display: Option<String>,
}

impl CodeEntry {
    pub fn new(code: &str, display: &str) -> Self {
        Self {
            code: code.to_string(),
            display: Some(display.to_string()),
            localized_display: None,
        }
    }

    pub fn localized(mut self, text: &str) -> Self {
        self.localized_display = Some(text.to_string());
        self
    }

    /// Localized display, else display, else the raw code.
    pub fn label(&self) -> &str {
        self.localized_display
            .as_deref()
            .filter(|s| !s.is_empty())
            .or(self.display.as_deref().filter(|s| !s.is_empty()))
            .unwrap_or(&self.code)
    }
}

/// What a picker shows for one code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CodeLabel {
    pub code: String,
    pub label: String,
}
