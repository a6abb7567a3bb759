//! Shared admin configuration: the trusted published-sheet URL.

use serde::{Deserialize, Serialize};

/// Marker every accepted published-sheet URL must carry.
pub const CSV_EXPORT_MARKER: &str = "output=csv";

/// The singleton configuration record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sheets_csv_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_config_update: Option<String>,
}

/// Request body for storing the sheet URL.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSheetConfigRequest {
    pub sheets_csv_url: String,
}

impl UpdateSheetConfigRequest {
    /// Check the URL looks like a "publish to web" CSV export.
    pub fn validate(&self) -> Result<&str, String> {
        let url = self.sheets_csv_url.trim();
        if url.is_empty() {
            return Err("sheetsCsvUrl is required".to_string());
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err("sheetsCsvUrl must be an http(s) URL".to_string());
        }
        if !url.contains(CSV_EXPORT_MARKER) {
            return Err(format!(
                "sheetsCsvUrl must be a published CSV export ('{}')",
                CSV_EXPORT_MARKER
            ));
        }
        Ok(url)
    }
}
