use serde::{Deserialize, Serialize};

use crate::model::record::SecurityRecord;

/// Reply of `POST /api/process_files`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessFilesResponse {
    pub success: bool,
    pub message: String,
    pub rows_processed: u32,
    pub total_rows: u32,
    /// Rows skipped because they were already stored. Optional so older
    /// consumers of the original four-field reply keep working.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub duplicates_found: Option<u32>,
}

/// Reply of `GET /api/health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

/// Reply of `GET /api/csv/check`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResponse {
    pub exists: bool,
}

/// Reply of `DELETE /api/csv/purge` and `POST /api/load_data`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutcomeResponse {
    pub success: bool,
    pub message: String,
}

/// Error body of a non-2xx reply. The three fields cover the historical
/// shapes (`detail` from the processing service, `message`/`error` from the
/// local routes); [`ErrorBody::best_message`] picks whichever is present.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorBody {
    pub fn detail(text: impl Into<String>) -> Self {
        ErrorBody {
            detail: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        ErrorBody {
            error: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn best_message(&self) -> Option<&str> {
        self.detail
            .as_deref()
            .or(self.message.as_deref())
            .or(self.error.as_deref())
    }
}

/// One page of per-operator aggregates from `GET /api/csv/data`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPage {
    pub data: Vec<SecurityRecord>,
    pub total_pages: u32,
    pub total_count: u32,
    pub is_filtered: bool,
    /// `"no_data"` when nothing has been imported yet.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// One slice of a stats chart (`GET /api/csv/stats`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatPoint {
    pub name: String,
    pub value: f64,
}

/// Distinct values available for filtering (`GET /api/csv/filter-options`).
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct FilterOptions {
    pub statuts: Vec<String>,
    pub fa_statuts: Vec<String>,
    pub annees: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
