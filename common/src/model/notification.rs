use serde::{Deserialize, Serialize};

/// Kind of event recorded in the import history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    /// First load into an empty store.
    Upload,
    /// Data added on top of an existing store.
    Append,
    /// The store was emptied.
    Purge,
}

/// One entry of the persisted import history.
///
/// Serialized field names match the JSON array the dashboard kept under its
/// `operator_dashboard_notifications` storage key, so an existing history
/// file stays readable. Entries are immutable except for the `is_read` flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadNotification {
    pub id: String,
    /// Unix timestamp in milliseconds.
    pub timestamp: u64,
    pub file_name: String,
    pub mapping_file_name: String,
    pub rows_processed: u32,
    pub total_rows: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicates_found: Option<u32>,
    pub is_read: bool,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
}
