use common::model::notification::UploadNotification;
use log::warn;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Where the history array lives. The JSON layout is identical for every
/// implementation, so a file written by one can be read by another.
pub trait NotificationStore {
    fn load(&self) -> Result<Vec<UploadNotification>, StoreError>;
    fn save(&self, notifications: &[UploadNotification]) -> Result<(), StoreError>;
    fn clear(&self) -> Result<(), StoreError>;
}

/// History as a JSON file in the user data directory.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> JsonFileStore {
        JsonFileStore { path: path.into() }
    }

    /// Default per-user location, next to the rest of the dashboard data.
    pub fn default_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("operator-dashboard")
            .join(super::STORE_FILE_NAME)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl NotificationStore for JsonFileStore {
    fn load(&self) -> Result<Vec<UploadNotification>, StoreError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        // A corrupt history yields an empty one rather than an error; the
        // next write replaces it.
        match serde_json::from_str(&raw) {
            Ok(notifications) => Ok(notifications),
            Err(e) => {
                warn!("unreadable notification history ({e}); starting empty");
                Ok(Vec::new())
            }
        }
    }

    fn save(&self, notifications: &[UploadNotification]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string(notifications)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory store for tests.
#[derive(Default)]
pub struct MemoryStore {
    notifications: Mutex<Vec<UploadNotification>>,
}

impl NotificationStore for MemoryStore {
    fn load(&self) -> Result<Vec<UploadNotification>, StoreError> {
        Ok(self.notifications.lock().unwrap().clone())
    }

    fn save(&self, notifications: &[UploadNotification]) -> Result<(), StoreError> {
        *self.notifications.lock().unwrap() = notifications.to_vec();
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.notifications.lock().unwrap().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::model::notification::NotificationKind;

    fn sample(id: &str) -> UploadNotification {
        UploadNotification {
            id: id.to_string(),
            timestamp: 1_755_000_000_000,
            file_name: "data.txt".to_string(),
            mapping_file_name: "MAJNUM.csv".to_string(),
            rows_processed: 10,
            total_rows: 10,
            duplicates_found: Some(2),
            is_read: false,
            kind: NotificationKind::Append,
        }
    }

    #[test]
    fn file_store_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("history.json"));

        assert!(store.load().unwrap().is_empty());
        store.save(&[sample("one"), sample("two")]).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].id, "one");
        assert_eq!(loaded[0].duplicates_found, Some(2));

        store.clear().unwrap();
        assert!(store.load().unwrap().is_empty());
        // Clearing an absent file is fine.
        store.clear().unwrap();
    }

    #[test]
    fn serialized_field_names_match_the_browser_history() {
        let json = serde_json::to_string(&sample("n1")).unwrap();
        for key in [
            "\"fileName\"",
            "\"mappingFileName\"",
            "\"rowsProcessed\"",
            "\"totalRows\"",
            "\"duplicatesFound\"",
            "\"isRead\"",
            "\"type\":\"append\"",
        ] {
            assert!(json.contains(key), "missing {key} in {json}");
        }
    }

    #[test]
    fn corrupt_history_loads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        std::fs::write(&path, "{not json").unwrap();
        let store = JsonFileStore::new(&path);
        assert!(store.load().unwrap().is_empty());
    }
}
