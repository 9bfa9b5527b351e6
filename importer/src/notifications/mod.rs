//! Persisted import history.
//!
//! The dashboard kept this as a JSON array in per-browser storage under the
//! `operator_dashboard_notifications` key; here the same array lives in a
//! JSON file in the user data directory, behind a small store trait so tests
//! run against memory. Entries are prepended (most recent first) and only
//! ever mutated to flip their read flag. Writes are last-wins: two processes
//! racing on the file can lose an update, which matches the single-user
//! assumption this history has always had.

mod store;

pub use store::{JsonFileStore, MemoryStore, NotificationStore, StoreError};

use common::model::notification::{NotificationKind, UploadNotification};
use std::time::{SystemTime, UNIX_EPOCH};

/// File name mirroring the original storage key.
pub const STORE_FILE_NAME: &str = "operator_dashboard_notifications.json";

/// Fields the caller provides for a new entry; id, timestamp and the unread
/// flag are filled in by [`NotificationLog::add`].
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub file_name: String,
    pub mapping_file_name: String,
    pub rows_processed: u32,
    pub total_rows: u32,
    pub duplicates_found: Option<u32>,
    pub kind: NotificationKind,
}

pub struct NotificationLog<S: NotificationStore> {
    store: S,
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

impl<S: NotificationStore> NotificationLog<S> {
    pub fn new(store: S) -> NotificationLog<S> {
        NotificationLog { store }
    }

    /// All entries, most recent first.
    pub fn notifications(&self) -> Result<Vec<UploadNotification>, StoreError> {
        self.store.load()
    }

    /// Prepends a new unread entry and returns it.
    pub fn add(&self, entry: NewNotification) -> Result<UploadNotification, StoreError> {
        let notification = UploadNotification {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: now_millis(),
            file_name: entry.file_name,
            mapping_file_name: entry.mapping_file_name,
            rows_processed: entry.rows_processed,
            total_rows: entry.total_rows,
            duplicates_found: entry.duplicates_found,
            is_read: false,
            kind: entry.kind,
        };

        let mut notifications = self.store.load()?;
        notifications.insert(0, notification.clone());
        self.store.save(&notifications)?;
        Ok(notification)
    }

    pub fn mark_read(&self, id: &str) -> Result<(), StoreError> {
        let mut notifications = self.store.load()?;
        for notification in &mut notifications {
            if notification.id == id {
                notification.is_read = true;
            }
        }
        self.store.save(&notifications)
    }

    pub fn mark_all_read(&self) -> Result<(), StoreError> {
        let mut notifications = self.store.load()?;
        for notification in &mut notifications {
            notification.is_read = true;
        }
        self.store.save(&notifications)
    }

    pub fn delete(&self, id: &str) -> Result<(), StoreError> {
        let mut notifications = self.store.load()?;
        notifications.retain(|notification| notification.id != id);
        self.store.save(&notifications)
    }

    /// Clears the whole history.
    pub fn purge_all(&self) -> Result<(), StoreError> {
        self.store.clear()
    }

    pub fn unread_count(&self) -> Result<usize, StoreError> {
        Ok(self
            .store
            .load()?
            .iter()
            .filter(|notification| !notification.is_read)
            .count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log() -> NotificationLog<MemoryStore> {
        NotificationLog::new(MemoryStore::default())
    }

    fn entry(name: &str) -> NewNotification {
        NewNotification {
            file_name: name.to_string(),
            mapping_file_name: "MAJNUM.csv".to_string(),
            rows_processed: 100,
            total_rows: 100,
            duplicates_found: None,
            kind: NotificationKind::Upload,
        }
    }

    #[test]
    fn entries_are_prepended_and_unread() {
        let log = log();
        log.add(entry("a.txt")).unwrap();
        log.add(entry("b.txt")).unwrap();

        let notifications = log.notifications().unwrap();
        assert_eq!(notifications.len(), 2);
        assert_eq!(notifications[0].file_name, "b.txt");
        assert!(notifications.iter().all(|n| !n.is_read));
        assert_eq!(log.unread_count().unwrap(), 2);
    }

    #[test]
    fn mark_all_read_zeroes_the_unread_count() {
        let log = log();
        for i in 0..5 {
            log.add(entry(&format!("part{i}.txt"))).unwrap();
        }
        log.mark_all_read().unwrap();
        assert_eq!(log.unread_count().unwrap(), 0);
    }

    #[test]
    fn mark_read_touches_only_the_target() {
        let log = log();
        let first = log.add(entry("a.txt")).unwrap();
        log.add(entry("b.txt")).unwrap();

        log.mark_read(&first.id).unwrap();
        let notifications = log.notifications().unwrap();
        assert!(notifications.iter().find(|n| n.id == first.id).unwrap().is_read);
        assert_eq!(log.unread_count().unwrap(), 1);
    }

    #[test]
    fn purge_empties_the_history() {
        let log = log();
        log.add(entry("a.txt")).unwrap();
        log.add(entry("b.txt")).unwrap();
        log.purge_all().unwrap();
        assert!(log.notifications().unwrap().is_empty());
    }

    #[test]
    fn delete_removes_one_entry() {
        let log = log();
        let first = log.add(entry("a.txt")).unwrap();
        log.add(entry("b.txt")).unwrap();
        log.delete(&first.id).unwrap();

        let notifications = log.notifications().unwrap();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].file_name, "b.txt");
    }
}
