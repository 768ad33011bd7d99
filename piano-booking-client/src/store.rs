use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::StoreError;
use crate::model::BookingDate;

pub const LAST_PICKED_DATE: &str = "last_picked_date";

/// Small persistent key/value store, the command line counterpart of browser local storage.
///
/// Every write is flushed to disk through a temporary file and a rename. A write that cannot be
/// flushed leaves the entries as they were. On unix the file is readable by its owner only.
#[derive(Debug, Default)]
pub struct LocalStore {
    path: Option<PathBuf>,
    entries: BTreeMap<String, String>,
}

impl LocalStore {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// A missing file is an empty store.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let entries = match tokio::fs::read(&path).await {
            Ok(contents) => serde_json::from_slice(&contents)?,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                debug!("no store at {}, starting empty", path.display());
                BTreeMap::new()
            }
            Err(error) => return Err(error.into()),
        };
        Ok(Self {
            path: Some(path),
            entries,
        })
    }

    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub async fn set(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), StoreError> {
        let mut entries = self.entries.clone();
        entries.insert(key.into(), value.into());
        self.persist(&entries).await?;
        self.entries = entries;
        Ok(())
    }

    pub async fn remove(&mut self, key: &str) -> Result<Option<String>, StoreError> {
        if !self.entries.contains_key(key) {
            return Ok(None);
        }
        let mut entries = self.entries.clone();
        let removed = entries.remove(key);
        self.persist(&entries).await?;
        self.entries = entries;
        Ok(removed)
    }

    #[must_use]
    pub fn last_picked_date(&self) -> Option<BookingDate> {
        let stored = self.get(LAST_PICKED_DATE)?;
        match stored.parse() {
            Ok(date) => Some(date),
            Err(error) => {
                warn!("ignoring unreadable {LAST_PICKED_DATE} {stored:?}: {error}");
                None
            }
        }
    }

    pub async fn remember_picked_date(&mut self, date: BookingDate) -> Result<(), StoreError> {
        self.set(LAST_PICKED_DATE, date.wire()).await
    }

    async fn persist(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let contents = serde_json::to_vec_pretty(entries)?;
        let mut temporary = path.clone().into_os_string();
        temporary.push(".tmp");
        tokio::fs::write(&temporary, contents).await?;
        // auth tokens live in here
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt as _;
            let owner_only = std::fs::Permissions::from_mode(0o600);
            tokio::fs::set_permissions(&temporary, owner_only).await?;
        }
        tokio::fs::rename(&temporary, path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_is_empty_and_writes_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");

        let mut store = LocalStore::open(&path).await.unwrap();
        assert_eq!(store.get("student_auth_token"), None);

        store.set("student_auth_token", "abc").await.unwrap();
        store
            .remember_picked_date("2024-05-01".parse().unwrap())
            .await
            .unwrap();

        let reopened = LocalStore::open(&path).await.unwrap();
        assert_eq!(reopened.get("student_auth_token"), Some("abc"));
        assert_eq!(
            reopened.last_picked_date(),
            Some("2024-05-01".parse().unwrap())
        );
        assert!(!dir.path().join("storage.json.tmp").exists());
    }

    #[tokio::test]
    async fn remove_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");

        let mut store = LocalStore::open(&path).await.unwrap();
        store.set("teacher_auth_token", "t").await.unwrap();
        assert_eq!(
            store.remove("teacher_auth_token").await.unwrap().as_deref(),
            Some("t")
        );
        assert_eq!(store.remove("teacher_auth_token").await.unwrap(), None);

        let reopened = LocalStore::open(&path).await.unwrap();
        assert_eq!(reopened.get("teacher_auth_token"), None);
    }

    #[tokio::test]
    async fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");
        tokio::fs::write(&path, b"not json").await.unwrap();

        assert!(matches!(
            LocalStore::open(&path).await,
            Err(StoreError::Json(_))
        ));
    }

    #[tokio::test]
    async fn failed_write_keeps_the_previous_entries() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested");
        std::fs::create_dir(&nested).unwrap();

        let mut store = LocalStore::open(nested.join("storage.json")).await.unwrap();
        store.set("student_auth_token", "abc").await.unwrap();
        std::fs::remove_dir_all(&nested).unwrap();

        assert!(matches!(
            store.set("student_auth_token", "xyz").await,
            Err(StoreError::Io(_))
        ));
        assert_eq!(store.get("student_auth_token"), Some("abc"));
        assert!(matches!(
            store.set("teacher_auth_token", "t").await,
            Err(StoreError::Io(_))
        ));
        assert_eq!(store.get("teacher_auth_token"), None);

        assert!(matches!(
            store.remove("student_auth_token").await,
            Err(StoreError::Io(_))
        ));
        assert_eq!(store.get("student_auth_token"), Some("abc"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn file_is_readable_by_its_owner_only() {
        use std::os::unix::fs::PermissionsExt as _;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");
        let mut store = LocalStore::open(&path).await.unwrap();
        store.set("student_auth_token", "abc").await.unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[tokio::test]
    async fn unreadable_date_is_ignored() {
        let mut store = LocalStore::in_memory();
        store.set(LAST_PICKED_DATE, "yesterday").await.unwrap();
        assert_eq!(store.last_picked_date(), None);
    }
}
