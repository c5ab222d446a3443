//! Durable credential storage that survives restarts.
//!
//! Three independent string keys, mirroring a browser-style key-value store:
//!
//! | key | value |
//! |---|---|
//! | `auth_token` | identity token |
//! | `auth_user` | serialized [`UserSnapshot`] JSON |
//! | `session_id` | server-issued session identifier |
//!
//! Writes are last-write-wins. Interleaved operations may race on a key; every
//! writer of a given logical operation holds the same final value, so the race
//! only decides which identical value lands last.
//!
//! # Corrupt State
//!
//! A malformed `auth_user` degrades to "no identity": both `auth_token` and
//! `auth_user` are removed before `load` returns. A corrupt or empty backing
//! file is treated as an empty store.
//!
//! # Atomic Writes
//!
//! [`FileKeyValueStore`] writes through a temp file + rename so a crash never
//! leaves a half-written file behind.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use planner_protocol::UserSnapshot;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::error::{PlannerError, Result};
use crate::lock;

pub const TOKEN_KEY: &str = "auth_token";
pub const USER_KEY: &str = "auth_user";
pub const SESSION_KEY: &str = "session_id";

// ═══════════════════════════════════════════════════════════════════════════════
// Key-value backends
// ═══════════════════════════════════════════════════════════════════════════════

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> Option<String> {
        lock(&self.entries).get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        lock(&self.entries).insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        lock(&self.entries).remove(key);
        Ok(())
    }
}

/// JSON object on disk, cached in memory after the first read.
#[derive(Debug)]
pub struct FileKeyValueStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileKeyValueStore {
    pub fn open(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            entries: Mutex::new(read_entries(path)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        let content = serde_json::to_string_pretty(entries).map_err(|source| PlannerError::Json {
            context: "serializing credentials".to_string(),
            source,
        })?;

        let parent_dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let storage_err = |context: &str, source: std::io::Error| PlannerError::Storage {
            context: format!("{} {}", context, self.path.display()),
            source,
        };

        fs_err::create_dir_all(parent_dir).map_err(|e| storage_err("creating parent of", e))?;
        let mut temp_file =
            NamedTempFile::new_in(parent_dir).map_err(|e| storage_err("temp file for", e))?;
        temp_file
            .write_all(content.as_bytes())
            .map_err(|e| storage_err("writing", e))?;
        temp_file.flush().map_err(|e| storage_err("flushing", e))?;
        temp_file
            .persist(&self.path)
            .map_err(|e| storage_err("replacing", e.error))?;
        Ok(())
    }
}

fn read_entries(path: &Path) -> BTreeMap<String, String> {
    let content = match fs_err::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return BTreeMap::new(),
        Err(err) => {
            tracing::warn!(error = %err, "Failed to read credentials file, starting empty");
            return BTreeMap::new();
        }
    };

    if content.trim().is_empty() {
        return BTreeMap::new();
    }

    match serde_json::from_str(&content) {
        Ok(entries) => entries,
        Err(err) => {
            tracing::warn!(
                error = %err,
                path = %path.display(),
                "Credentials file is corrupt, starting empty"
            );
            BTreeMap::new()
        }
    }
}

impl KeyValueStore for FileKeyValueStore {
    fn get(&self, key: &str) -> Option<String> {
        lock(&self.entries).get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = lock(&self.entries);
        entries.insert(key.to_string(), value.to_string());
        self.persist(&entries)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = lock(&self.entries);
        if entries.remove(key).is_none() {
            return Ok(());
        }
        self.persist(&entries)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Credential record
// ═══════════════════════════════════════════════════════════════════════════════

/// Everything the client persists about who it is.
///
/// `token` and `user` travel together in normal operation; a record holding
/// only one of them is not an authenticated identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub token: Option<String>,
    pub user: Option<UserSnapshot>,
    pub session_id: Option<String>,
}

impl CredentialRecord {
    pub fn is_empty(&self) -> bool {
        self.token.is_none() && self.user.is_none() && self.session_id.is_none()
    }
}

pub struct CredentialStore {
    backend: Box<dyn KeyValueStore>,
}

impl CredentialStore {
    pub fn new(backend: Box<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryKeyValueStore::new()))
    }

    pub fn open(path: &Path) -> Self {
        Self::new(Box::new(FileKeyValueStore::open(path)))
    }

    /// Writes every field of `record`; `None` fields are removed.
    pub fn save(&self, record: &CredentialRecord) -> Result<()> {
        self.write_token(record.token.as_deref())?;
        self.write_user(record.user.as_ref())?;
        self.write(SESSION_KEY, record.session_id.as_deref())
    }

    /// Reads the persisted record. Never fails: a malformed user snapshot
    /// clears the identity keys and yields a record without identity.
    pub fn load(&self) -> CredentialRecord {
        let token = self.backend.get(TOKEN_KEY);
        let session_id = self.backend.get(SESSION_KEY);
        let raw_user = self.backend.get(USER_KEY);

        let user = match raw_user.as_deref().map(serde_json::from_str::<UserSnapshot>) {
            None => None,
            Some(Ok(user)) => Some(user),
            Some(Err(err)) => {
                tracing::warn!(error = %err, "Stored user snapshot is malformed, clearing identity");
                if let Err(clear_err) = self.clear_identity() {
                    tracing::warn!(error = %clear_err, "Failed to clear malformed identity");
                }
                return CredentialRecord {
                    token: None,
                    user: None,
                    session_id,
                };
            }
        };

        CredentialRecord {
            token,
            user,
            session_id,
        }
    }

    /// Removes every key.
    pub fn clear(&self) -> Result<()> {
        self.save(&CredentialRecord::default())
    }

    pub fn save_identity(&self, token: &str, user: &UserSnapshot) -> Result<()> {
        self.write_token(Some(token))?;
        self.write_user(Some(user))
    }

    pub fn clear_identity(&self) -> Result<()> {
        self.write_token(None)?;
        self.write_user(None)
    }

    pub fn save_session_id(&self, session_id: &str) -> Result<()> {
        self.write(SESSION_KEY, Some(session_id))
    }

    pub fn clear_session_id(&self) -> Result<()> {
        self.write(SESSION_KEY, None)
    }

    fn write_token(&self, token: Option<&str>) -> Result<()> {
        self.write(TOKEN_KEY, token)
    }

    fn write_user(&self, user: Option<&UserSnapshot>) -> Result<()> {
        let serialized = user
            .map(serde_json::to_string)
            .transpose()
            .map_err(|source| PlannerError::Json {
                context: "serializing user snapshot".to_string(),
                source,
            })?;
        self.write(USER_KEY, serialized.as_deref())
    }

    fn write(&self, key: &str, value: Option<&str>) -> Result<()> {
        match value {
            Some(value) => self.backend.set(key, value),
            None => self.backend.remove(key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn alice() -> UserSnapshot {
        UserSnapshot {
            id: "user-42".to_string(),
            username: "alice".to_string(),
            email: "alice@example.edu".to_string(),
            confirmed: true,
        }
    }

    fn full_record() -> CredentialRecord {
        CredentialRecord {
            token: Some("tok-1".to_string()),
            user: Some(alice()),
            session_id: Some("sess-1".to_string()),
        }
    }

    #[test]
    fn load_after_save_returns_saved_record() {
        let store = CredentialStore::in_memory();
        let records = [
            full_record(),
            CredentialRecord::default(),
            CredentialRecord {
                session_id: Some("sess-only".to_string()),
                ..Default::default()
            },
            CredentialRecord {
                token: Some("tok-without-user".to_string()),
                ..Default::default()
            },
            full_record(),
        ];

        for record in records {
            store.save(&record).unwrap();
            assert_eq!(store.load(), record);
        }
    }

    #[test]
    fn last_write_wins() {
        let store = CredentialStore::in_memory();
        store.save_session_id("sess-1").unwrap();
        store.save_session_id("sess-2").unwrap();
        assert_eq!(store.load().session_id.as_deref(), Some("sess-2"));
    }

    #[test]
    fn partial_writers_do_not_clobber_each_other() {
        let store = CredentialStore::in_memory();
        store.save_identity("tok-1", &alice()).unwrap();
        store.save_session_id("sess-1").unwrap();
        store.clear_session_id().unwrap();

        let record = store.load();
        assert_eq!(record.token.as_deref(), Some("tok-1"));
        assert_eq!(record.user, Some(alice()));
        assert_eq!(record.session_id, None);
    }

    #[test]
    fn malformed_user_clears_identity_keys() {
        let backend = MemoryKeyValueStore::new();
        backend.set(TOKEN_KEY, "tok-1").unwrap();
        backend.set(USER_KEY, "{not json").unwrap();
        backend.set(SESSION_KEY, "sess-1").unwrap();
        let store = CredentialStore::new(Box::new(backend));

        let record = store.load();
        assert_eq!(record.token, None);
        assert_eq!(record.user, None);
        assert_eq!(record.session_id.as_deref(), Some("sess-1"));

        // The clearing is durable, not just a view.
        assert_eq!(store.backend.get(TOKEN_KEY), None);
        assert_eq!(store.backend.get(USER_KEY), None);
    }

    #[test]
    fn clear_is_idempotent() {
        let store = CredentialStore::in_memory();
        store.save(&full_record()).unwrap();
        store.clear().unwrap();
        store.clear().unwrap();
        assert!(store.load().is_empty());
    }

    #[test]
    fn file_store_survives_reopen() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("credentials.json");

        CredentialStore::open(&path).save(&full_record()).unwrap();

        let reopened = CredentialStore::open(&path);
        assert_eq!(reopened.load(), full_record());
    }

    #[test]
    fn file_store_persists_user_as_serialized_string() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("credentials.json");
        CredentialStore::open(&path).save(&full_record()).unwrap();

        let raw: BTreeMap<String, String> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let user: UserSnapshot = serde_json::from_str(&raw[USER_KEY]).unwrap();
        assert_eq!(user, alice());
        assert_eq!(raw[TOKEN_KEY], "tok-1");
    }

    #[test]
    fn corrupt_file_loads_as_empty() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("credentials.json");
        std::fs::write(&path, "{\"auth_token\": ").unwrap();

        assert!(CredentialStore::open(&path).load().is_empty());
    }

    #[test]
    fn empty_file_loads_as_empty() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("credentials.json");
        std::fs::write(&path, "   \n").unwrap();

        assert!(CredentialStore::open(&path).load().is_empty());
    }

    #[test]
    fn file_store_creates_missing_parent() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("credentials.json");

        CredentialStore::open(&path).save_session_id("sess-1").unwrap();
        assert!(path.exists());
    }
}
