//! Dismissal persistence, split across two lifetimes.
//!
//! The session tier lives as long as the user's session (by default the
//! process); the permanent tier survives until explicitly cleared. Each tier
//! is a key-value scope storing a JSON array of ids under
//! [`DISMISSED_KEY`]. A banner is dismissed if its id is in either tier.
//!
//! Storage failures never propagate: an unreadable or corrupt scope reads as
//! "nothing dismissed" and failed writes are logged.

use crate::error::{HeraldError, Result};
use crate::storage::StorageConfig;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::warn;

pub const DISMISSED_KEY: &str = "dismissed_banners";

/// A string key-value store with one lifetime.
pub trait KeyValueScope: Send {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
    fn remove(&mut self, key: &str) -> Result<()>;
}

/// In-process scope. Cleared when the process (session) ends.
#[derive(Debug, Default)]
pub struct MemoryScope {
    values: HashMap<String, String>,
}

impl MemoryScope {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueScope for MemoryScope {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.values.remove(key);
        Ok(())
    }
}

/// Directory-backed scope: one `<key>.json` file per key.
///
/// Writes go through a temp file + rename so a crash never leaves a
/// half-written list behind.
#[derive(Debug, Clone)]
pub struct FileScope {
    dir: PathBuf,
}

impl FileScope {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    fn unavailable(path: PathBuf, source: std::io::Error) -> HeraldError {
        HeraldError::StorageUnavailable { path, source }
    }
}

impl KeyValueScope for FileScope {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        match fs_err::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(Self::unavailable(path, err)),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key);
        fs_err::create_dir_all(&self.dir).map_err(|e| Self::unavailable(self.dir.clone(), e))?;

        let mut temp_file =
            NamedTempFile::new_in(&self.dir).map_err(|e| Self::unavailable(path.clone(), e))?;
        temp_file
            .write_all(value.as_bytes())
            .map_err(|e| Self::unavailable(path.clone(), e))?;
        temp_file
            .flush()
            .map_err(|e| Self::unavailable(path.clone(), e))?;
        temp_file
            .persist(&path)
            .map_err(|e| Self::unavailable(path.clone(), e.error))?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        match fs_err::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(Self::unavailable(path, err)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Session,
    Permanent,
}

impl Tier {
    fn label(self) -> &'static str {
        match self {
            Tier::Session => "session",
            Tier::Permanent => "permanent",
        }
    }
}

/// Durable record of which banner ids the user has suppressed.
pub struct DismissalStore {
    session: Box<dyn KeyValueScope>,
    permanent: Box<dyn KeyValueScope>,
}

impl DismissalStore {
    pub fn new(session: Box<dyn KeyValueScope>, permanent: Box<dyn KeyValueScope>) -> Self {
        Self { session, permanent }
    }

    /// Both tiers in memory. Used by tests and embedders without a disk.
    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryScope::new()), Box::new(MemoryScope::new()))
    }

    /// Permanent tier on disk; session tier on disk when a session id is
    /// given, otherwise in memory for the lifetime of the process.
    pub fn with_storage(storage: &StorageConfig, session_id: Option<&str>) -> Self {
        let session: Box<dyn KeyValueScope> = match session_id {
            Some(id) if !id.trim().is_empty() => {
                Box::new(FileScope::new(storage.session_scope_dir(id)))
            }
            _ => Box::new(MemoryScope::new()),
        };
        Self::new(
            session,
            Box::new(FileScope::new(storage.permanent_scope_dir())),
        )
    }

    pub fn is_dismissed(&self, id: &str) -> bool {
        self.ids(Tier::Session).iter().any(|d| d == id)
            || self.ids(Tier::Permanent).iter().any(|d| d == id)
    }

    /// Adds `id` to one tier. Adding an id that is already present is a no-op.
    pub fn dismiss(&mut self, id: &str, permanent: bool) {
        let tier = if permanent {
            Tier::Permanent
        } else {
            Tier::Session
        };
        let mut ids = self.ids(tier);
        if ids.iter().any(|d| d == id) {
            return;
        }
        ids.push(id.to_string());
        self.write_ids(tier, &ids);
    }

    /// Clears both tiers.
    pub fn undismiss_all(&mut self) {
        self.clear(Tier::Session);
        self.clear(Tier::Permanent);
    }

    /// Clears only the session tier.
    pub fn end_session(&mut self) {
        self.clear(Tier::Session);
    }

    /// Union of both tiers.
    pub fn all_dismissed_ids(&self) -> HashSet<String> {
        self.ids(Tier::Session)
            .into_iter()
            .chain(self.ids(Tier::Permanent))
            .collect()
    }

    /// Ids in one tier, sorted, for display.
    pub fn tier_ids(&self, tier: Tier) -> Vec<String> {
        self.ids(tier)
            .into_iter()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    fn scope(&self, tier: Tier) -> &dyn KeyValueScope {
        match tier {
            Tier::Session => self.session.as_ref(),
            Tier::Permanent => self.permanent.as_ref(),
        }
    }

    fn scope_mut(&mut self, tier: Tier) -> &mut dyn KeyValueScope {
        match tier {
            Tier::Session => self.session.as_mut(),
            Tier::Permanent => self.permanent.as_mut(),
        }
    }

    fn ids(&self, tier: Tier) -> Vec<String> {
        let raw = match self.scope(tier).get(DISMISSED_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(err) => {
                warn!(error = %err, tier = tier.label(), "Dismissal storage unreadable; treating as empty");
                return Vec::new();
            }
        };
        if raw.trim().is_empty() {
            return Vec::new();
        }
        match serde_json::from_str::<Vec<String>>(&raw) {
            Ok(ids) => ids,
            Err(err) => {
                warn!(error = %err, tier = tier.label(), "Dismissal list corrupt; treating as empty");
                Vec::new()
            }
        }
    }

    fn write_ids(&mut self, tier: Tier, ids: &[String]) {
        let payload = match serde_json::to_string(ids) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(error = %err, "Failed to serialize dismissal list");
                return;
            }
        };
        if let Err(err) = self.scope_mut(tier).set(DISMISSED_KEY, &payload) {
            warn!(error = %err, tier = tier.label(), "Failed to persist dismissal");
        }
    }

    fn clear(&mut self, tier: Tier) {
        if let Err(err) = self.scope_mut(tier).remove(DISMISSED_KEY) {
            warn!(error = %err, tier = tier.label(), "Failed to clear dismissals");
        }
    }
}

/// Deletes a named session's scope directory. Run after the session has
/// ended; a scope that was never written is not an error.
pub fn discard_session_scope(storage: &StorageConfig, session_id: &str) -> Result<()> {
    let dir = storage.session_scope_dir(session_id);
    match fs_err::remove_dir_all(&dir) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(HeraldError::StorageUnavailable {
            path: dir,
            source: err,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct BrokenScope;

    impl KeyValueScope for BrokenScope {
        fn get(&self, _key: &str) -> Result<Option<String>> {
            Err(HeraldError::StorageUnavailable {
                path: PathBuf::from("/broken"),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
            })
        }

        fn set(&mut self, _key: &str, _value: &str) -> Result<()> {
            Err(HeraldError::StorageUnavailable {
                path: PathBuf::from("/broken"),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
            })
        }

        fn remove(&mut self, key: &str) -> Result<()> {
            self.set(key, "")
        }
    }

    #[test]
    fn dismissed_in_either_tier() {
        let mut store = DismissalStore::in_memory();
        store.dismiss("a", false);
        store.dismiss("b", true);

        assert!(store.is_dismissed("a"));
        assert!(store.is_dismissed("b"));
        assert!(!store.is_dismissed("c"));
        assert_eq!(store.tier_ids(Tier::Session), vec!["a".to_string()]);
        assert_eq!(store.tier_ids(Tier::Permanent), vec!["b".to_string()]);
    }

    #[test]
    fn dismiss_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("permanent");
        let mut store = DismissalStore::new(
            Box::new(MemoryScope::new()),
            Box::new(FileScope::new(&dir)),
        );
        store.dismiss("x", true);
        store.dismiss("x", true);

        let raw = std::fs::read_to_string(dir.join("dismissed_banners.json")).unwrap();
        assert_eq!(raw, r#"["x"]"#);
    }

    #[test]
    fn undismiss_all_clears_both_tiers() {
        let mut store = DismissalStore::in_memory();
        store.dismiss("a", false);
        store.dismiss("b", true);
        store.undismiss_all();

        assert!(store.all_dismissed_ids().is_empty());
    }

    #[test]
    fn end_session_keeps_permanent_tier() {
        let mut store = DismissalStore::in_memory();
        store.dismiss("a", false);
        store.dismiss("b", true);
        store.end_session();

        assert!(!store.is_dismissed("a"));
        assert!(store.is_dismissed("b"));
    }

    #[test]
    fn all_dismissed_ids_is_union() {
        let mut store = DismissalStore::in_memory();
        store.dismiss("a", false);
        store.dismiss("a", true);
        store.dismiss("b", true);

        let ids = store.all_dismissed_ids();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains("a") && ids.contains("b"));
    }

    #[test]
    fn permanent_tier_survives_new_store() {
        let temp = TempDir::new().unwrap();
        let storage = StorageConfig::with_root(temp.path().to_path_buf());

        let mut first = DismissalStore::with_storage(&storage, None);
        first.dismiss("keep", true);
        first.dismiss("forget", false);
        drop(first);

        let second = DismissalStore::with_storage(&storage, None);
        assert!(second.is_dismissed("keep"));
        assert!(!second.is_dismissed("forget"));
    }

    #[test]
    fn named_session_tier_is_shared_between_stores() {
        let temp = TempDir::new().unwrap();
        let storage = StorageConfig::with_root(temp.path().to_path_buf());

        let mut first = DismissalStore::with_storage(&storage, Some("tty-1"));
        first.dismiss("s", false);

        let same = DismissalStore::with_storage(&storage, Some("tty-1"));
        let other = DismissalStore::with_storage(&storage, Some("tty-2"));
        assert!(same.is_dismissed("s"));
        assert!(!other.is_dismissed("s"));
    }

    #[test]
    fn corrupt_payload_reads_as_empty() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().to_path_buf();
        std::fs::write(dir.join("dismissed_banners.json"), "{not a list").unwrap();

        let mut store =
            DismissalStore::new(Box::new(MemoryScope::new()), Box::new(FileScope::new(&dir)));
        assert!(store.all_dismissed_ids().is_empty());

        // The next dismissal rewrites a valid list.
        store.dismiss("y", true);
        assert!(store.is_dismissed("y"));
    }

    #[test]
    fn broken_storage_degrades_to_nothing_dismissed() {
        let mut store = DismissalStore::new(Box::new(BrokenScope), Box::new(BrokenScope));
        store.dismiss("x", true);
        store.undismiss_all();

        assert!(!store.is_dismissed("x"));
        assert!(store.all_dismissed_ids().is_empty());
    }

    #[test]
    fn file_scope_remove_missing_key_is_ok() {
        let temp = TempDir::new().unwrap();
        let mut scope = FileScope::new(temp.path());
        assert!(scope.remove(DISMISSED_KEY).is_ok());
        assert_eq!(scope.get(DISMISSED_KEY).unwrap(), None);
    }

    #[test]
    fn discarding_a_session_scope_forgets_its_dismissals() {
        let temp = TempDir::new().unwrap();
        let storage = StorageConfig::with_root(temp.path().to_path_buf());

        let mut store = DismissalStore::with_storage(&storage, Some("tty-9"));
        store.dismiss("s", false);
        store.dismiss("p", true);
        assert!(storage.session_scope_dir("tty-9").is_dir());

        store.end_session();
        discard_session_scope(&storage, "tty-9").unwrap();
        assert!(!storage.session_scope_dir("tty-9").exists());
        assert!(discard_session_scope(&storage, "tty-9").is_ok());

        let next = DismissalStore::with_storage(&storage, Some("tty-9"));
        assert!(!next.is_dismissed("s"));
        assert!(next.is_dismissed("p"));
    }
}
