//! Keyed state persistence for restart recovery.
//!
//! The position ledger must survive process restarts, so each instrument
//! pipeline saves a JSON snapshot under a [`StateKey`] composed of
//! (component id, symbol, schema version). Loading a key that was never
//! saved returns [`PersistError::NotFound`], which callers must treat as
//! "initialize empty state" — never as an error. Any other load failure is
//! a hard error at startup.

use std::path::PathBuf;
use std::sync::Mutex;

use ahash::AHashMap;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// State-schema version tag. Bump when the snapshot layout changes so stale
/// snapshots surface as NotFound instead of misparsing.
pub const STATE_VERSION: &str = "state-v1";

/// Persistence errors.
#[derive(Debug, Error)]
pub enum PersistError {
    /// No snapshot exists for the key. First-run condition, not a failure.
    #[error("state not found")]
    NotFound,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Key identifying one persisted snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StateKey {
    /// Owning component identifier (e.g. a strategy id).
    pub component: String,
    /// Instrument symbol.
    pub symbol: String,
    /// Schema version tag, normally [`STATE_VERSION`].
    pub version: String,
}

impl StateKey {
    pub fn new(component: &str, symbol: &str) -> Self {
        Self {
            component: component.to_string(),
            symbol: symbol.to_string(),
            version: STATE_VERSION.to_string(),
        }
    }

    /// Flat key string, also used as the snapshot file name.
    pub fn as_string(&self) -> String {
        format!("{}-{}-{}", self.component, self.symbol, self.version)
    }
}

/// Object-safe persistence backend.
///
/// Methods speak `serde_json::Value` so the trait stays object-safe; use
/// [`save`] / [`load`] for typed access.
pub trait Persister: Send + Sync {
    fn save_json(&self, key: &StateKey, value: &serde_json::Value) -> Result<(), PersistError>;
    fn load_json(&self, key: &StateKey) -> Result<serde_json::Value, PersistError>;
}

/// Save a typed snapshot through any [`Persister`].
pub fn save<T: Serialize>(p: &dyn Persister, key: &StateKey, value: &T) -> Result<(), PersistError> {
    let json = serde_json::to_value(value)?;
    p.save_json(key, &json)
}

/// Load a typed snapshot through any [`Persister`].
pub fn load<T: DeserializeOwned>(p: &dyn Persister, key: &StateKey) -> Result<T, PersistError> {
    let json = p.load_json(key)?;
    Ok(serde_json::from_value(json)?)
}

// ---------------------------------------------------------------------------
// FilePersister — JSON files under a directory
// ---------------------------------------------------------------------------

/// File-backed persistence: one `<component>-<symbol>-<version>.json` per key.
pub struct FilePersister {
    dir: PathBuf,
}

impl FilePersister {
    /// Create the backing directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, PersistError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &StateKey) -> PathBuf {
        self.dir.join(format!("{}.json", key.as_string()))
    }
}

impl Persister for FilePersister {
    fn save_json(&self, key: &StateKey, value: &serde_json::Value) -> Result<(), PersistError> {
        let path = self.path_for(key);
        let content = serde_json::to_string_pretty(value)?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    fn load_json(&self, key: &StateKey) -> Result<serde_json::Value, PersistError> {
        let path = self.path_for(key);
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(PersistError::NotFound);
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&content)?)
    }
}

// ---------------------------------------------------------------------------
// MemoryPersister — in-memory map, for tests and dry runs
// ---------------------------------------------------------------------------

/// In-memory persistence backend.
pub struct MemoryPersister {
    entries: Mutex<AHashMap<String, serde_json::Value>>,
}

impl MemoryPersister {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(AHashMap::new()),
        }
    }
}

impl Default for MemoryPersister {
    fn default() -> Self {
        Self::new()
    }
}

impl Persister for MemoryPersister {
    fn save_json(&self, key: &StateKey, value: &serde_json::Value) -> Result<(), PersistError> {
        self.entries
            .lock()
            .expect("persister lock poisoned")
            .insert(key.as_string(), value.clone());
        Ok(())
    }

    fn load_json(&self, key: &StateKey) -> Result<serde_json::Value, PersistError> {
        self.entries
            .lock()
            .expect("persister lock poisoned")
            .get(&key.as_string())
            .cloned()
            .ok_or(PersistError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Snapshot {
        count: u32,
        label: String,
    }

    #[test]
    fn memory_roundtrip_and_not_found() {
        let p = MemoryPersister::new();
        let key = StateKey::new("pingpong", "BTCUSDT");

        match load::<Snapshot>(&p, &key) {
            Err(PersistError::NotFound) => {}
            other => panic!("expected NotFound, got {other:?}"),
        }

        let snap = Snapshot { count: 3, label: "x".into() };
        save(&p, &key, &snap).unwrap();
        let loaded: Snapshot = load(&p, &key).unwrap();
        assert_eq!(loaded, snap);
    }

    #[test]
    fn file_roundtrip_and_not_found() {
        let dir = std::env::temp_dir().join(format!("t7-persist-{}", uuid::Uuid::new_v4()));
        let p = FilePersister::new(&dir).unwrap();
        let key = StateKey::new("pingpong", "ETHUSDT");

        assert!(matches!(
            load::<Snapshot>(&p, &key),
            Err(PersistError::NotFound)
        ));

        let snap = Snapshot { count: 9, label: "y".into() };
        save(&p, &key, &snap).unwrap();
        let loaded: Snapshot = load(&p, &key).unwrap();
        assert_eq!(loaded, snap);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn keys_do_not_collide_across_symbols() {
        let a = StateKey::new("pingpong", "BTCUSDT");
        let b = StateKey::new("pingpong", "ETHUSDT");
        assert_ne!(a.as_string(), b.as_string());
        assert!(a.as_string().ends_with(STATE_VERSION));
    }
}
