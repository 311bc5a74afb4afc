use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;

/// All sled trees used by the hub. One logical store, one tree per entity,
/// records encoded as JSON.
#[derive(Clone)]
pub struct Storage {
    db: sled::Db,
    /// plugin_id (be bytes) -> Plugin
    pub plugins: sled::Tree,
    /// plugin name -> plugin_id; claimed with compare_and_swap so duplicate
    /// creates surface as a conflict instead of silently overwriting
    pub plugin_names: sled::Tree,
    /// plugin_id + version_id -> PluginVersion
    pub versions: sled::Tree,
    /// license_id -> PluginLicense
    pub licenses: sled::Tree,
    /// license_key -> license_id, unique
    pub license_keys: sled::Tree,
    /// user_id \0 plugin_id \0 license_id -> (), scanned by prefix
    pub license_index: sled::Tree,
    /// log_id -> PluginUsageLog, append-only
    pub usage_logs: sled::Tree,
    /// plugin_id + "YYYY-MM-DD" -> PluginStats
    pub daily_stats: sled::Tree,
}

impl Storage {
    pub fn open(path: &str) -> Result<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// In-memory store for tests.
    pub fn temporary() -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: sled::Db) -> Result<Self> {
        Ok(Self {
            plugins: db.open_tree("plugins")?,
            plugin_names: db.open_tree("plugin_names")?,
            versions: db.open_tree("plugin_versions")?,
            licenses: db.open_tree("licenses")?,
            license_keys: db.open_tree("license_keys")?,
            license_index: db.open_tree("license_index")?,
            usage_logs: db.open_tree("usage_logs")?,
            daily_stats: db.open_tree("daily_stats")?,
            db,
        })
    }

    /// Monotonic identifier, shared across entities. Offset by one so ids
    /// start at 1.
    pub fn next_id(&self) -> Result<u64> {
        Ok(self.db.generate_id()? + 1)
    }

    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}

pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(serde_json::from_slice(bytes)?)
}

pub fn id_key(id: u64) -> [u8; 8] {
    id.to_be_bytes()
}

pub fn composite_key(left: u64, right: u64) -> [u8; 16] {
    let mut key = [0u8; 16];
    key[..8].copy_from_slice(&left.to_be_bytes());
    key[8..].copy_from_slice(&right.to_be_bytes());
    key
}

/// Read-modify-write with a compare-and-swap retry loop. The closure sees the
/// current decoded record (None when absent) and returns the replacement
/// (None deletes). Concurrent writers to the same key cause a retry, never a
/// lost update.
pub fn modify<T, F>(tree: &sled::Tree, key: &[u8], mut f: F) -> Result<Option<T>>
where
    T: Serialize + DeserializeOwned,
    F: FnMut(Option<T>) -> Result<Option<T>>,
{
    loop {
        let current = tree.get(key)?;
        let decoded = match &current {
            Some(bytes) => Some(decode::<T>(bytes)?),
            None => None,
        };
        let next = f(decoded)?;
        let next_bytes: Option<Vec<u8>> = match &next {
            Some(value) => Some(encode(value)?),
            None => None,
        };
        match tree.compare_and_swap(key, current.as_ref(), next_bytes)? {
            Ok(()) => return Ok(next),
            Err(_) => continue,
        }
    }
}

/// Claims a unique index entry. Returns false when another writer holds the
/// key already.
pub fn claim_unique(tree: &sled::Tree, key: &[u8], value: &[u8]) -> Result<bool> {
    let outcome = tree.compare_and_swap(key, None as Option<&[u8]>, Some(value))?;
    Ok(outcome.is_ok())
}
