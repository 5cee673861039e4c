//! An embedded, ordered-keyspace `Store` backed by `sled`.

use persistent_pool::{namespaced_key, Store, StoreError};

pub struct SledStore {
    db: sled::Db,
}

impl SledStore {
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self, StoreError> {
        let db = sled::open(path).map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(Self { db })
    }

    pub fn from_db(db: sled::Db) -> Self {
        Self { db }
    }
}

impl Store for SledStore {
    fn load(&self, name: &str) -> Result<Vec<u8>, StoreError> {
        let key = namespaced_key(name);
        self.db
            .get(key.as_bytes())
            .map_err(|e| StoreError::Backend(e.to_string()))?
            .map(|ivec| ivec.to_vec())
            .ok_or_else(|| StoreError::NotFound(key))
    }

    fn write(&self, name: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let key = namespaced_key(name);
        self.db
            .insert(key.as_bytes(), bytes)
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        self.db
            .flush()
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }
}
