//! The `Store` contract: keyed byte-string persistence.
//!
//! A store doesn't know anything about tasks; it just durably holds one
//! blob per pool name. The namespace prefix lives here so every backend
//! shares it instead of reinventing key formatting.

use crate::error::StoreError;

const NAMESPACE: &str = "persistent-pool:";

/// Builds the durable key for a pool named `name`.
pub fn namespaced_key(name: &str) -> String {
    format!("{NAMESPACE}{name}")
}

/// Durable storage for one opaque blob per pool name.
pub trait Store: Send + Sync {
    fn load(&self, name: &str) -> Result<Vec<u8>, StoreError>;
    fn write(&self, name: &str, bytes: &[u8]) -> Result<(), StoreError>;
}
