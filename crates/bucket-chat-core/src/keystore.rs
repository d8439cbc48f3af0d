//! KeyStore trait: the minimal interface for persisting signing keys.
//!
//! A key store is a capability handed to whatever needs keys. Durable
//! implementations (an OS keyring, a secrets manager) live outside this crate.

use std::collections::HashMap;
use std::sync::RwLock;

use tracing::info;

use crate::crypto::{Keypair, KeypairExport};
use crate::error::CoreError;

/// Load, save and delete keypairs under caller-chosen identifiers.
pub trait KeyStore: Send + Sync {
    /// Load the keypair stored under `id`.
    fn load(&self, id: &str) -> Result<Option<Keypair>, CoreError>;

    /// Store `keypair` under `id`, replacing any previous one.
    fn save(&self, id: &str, keypair: &Keypair) -> Result<(), CoreError>;

    /// Remove the keypair under `id`. Returns whether one existed.
    fn delete(&self, id: &str) -> Result<bool, CoreError>;
}

/// Load the keypair for `id`, generating and saving one if absent.
pub fn get_or_create(store: &dyn KeyStore, id: &str) -> Result<Keypair, CoreError> {
    if let Some(keypair) = store.load(id)? {
        return Ok(keypair);
    }
    let keypair = Keypair::generate();
    store.save(id, &keypair)?;
    info!(id, fingerprint = %keypair.public_key().fingerprint(), "generated new keypair");
    Ok(keypair)
}

/// In-memory key store for tests and ephemeral identities.
///
/// Holds keys in their exported form, as a durable store would.
pub struct MemoryKeyStore {
    keys: RwLock<HashMap<String, KeypairExport>>,
}

impl MemoryKeyStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            keys: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryKeyStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned() -> CoreError {
    CoreError::KeyStore("lock poisoned".into())
}

impl KeyStore for MemoryKeyStore {
    fn load(&self, id: &str) -> Result<Option<Keypair>, CoreError> {
        let keys = self.keys.read().map_err(|_| poisoned())?;
        keys.get(id).map(KeypairExport::to_keypair).transpose()
    }

    fn save(&self, id: &str, keypair: &Keypair) -> Result<(), CoreError> {
        let mut keys = self.keys.write().map_err(|_| poisoned())?;
        keys.insert(id.to_string(), keypair.export());
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<bool, CoreError> {
        let mut keys = self.keys.write().map_err(|_| poisoned())?;
        Ok(keys.remove(id).is_some())
    }
}
