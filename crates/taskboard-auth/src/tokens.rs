//! Persisted access/refresh token pair
//!
//! Thin typed view over a `KeyValueStore`. Both tokens live under their own
//! storage keys. A pair is only reported when both halves are present, so a
//! partially written store reads as "not logged in".

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::constants::{ACCESS_KEY, REFRESH_KEY};
use crate::error::Result;
use crate::storage::KeyValueStore;

/// Bearer token pair issued at login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    /// Short-lived token attached to every API request
    pub access: String,
    /// Long-lived token used only to obtain new access tokens
    pub refresh: String,
}

/// Durable home of the current token pair.
///
/// Cheap to clone; clones share the underlying storage.
#[derive(Clone)]
pub struct TokenStore {
    storage: Arc<dyn KeyValueStore>,
}

impl TokenStore {
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self { storage }
    }

    /// Current pair, or `None` if either token is absent.
    pub fn get(&self) -> Option<TokenPair> {
        let access = self.storage.get(ACCESS_KEY)?;
        let refresh = self.storage.get(REFRESH_KEY)?;
        Some(TokenPair { access, refresh })
    }

    /// Replace both tokens in one write.
    pub fn set(&self, pair: &TokenPair) -> Result<()> {
        self.storage.set_entries(vec![
            (ACCESS_KEY, pair.access.clone()),
            (REFRESH_KEY, pair.refresh.clone()),
        ])?;
        Ok(())
    }

    /// Replace only the access token, keeping the refresh token.
    pub fn set_access(&self, access: &str) -> Result<()> {
        self.storage.set(ACCESS_KEY, access.to_string())?;
        Ok(())
    }

    /// Remove both tokens. Clearing an empty store is not an error.
    pub fn clear(&self) -> Result<()> {
        self.storage.remove_entries(&[ACCESS_KEY, REFRESH_KEY])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FileStore, MemoryStore};

    fn pair(suffix: &str) -> TokenPair {
        TokenPair {
            access: format!("at_{suffix}"),
            refresh: format!("rt_{suffix}"),
        }
    }

    fn memory_store() -> (Arc<MemoryStore>, TokenStore) {
        let storage = Arc::new(MemoryStore::new());
        let tokens = TokenStore::new(storage.clone());
        (storage, tokens)
    }

    #[test]
    fn empty_store_has_no_pair() {
        let (_, tokens) = memory_store();
        assert!(tokens.get().is_none());
    }

    #[test]
    fn set_then_get() {
        let (_, tokens) = memory_store();
        tokens.set(&pair("1")).unwrap();
        assert_eq!(tokens.get(), Some(pair("1")));

        tokens.set(&pair("2")).unwrap();
        assert_eq!(tokens.get(), Some(pair("2")));
    }

    #[test]
    fn set_access_keeps_refresh_token() {
        let (_, tokens) = memory_store();
        tokens.set(&pair("1")).unwrap();
        tokens.set_access("at_new").unwrap();

        let stored = tokens.get().unwrap();
        assert_eq!(stored.access, "at_new");
        assert_eq!(stored.refresh, "rt_1");
    }

    #[test]
    fn half_a_pair_reads_as_absent() {
        let (storage, tokens) = memory_store();
        tokens.set_access("at_orphan").unwrap();
        assert!(tokens.get().is_none());
        assert_eq!(storage.get(ACCESS_KEY).as_deref(), Some("at_orphan"));
    }

    #[test]
    fn clear_removes_both_and_is_idempotent() {
        let (storage, tokens) = memory_store();
        tokens.set(&pair("1")).unwrap();
        tokens.clear().unwrap();
        tokens.clear().unwrap();

        assert!(tokens.get().is_none());
        assert!(storage.is_empty());
    }

    #[test]
    fn pair_survives_reopen_of_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let tokens = TokenStore::new(Arc::new(FileStore::open(path.clone()).unwrap()));
        tokens.set(&pair("1")).unwrap();
        tokens.set_access("at_2").unwrap();

        let reopened = TokenStore::new(Arc::new(FileStore::open(path).unwrap()));
        assert_eq!(
            reopened.get(),
            Some(TokenPair {
                access: "at_2".into(),
                refresh: "rt_1".into(),
            })
        );
    }
}
