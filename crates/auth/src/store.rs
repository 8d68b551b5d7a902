//! Local durable key/value storage and session persistence on top of it.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use thiserror::Error;

use crate::Session;

/// Keys this crate reads and writes in local storage.
pub mod keys {
    pub const USER_ROLE: &str = "userRole";
    pub const USER_NAME: &str = "userName";
    pub const USER_EMAIL: &str = "userEmail";
    pub const USER_ID: &str = "userId";
    pub const ORGANIZATION_ID: &str = "organizationId";
    /// Serialized [`crate::Session`].
    pub const SESSION: &str = "kaosSession";
    /// Serialized demo-mode user, written by the demo identity.
    pub const DEMO_USER: &str = "demoUser";

    /// Flat identity fields mirrored from the session blob.
    pub const IDENTITY: [&str; 5] = [USER_ROLE, USER_NAME, USER_EMAIL, USER_ID, ORGANIZATION_ID];
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("local storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("local storage is corrupt: {0}")]
    Corrupt(String),
}

/// Synchronous, durable key/value storage local to this client.
///
/// Last writer wins; there is no locking across processes.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

impl<S> KeyValueStore for Arc<S>
where
    S: KeyValueStore + ?Sized,
{
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        (**self).remove(key)
    }
}

/// In-memory store for tests/dev. Not durable.
#[derive(Debug, Default)]
pub struct InMemoryKeyValueStore {
    inner: RwLock<HashMap<String, String>>,
}

impl InMemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for InMemoryKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let map = self.inner.read().unwrap_or_else(|p| p.into_inner());
        Ok(map.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut map = self.inner.write().unwrap_or_else(|p| p.into_inner());
        map.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut map = self.inner.write().unwrap_or_else(|p| p.into_inner());
        map.remove(key);
        Ok(())
    }
}

/// Reads and writes the session blob plus its flat identity mirror.
///
/// Storage failures are logged, never surfaced: losing the persisted copy only
/// costs a sign-in on the next start.
#[derive(Clone)]
pub struct SessionStore {
    store: Arc<dyn KeyValueStore>,
}

impl SessionStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn persist(&self, session: &Session) {
        let blob = match serde_json::to_string(session) {
            Ok(blob) => blob,
            Err(err) => {
                tracing::error!("failed to serialize session: {err}");
                return;
            }
        };

        let organization_id = session
            .organization_id
            .map(|id| id.to_string())
            .unwrap_or_default();
        let user_id = session.user_id.to_string();

        let entries = [
            (keys::SESSION, blob.as_str()),
            (keys::USER_ROLE, session.role.as_str()),
            (keys::USER_NAME, session.display_name.as_str()),
            (keys::USER_EMAIL, session.email.as_str()),
            (keys::USER_ID, user_id.as_str()),
            (keys::ORGANIZATION_ID, organization_id.as_str()),
        ];

        for (key, value) in entries {
            if let Err(err) = self.store.set(key, value) {
                tracing::error!(key, "failed to persist session entry: {err}");
            }
        }
    }

    /// Load the persisted session.
    ///
    /// A blob that fails to parse or validate is removed together with its
    /// flat mirror, and `None` is returned.
    pub fn load(&self) -> Option<Session> {
        let blob = match self.store.get(keys::SESSION) {
            Ok(Some(blob)) => blob,
            Ok(None) => return None,
            Err(err) => {
                tracing::warn!("failed to read persisted session: {err}");
                return None;
            }
        };

        let parsed = serde_json::from_str::<Session>(&blob)
            .map_err(|e| e.to_string())
            .and_then(|s| s.validate().map(|()| s).map_err(|e| e.to_string()));

        match parsed {
            Ok(session) => Some(session),
            Err(reason) => {
                tracing::warn!(%reason, "discarding malformed persisted session");
                self.clear();
                None
            }
        }
    }

    pub fn clear(&self) {
        for key in std::iter::once(keys::SESSION).chain(keys::IDENTITY) {
            if let Err(err) = self.store.remove(key) {
                tracing::warn!(key, "failed to remove session entry: {err}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::Utc;
    use kaos_core::{TerritoryId, UserId};

    use super::*;
    use crate::Role;

    fn session() -> Session {
        Session {
            user_id: UserId::from_u128(7),
            email: "rep@example.com".to_string(),
            display_name: "Rep".to_string(),
            role: Role::SalesRep,
            organization_id: None,
            assigned_territory_ids: BTreeSet::from([TerritoryId::from_u128(1)]),
            managed_territory_ids: BTreeSet::new(),
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn persist_writes_blob_and_flat_mirror() {
        let kv = Arc::new(InMemoryKeyValueStore::new());
        let store = SessionStore::new(kv.clone());

        let session = session();
        store.persist(&session);

        assert_eq!(kv.get(keys::USER_ROLE).unwrap().as_deref(), Some("sales_rep"));
        assert_eq!(kv.get(keys::USER_EMAIL).unwrap().as_deref(), Some("rep@example.com"));
        assert_eq!(kv.get(keys::USER_NAME).unwrap().as_deref(), Some("Rep"));
        assert_eq!(kv.len(), 6);
        assert_eq!(store.load(), Some(session));
    }

    #[test]
    fn malformed_role_is_rejected_and_cleared() {
        let kv = Arc::new(InMemoryKeyValueStore::new());
        let store = SessionStore::new(kv.clone());
        store.persist(&session());

        let blob = kv.get(keys::SESSION).unwrap().unwrap();
        let tampered = blob.replace("\"sales_rep\"", "\"superuser\"");
        kv.set(keys::SESSION, &tampered).unwrap();

        assert_eq!(store.load(), None);
        assert!(kv.is_empty());
    }

    #[test]
    fn structurally_invalid_session_is_rejected() {
        let kv = Arc::new(InMemoryKeyValueStore::new());
        let store = SessionStore::new(kv.clone());
        let mut bad = session();
        bad.access_token = "  ".to_string();
        store.persist(&bad);

        assert_eq!(store.load(), None);
        assert_eq!(kv.get(keys::USER_ROLE).unwrap(), None);
    }

    #[test]
    fn garbage_blob_is_rejected() {
        let kv = Arc::new(InMemoryKeyValueStore::new());
        kv.set(keys::SESSION, "{not json").unwrap();
        assert_eq!(SessionStore::new(kv.clone()).load(), None);
        assert_eq!(kv.get(keys::SESSION).unwrap(), None);
    }
}
