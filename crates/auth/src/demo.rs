//! Demo identity: a local stand-in for the hosted identity and profile
//! collaborators, with four fixed seed accounts.
//!
//! Compiled only with the `demo` feature (and in this crate's own tests). Any
//! non-empty password is accepted.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use kaos_core::{OrganizationId, TerritoryId, UserId};

use crate::identity::{
    DirectoryError, IdentityError, IdentityProvider, Profile, ProfileDirectory, RemoteSession,
};
use crate::store::{keys, KeyValueStore};
use crate::Role;

/// Seed territories referenced by the demo accounts.
pub mod territories {
    use kaos_core::TerritoryId;

    pub const NORTH: TerritoryId = TerritoryId::from_u128(0x6b61_6f73_0000_4000_8000_0000_0000_0001);
    pub const SOUTH: TerritoryId = TerritoryId::from_u128(0x6b61_6f73_0000_4000_8000_0000_0000_0002);
    pub const CENTRAL: TerritoryId = TerritoryId::from_u128(0x6b61_6f73_0000_4000_8000_0000_0000_0003);
}

pub const DEMO_ORGANIZATION: OrganizationId =
    OrganizationId::from_u128(0x6b61_6f73_0000_4000_8000_0000_0000_0100);

#[derive(Debug, Clone, Copy)]
pub struct DemoAccount {
    pub id: UserId,
    pub email: &'static str,
    pub full_name: &'static str,
    pub role: Role,
    pub assigned: &'static [TerritoryId],
    pub managed: &'static [TerritoryId],
}

pub const DEMO_ACCOUNTS: [DemoAccount; 4] = [
    DemoAccount {
        id: UserId::from_u128(0x6b61_6f73_0000_4000_8000_0000_0000_1001),
        email: "admin@kaos.com",
        full_name: "Demo Admin",
        role: Role::Admin,
        assigned: &[],
        managed: &[],
    },
    DemoAccount {
        id: UserId::from_u128(0x6b61_6f73_0000_4000_8000_0000_0000_1002),
        email: "manager@kaos.com",
        full_name: "Demo Manager",
        role: Role::Manager,
        assigned: &[territories::NORTH, territories::SOUTH],
        managed: &[territories::NORTH, territories::SOUTH],
    },
    DemoAccount {
        id: UserId::from_u128(0x6b61_6f73_0000_4000_8000_0000_0000_1003),
        email: "sales@kaos.com",
        full_name: "Demo Sales Rep",
        role: Role::SalesRep,
        assigned: &[territories::NORTH],
        managed: &[],
    },
    DemoAccount {
        id: UserId::from_u128(0x6b61_6f73_0000_4000_8000_0000_0000_1004),
        email: "hr@kaos.com",
        full_name: "Demo Director",
        role: Role::Hr,
        assigned: &[],
        managed: &[],
    },
];

pub fn demo_account(email: &str) -> Option<&'static DemoAccount> {
    let email = email.trim();
    DEMO_ACCOUNTS
        .iter()
        .find(|a| a.email.eq_ignore_ascii_case(email))
}

/// Both collaborator ports, backed by the seed accounts and local storage.
pub struct DemoIdentity {
    store: Arc<dyn KeyValueStore>,
    deactivated: Mutex<HashSet<String>>,
}

impl DemoIdentity {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        tracing::warn!("demo identity in use; seed accounts accept any password");
        Self {
            store,
            deactivated: Mutex::new(HashSet::new()),
        }
    }

    /// Mark a seed account inactive, as an administrator would.
    pub fn deactivate(&self, email: &str) {
        self.deactivated
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(email.trim().to_lowercase());
    }

    fn is_active(&self, email: &str) -> bool {
        !self
            .deactivated
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .contains(&email.trim().to_lowercase())
    }
}

#[async_trait]
impl IdentityProvider for DemoIdentity {
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<RemoteSession, IdentityError> {
        let account = demo_account(email).ok_or(IdentityError::InvalidCredentials)?;
        if password.trim().is_empty() {
            return Err(IdentityError::InvalidCredentials);
        }

        let remote = RemoteSession {
            email: account.email.to_string(),
            access_token: format!("demo-access-{}", Uuid::now_v7()),
            refresh_token: format!("demo-refresh-{}", Uuid::now_v7()),
            expires_at: None,
        };

        match serde_json::to_string(&remote) {
            Ok(blob) => {
                if let Err(err) = self.store.set(keys::DEMO_USER, &blob) {
                    tracing::error!("failed to persist demo user: {err}");
                }
            }
            Err(err) => tracing::error!("failed to serialize demo user: {err}"),
        }

        tracing::debug!(email = account.email, at = %Utc::now(), "demo sign-in");
        Ok(remote)
    }

    async fn get_session(&self) -> Result<Option<RemoteSession>, IdentityError> {
        let blob = match self.store.get(keys::DEMO_USER) {
            Ok(Some(blob)) => blob,
            Ok(None) => return Ok(None),
            Err(err) => {
                tracing::warn!("failed to read demo user: {err}");
                return Ok(None);
            }
        };

        match serde_json::from_str::<RemoteSession>(&blob) {
            Ok(remote) if demo_account(&remote.email).is_some() => Ok(Some(remote)),
            _ => {
                tracing::warn!("discarding malformed demo user");
                let _ = self.store.remove(keys::DEMO_USER);
                Ok(None)
            }
        }
    }

    async fn sign_out(&self) -> Result<(), IdentityError> {
        if let Err(err) = self.store.remove(keys::DEMO_USER) {
            tracing::warn!("failed to remove demo user: {err}");
        }
        Ok(())
    }
}

#[async_trait]
impl ProfileDirectory for DemoIdentity {
    async fn find_by_email(&self, email: &str) -> Result<Option<Profile>, DirectoryError> {
        Ok(demo_account(email).map(|account| Profile {
            id: account.id,
            email: account.email.to_string(),
            full_name: Some(account.full_name.to_string()),
            role: account.role.as_str().to_string(),
            is_active: self.is_active(account.email),
            organization_id: Some(DEMO_ORGANIZATION),
            assigned_territories: account.assigned.to_vec(),
            managed_territories: account.managed.to_vec(),
        }))
    }
}
