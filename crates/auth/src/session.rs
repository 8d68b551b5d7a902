use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use kaos_core::{DomainError, OrganizationId, TerritoryId, UserId};

use crate::identity::{Profile, RemoteSession};
use crate::Role;

/// Authenticated identity of the current user plus the tokens for the hosted
/// backend.
///
/// Owned by the client process. Created on a successful sign-in, persisted to
/// local storage, restored at start-up and destroyed on sign-out or when the
/// backing account turns out to be deactivated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user_id: UserId,
    pub email: String,
    pub display_name: String,
    pub role: Role,
    #[serde(default)]
    pub organization_id: Option<OrganizationId>,
    #[serde(default)]
    pub assigned_territory_ids: BTreeSet<TerritoryId>,
    #[serde(default)]
    pub managed_territory_ids: BTreeSet<TerritoryId>,
    pub access_token: String,
    pub refresh_token: String,
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Build a session from the profile row matching a fresh remote session.
    pub fn from_profile(profile: &Profile, remote: &RemoteSession, now: DateTime<Utc>) -> Self {
        Self {
            user_id: profile.id,
            email: profile.email.trim().to_lowercase(),
            display_name: profile.display_name(),
            role: Role::from_str_lenient(&profile.role),
            organization_id: profile.organization_id,
            assigned_territory_ids: profile.assigned_territories.iter().copied().collect(),
            managed_territory_ids: profile.managed_territories.iter().copied().collect(),
            access_token: remote.access_token.clone(),
            refresh_token: remote.refresh_token.clone(),
            created_at: now,
        }
    }

    /// Copy authorization-relevant fields from a newer profile row.
    ///
    /// Returns `true` if anything changed.
    pub fn refresh_from(&mut self, profile: &Profile) -> bool {
        let role = Role::from_str_lenient(&profile.role);
        let assigned: BTreeSet<TerritoryId> = profile.assigned_territories.iter().copied().collect();
        let managed: BTreeSet<TerritoryId> = profile.managed_territories.iter().copied().collect();
        let display_name = profile.display_name();

        let changed = self.role != role
            || self.assigned_territory_ids != assigned
            || self.managed_territory_ids != managed
            || self.display_name != display_name
            || self.organization_id != profile.organization_id;

        self.role = role;
        self.assigned_territory_ids = assigned;
        self.managed_territory_ids = managed;
        self.display_name = display_name;
        self.organization_id = profile.organization_id;
        changed
    }

    /// Structural checks applied to a session read back from storage.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.email.trim().is_empty() || !self.email.contains('@') {
            return Err(DomainError::validation("session email is malformed"));
        }
        if self.access_token.trim().is_empty() {
            return Err(DomainError::validation("session has no access token"));
        }
        Ok(())
    }
}

/// The set of territories a user may see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "scope", content = "territory_ids")]
pub enum TerritoryScope {
    All,
    Only(BTreeSet<TerritoryId>),
}

impl TerritoryScope {
    pub fn contains(&self, territory_id: TerritoryId) -> bool {
        match self {
            TerritoryScope::All => true,
            TerritoryScope::Only(ids) => ids.contains(&territory_id),
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, TerritoryScope::All)
    }
}
