//! Ports for the hosted identity and profile collaborators.
//!
//! The auth crate never talks to the network itself. Adapters (HTTP, demo)
//! implement these traits and are injected into [`crate::AuthService`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use kaos_core::{Entity, OrganizationId, TerritoryId, UserId};

/// Session issued by the identity collaborator after a credential check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteSession {
    pub email: String,
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Profile row from the `profiles` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: UserId,
    pub email: String,
    #[serde(default)]
    pub full_name: Option<String>,
    /// Raw role column; parsed leniently.
    pub role: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub organization_id: Option<OrganizationId>,
    #[serde(default)]
    pub assigned_territories: Vec<TerritoryId>,
    #[serde(default)]
    pub managed_territories: Vec<TerritoryId>,
}

fn default_active() -> bool {
    true
}

impl Profile {
    /// Full name, or the local part of the email when the name is blank.
    pub fn display_name(&self) -> String {
        match self.full_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => self.email.split('@').next().unwrap_or_default().to_string(),
        }
    }
}

impl Entity for Profile {
    type Id = UserId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("invalid login credentials")]
    InvalidCredentials,

    #[error("identity service unreachable: {0}")]
    Network(String),

    #[error("identity service error ({status}): {message}")]
    Unexpected { status: u16, message: String },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("profile directory unreachable: {0}")]
    Network(String),

    #[error("profile row could not be decoded: {0}")]
    Decode(String),
}

/// Hosted auth-as-a-service.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<RemoteSession, IdentityError>;

    /// The session the collaborator currently considers active, if any.
    async fn get_session(&self) -> Result<Option<RemoteSession>, IdentityError>;

    async fn sign_out(&self) -> Result<(), IdentityError>;
}

/// Read access to user profile rows.
#[async_trait]
pub trait ProfileDirectory: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<Profile>, DirectoryError>;
}
