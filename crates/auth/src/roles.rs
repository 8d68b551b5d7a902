use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Role assigned to a user by an administrator.
///
/// Serialized with its canonical snake_case name. Deserialization is strict:
/// an unknown name is an error, which is what session restore relies on to
/// reject tampered or legacy blobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    /// Director / HR.
    #[serde(alias = "director", alias = "director_hr")]
    Hr,
    Manager,
    #[serde(alias = "sales")]
    SalesRep,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown role '{0}'")]
pub struct UnknownRole(pub String);

impl Role {
    pub const ALL: [Role; 4] = [Role::Admin, Role::Hr, Role::Manager, Role::SalesRep];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Hr => "hr",
            Role::Manager => "manager",
            Role::SalesRep => "sales_rep",
        }
    }

    /// Label shown in the UI.
    pub fn label(&self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::Hr => "Director/HR",
            Role::Manager => "Manager",
            Role::SalesRep => "Sales Rep",
        }
    }

    /// Parse a role coming from a profile row.
    ///
    /// Unknown or legacy strings degrade to [`Role::SalesRep`], the most
    /// restrictive role, instead of failing navigation.
    pub fn from_str_lenient(raw: &str) -> Role {
        raw.parse().unwrap_or_else(|err: UnknownRole| {
            tracing::warn!(role = %err.0, "unrecognized role; falling back to sales_rep");
            Role::SalesRep
        })
    }
}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .to_ascii_lowercase()
            .chars()
            .map(|c| if c == ' ' || c == '-' || c == '/' { '_' } else { c })
            .collect();

        match normalized.as_str() {
            "admin" | "administrator" => Ok(Role::Admin),
            "hr" | "director" | "director_hr" => Ok(Role::Hr),
            "manager" | "sales_manager" => Ok(Role::Manager),
            "sales_rep" | "salesrep" | "sales" | "rep" => Ok(Role::SalesRep),
            _ => Err(UnknownRole(s.to_string())),
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
