//! Static role catalog: which pages and capabilities each role is granted.
//!
//! This is the only place grants are defined. Every other check in the crate
//! goes through these functions.

use serde::Serialize;

use crate::{Capability, PageId, Role};

const ADMIN_PAGES: &[PageId] = &[
    PageId::Dashboard,
    PageId::Leads,
    PageId::Territories,
    PageId::Management,
    PageId::Admin,
    PageId::Settings,
];

const HR_PAGES: &[PageId] = &[
    PageId::Dashboard,
    PageId::Leads,
    PageId::Territories,
    PageId::Admin,
    PageId::Settings,
];

const MANAGER_PAGES: &[PageId] = &[
    PageId::Dashboard,
    PageId::Leads,
    PageId::Territories,
    PageId::Management,
    PageId::Settings,
];

const SALES_REP_PAGES: &[PageId] = &[
    PageId::Dashboard,
    PageId::Leads,
    PageId::Territories,
    PageId::Settings,
];

/// Capability flags of a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    pub view_all_territories: bool,
    pub view_all_leads: bool,
    pub manage_users: bool,
    pub manage_roles: bool,
    pub access_admin: bool,
}

impl Capabilities {
    pub fn get(&self, capability: Capability) -> bool {
        match capability {
            Capability::ViewAllTerritories => self.view_all_territories,
            Capability::ViewAllLeads => self.view_all_leads,
            Capability::ManageUsers => self.manage_users,
            Capability::ManageRoles => self.manage_roles,
            Capability::AccessAdmin => self.access_admin,
        }
    }
}

const FULL: Capabilities = Capabilities {
    view_all_territories: true,
    view_all_leads: true,
    manage_users: true,
    manage_roles: true,
    access_admin: true,
};

const MANAGER: Capabilities = Capabilities {
    view_all_territories: true,
    view_all_leads: true,
    manage_users: false,
    manage_roles: false,
    access_admin: false,
};

const NONE: Capabilities = Capabilities {
    view_all_territories: false,
    view_all_leads: false,
    manage_users: false,
    manage_roles: false,
    access_admin: false,
};

/// Pages a role may open.
pub fn allowed_pages(role: Role) -> &'static [PageId] {
    match role {
        Role::Admin => ADMIN_PAGES,
        Role::Hr => HR_PAGES,
        Role::Manager => MANAGER_PAGES,
        Role::SalesRep => SALES_REP_PAGES,
    }
}

/// Pages for a raw role string; unknown roles get the sales rep set.
pub fn allowed_pages_for(raw_role: &str) -> &'static [PageId] {
    allowed_pages(Role::from_str_lenient(raw_role))
}

pub fn capabilities(role: Role) -> Capabilities {
    match role {
        Role::Admin | Role::Hr => FULL,
        Role::Manager => MANAGER,
        Role::SalesRep => NONE,
    }
}

pub fn capability(role: Role, capability: Capability) -> bool {
    capabilities(role).get(capability)
}

/// Look a capability up by name. Unknown names are never granted.
pub fn capability_named(role: Role, name: &str) -> bool {
    match name.parse::<Capability>() {
        Ok(cap) => capability(role, cap),
        Err(()) => {
            tracing::debug!(capability = name, "unknown capability name");
            false
        }
    }
}

/// Role definition for display on the admin screens.
#[derive(Debug, Clone, Serialize)]
pub struct RoleDefinition {
    pub role: Role,
    pub label: &'static str,
    pub description: &'static str,
    pub pages: Vec<PageId>,
    pub capabilities: Capabilities,
}

/// The full catalog, one entry per role.
pub fn role_definitions() -> Vec<RoleDefinition> {
    Role::ALL
        .into_iter()
        .map(|role| RoleDefinition {
            role,
            label: role.label(),
            description: role_description(role),
            pages: allowed_pages(role).to_vec(),
            capabilities: capabilities(role),
        })
        .collect()
}

fn role_description(role: Role) -> &'static str {
    match role {
        Role::Admin => "Full access, including user and role administration",
        Role::Hr => "Organization-wide visibility and user administration",
        Role::Manager => "Organization-wide visibility and team management",
        Role::SalesRep => "Leads and territories assigned to the rep",
    }
}
