use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// Routed page of the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageId {
    Dashboard,
    Leads,
    Territories,
    Management,
    Admin,
    Settings,
}

impl PageId {
    pub const ALL: [PageId; 6] = [
        PageId::Dashboard,
        PageId::Leads,
        PageId::Territories,
        PageId::Management,
        PageId::Admin,
        PageId::Settings,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PageId::Dashboard => "dashboard",
            PageId::Leads => "leads",
            PageId::Territories => "territories",
            PageId::Management => "management",
            PageId::Admin => "admin",
            PageId::Settings => "settings",
        }
    }

    /// Route path of the page's index.
    pub fn path(&self) -> String {
        format!("/{}", self.as_str())
    }

    /// Resolve the page a route path belongs to (`/leads/42?tab=notes` → `Leads`).
    pub fn from_path(path: &str) -> Option<PageId> {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let first = path.trim_start_matches('/').split('/').next()?;
        first.parse().ok()
    }
}

impl FromStr for PageId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PageId::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or(())
    }
}

impl core::fmt::Display for PageId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Boolean capability granted (or not) by a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Capability {
    ViewAllTerritories,
    ViewAllLeads,
    ManageUsers,
    ManageRoles,
    AccessAdmin,
}

impl Capability {
    pub const ALL: [Capability; 5] = [
        Capability::ViewAllTerritories,
        Capability::ViewAllLeads,
        Capability::ManageUsers,
        Capability::ManageRoles,
        Capability::AccessAdmin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::ViewAllTerritories => "viewAllTerritories",
            Capability::ViewAllLeads => "viewAllLeads",
            Capability::ManageUsers => "manageUsers",
            Capability::ManageRoles => "manageRoles",
            Capability::AccessAdmin => "accessAdmin",
        }
    }
}

impl FromStr for Capability {
    type Err = ();

    /// Accepts the camelCase name, with or without a `can` prefix
    /// (`viewAllLeads`, `canViewAllLeads`), case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let bare = match s.get(..3) {
            Some(prefix) if prefix.eq_ignore_ascii_case("can") && s.len() > 3 => &s[3..],
            _ => s,
        };
        Capability::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(bare))
            .ok_or(())
    }
}

impl core::fmt::Display for Capability {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_from_path() {
        assert_eq!(PageId::from_path("/admin"), Some(PageId::Admin));
        assert_eq!(PageId::from_path("/leads/123?tab=notes"), Some(PageId::Leads));
        assert_eq!(PageId::from_path("settings"), Some(PageId::Settings));
        assert_eq!(PageId::from_path("/login"), None);
        assert_eq!(PageId::from_path("/"), None);
    }

    #[test]
    fn capability_names() {
        assert_eq!("viewAllLeads".parse(), Ok(Capability::ViewAllLeads));
        assert_eq!("canManageUsers".parse(), Ok(Capability::ManageUsers));
        assert_eq!("ACCESSADMIN".parse(), Ok(Capability::AccessAdmin));
        assert_eq!("fly".parse::<Capability>(), Err(()));
    }
}
