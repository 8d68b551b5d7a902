//! Authorization decisions for the current session.
//!
//! - No IO
//! - No panics
//! - Every grant comes from [`crate::catalog`]
//!
//! Record filtering here narrows a working set the client already fetched.
//! It keeps the UI consistent; it is not a security control. Remote queries
//! must be scoped by the backend's own row-level policies.

use serde::Serialize;
use thiserror::Error;

use kaos_core::{TerritoryId, TerritoryScoped};

use crate::{catalog, Capability, PageId, Role, Session, TerritoryScope};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: role '{role}' cannot open page '{page}'")]
    PageForbidden { role: Role, page: PageId },

    #[error("forbidden: role '{role}' lacks capability '{capability}'")]
    MissingCapability { role: Role, capability: Capability },
}

pub fn can_access_page(session: &Session, page: PageId) -> bool {
    catalog::allowed_pages(session.role).contains(&page)
}

pub fn authorize_page(session: &Session, page: PageId) -> Result<(), AuthzError> {
    if can_access_page(session, page) {
        Ok(())
    } else {
        Err(AuthzError::PageForbidden {
            role: session.role,
            page,
        })
    }
}

pub fn has_capability(session: &Session, capability: Capability) -> bool {
    catalog::capability(session.role, capability)
}

pub fn require_capability(session: &Session, capability: Capability) -> Result<(), AuthzError> {
    if has_capability(session, capability) {
        Ok(())
    } else {
        Err(AuthzError::MissingCapability {
            role: session.role,
            capability,
        })
    }
}

pub fn visible_territory_ids(session: &Session) -> TerritoryScope {
    if has_capability(session, Capability::ViewAllTerritories) {
        TerritoryScope::All
    } else {
        TerritoryScope::Only(session.assigned_territory_ids.clone())
    }
}

/// Narrow leads to the ones the session may see.
///
/// Roles with `viewAllLeads` get the input back untouched. Everyone else keeps
/// only leads whose territory is among their assigned territories; leads with
/// no territory are dropped.
pub fn filter_leads<T: TerritoryScoped>(session: &Session, leads: Vec<T>) -> Vec<T> {
    if has_capability(session, Capability::ViewAllLeads) {
        return leads;
    }
    retain_assigned(session, leads)
}

/// Narrow territories the same way, keyed on `viewAllTerritories`.
pub fn filter_territories<T: TerritoryScoped>(session: &Session, territories: Vec<T>) -> Vec<T> {
    if has_capability(session, Capability::ViewAllTerritories) {
        return territories;
    }
    retain_assigned(session, territories)
}

fn retain_assigned<T: TerritoryScoped>(session: &Session, mut records: Vec<T>) -> Vec<T> {
    records.retain(|r| {
        r.territory_id()
            .is_some_and(|id| session.assigned_territory_ids.contains(&id))
    });
    records
}

/// Whether the session may edit a territory (boundary, assignment).
///
/// Admin and HR manage all territories, managers only the ones they manage.
pub fn can_manage_territory(session: &Session, territory_id: TerritoryId) -> bool {
    match session.role {
        Role::Admin | Role::Hr => true,
        Role::Manager => session.managed_territory_ids.contains(&territory_id),
        Role::SalesRep => false,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Access explanation (audit trail)
// ─────────────────────────────────────────────────────────────────────────────

/// Why a page was (or would be) allowed or denied.
#[derive(Debug, Clone, Serialize)]
pub struct AccessExplanation {
    pub page: PageId,
    pub role: Role,
    pub granted: bool,
    pub reason: String,
    pub allowed_pages: Vec<PageId>,
    /// Roles that would be granted the page, when this one is not.
    pub granting_roles: Vec<Role>,
}

pub fn explain_page_access(session: &Session, page: PageId) -> AccessExplanation {
    let allowed = catalog::allowed_pages(session.role);
    let granted = allowed.contains(&page);

    let (reason, granting_roles) = if granted {
        (
            format!("role '{}' includes page '{}'", session.role, page),
            Vec::new(),
        )
    } else {
        let roles: Vec<Role> = Role::ALL
            .into_iter()
            .filter(|r| catalog::allowed_pages(*r).contains(&page))
            .collect();
        (
            format!(
                "role '{}' does not include page '{}'; allowed pages: {:?}",
                session.role,
                page,
                allowed.iter().map(|p| p.as_str()).collect::<Vec<_>>()
            ),
            roles,
        )
    };

    AccessExplanation {
        page,
        role: session.role,
        granted,
        reason,
        allowed_pages: allowed.to_vec(),
        granting_roles,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::Utc;
    use kaos_core::UserId;
    use proptest::prelude::*;

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Record {
        n: usize,
        territory: Option<TerritoryId>,
    }

    impl TerritoryScoped for Record {
        fn territory_id(&self) -> Option<TerritoryId> {
            self.territory
        }
    }

    fn session(role: Role, assigned: &[u128]) -> Session {
        Session {
            user_id: UserId::from_u128(1),
            email: "someone@kaos.com".to_string(),
            display_name: "Someone".to_string(),
            role,
            organization_id: None,
            assigned_territory_ids: assigned.iter().map(|n| TerritoryId::from_u128(*n)).collect(),
            managed_territory_ids: BTreeSet::from([TerritoryId::from_u128(1)]),
            access_token: "t".to_string(),
            refresh_token: "r".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn page_access_is_exactly_the_catalog() {
        for role in Role::ALL {
            let s = session(role, &[]);
            for page in PageId::ALL {
                let listed = catalog::allowed_pages(role).contains(&page);
                assert_eq!(can_access_page(&s, page), listed, "{role} / {page}");
                assert_eq!(authorize_page(&s, page).is_ok(), listed);
            }
        }
    }

    #[test]
    fn sales_rep_cannot_open_admin() {
        let s = session(Role::SalesRep, &[]);
        assert_eq!(
            authorize_page(&s, PageId::Admin),
            Err(AuthzError::PageForbidden {
                role: Role::SalesRep,
                page: PageId::Admin
            })
        );
        assert!(require_capability(&s, Capability::AccessAdmin).is_err());
    }

    #[test]
    fn territory_scope_follows_capability() {
        assert_eq!(visible_territory_ids(&session(Role::Manager, &[3])), TerritoryScope::All);
        let scope = visible_territory_ids(&session(Role::SalesRep, &[3]));
        assert!(scope.contains(TerritoryId::from_u128(3)));
        assert!(!scope.contains(TerritoryId::from_u128(4)));
        assert!(!scope.is_all());
    }

    #[test]
    fn territory_management_by_role() {
        let t1 = TerritoryId::from_u128(1);
        let t2 = TerritoryId::from_u128(2);
        assert!(can_manage_territory(&session(Role::Hr, &[]), t2));
        assert!(can_manage_territory(&session(Role::Manager, &[]), t1));
        assert!(!can_manage_territory(&session(Role::Manager, &[]), t2));
        assert!(!can_manage_territory(&session(Role::SalesRep, &[1]), t1));
    }

    #[test]
    fn explanation_names_granting_roles() {
        let explanation = explain_page_access(&session(Role::Manager, &[]), PageId::Admin);
        assert!(!explanation.granted);
        assert_eq!(explanation.granting_roles, vec![Role::Admin, Role::Hr]);

        let explanation = explain_page_access(&session(Role::Manager, &[]), PageId::Management);
        assert!(explanation.granted);
        assert!(explanation.granting_roles.is_empty());
    }

    fn records() -> impl Strategy<Value = Vec<Record>> {
        prop::collection::vec(prop::option::of(0u128..8), 0..60).prop_map(|ts| {
            ts.into_iter()
                .enumerate()
                .map(|(n, t)| Record {
                    n,
                    territory: t.map(TerritoryId::from_u128),
                })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn view_all_roles_see_everything(leads in records()) {
            for role in [Role::Admin, Role::Hr, Role::Manager] {
                let filtered = filter_leads(&session(role, &[]), leads.clone());
                prop_assert_eq!(&filtered, &leads);
            }
        }

        #[test]
        fn sales_rep_sees_exactly_assigned_territories(
            leads in records(),
            assigned in prop::collection::btree_set(0u128..8, 0..4),
        ) {
            let assigned: Vec<u128> = assigned.into_iter().collect();
            let s = session(Role::SalesRep, &assigned);
            let filtered = filter_leads(&s, leads.clone());

            let expected: Vec<Record> = leads
                .into_iter()
                .filter(|l| l.territory.is_some_and(|t| s.assigned_territory_ids.contains(&t)))
                .collect();
            prop_assert_eq!(filtered, expected);
        }
    }
}
