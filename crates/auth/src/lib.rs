//! `kaos-auth`: who the user is and what they may see.
//!
//! Role catalog, session lifecycle, authorization decisions and the memoized
//! session check. Network and storage are reached only through the ports in
//! [`identity`] and [`store`].

pub mod authorize;
pub mod catalog;
pub mod check_cache;
pub mod credentials;
#[cfg(any(test, feature = "demo"))]
pub mod demo;
pub mod identity;
pub mod permissions;
pub mod roles;
pub mod service;
pub mod session;
pub mod store;

pub use authorize::{
    authorize_page, can_access_page, can_manage_territory, explain_page_access, filter_leads,
    filter_territories, has_capability, require_capability, visible_territory_ids,
    AccessExplanation, AuthzError,
};
pub use catalog::{allowed_pages, capability, Capabilities};
pub use check_cache::{AuthCheckCache, CheckClaim, SessionCheck, DEFAULT_CHECK_TTL_MS};
pub use credentials::validate_credentials;
pub use identity::{
    DirectoryError, IdentityError, IdentityProvider, Profile, ProfileDirectory, RemoteSession,
};
pub use permissions::{Capability, PageId};
pub use roles::{Role, UnknownRole};
pub use service::{AuthError, AuthEvent, AuthService, SignOutReason};
pub use session::{Session, TerritoryScope};
pub use store::{InMemoryKeyValueStore, KeyValueStore, SessionStore, StoreError};
