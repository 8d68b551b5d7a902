//! `kaos-client`: the CRM client shell.
//!
//! Wires the domain crates together behind an explicitly constructed
//! [`AppContext`]: configuration, local storage, the auth service, the
//! navigation guard and connectivity state. Nothing here is a process-wide
//! singleton.

pub mod config;
pub mod context;
pub mod navigation;
pub mod offline;

pub use config::{AuthMode, ClientConfig, ConfigError};
pub use context::{AppContext, LoggingNavigator, PageOutcome, StartupError};
pub use navigation::{
    NavigationConfig, NavigationGuard, NavigationOutcome, NavigationState, Navigator,
    NavigatorError, Route, RESET_KEYS,
};
pub use offline::{ConnectivityState, OfflineMode};
