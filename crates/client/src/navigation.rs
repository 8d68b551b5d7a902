//! Navigation loop breaker.
//!
//! Several independent session checks can each decide to redirect between
//! the login screen and the authenticated area. The guard lets one redirect
//! through, suppresses the ones that pile up behind it, and after too many
//! suppressed attempts wipes navigation state and the persisted identity so
//! the client starts over from a clean login.
//!
//! Check-and-set happens under one lock, so two concurrent requests can never
//! both navigate. "Navigating" is a deadline rather than a flag, so it expires
//! on its own even if the navigator never reports back.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use kaos_auth::store::keys;
use kaos_auth::KeyValueStore;
use kaos_core::Clock;

/// Local storage keys removed by an emergency reset.
pub const RESET_KEYS: [&str; 7] = [
    keys::USER_ROLE,
    keys::USER_NAME,
    keys::USER_EMAIL,
    keys::USER_ID,
    keys::ORGANIZATION_ID,
    keys::SESSION,
    keys::DEMO_USER,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    Login,
    AuthenticatedArea,
}

impl Route {
    pub fn path(self) -> &'static str {
        match self {
            Route::Login => "/login",
            Route::AuthenticatedArea => "/dashboard",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavigationConfig {
    /// Minimum gap between two performed navigations.
    pub cooldown: Duration,
    /// How long a navigation counts as in flight.
    pub settle: Duration,
    /// Suppressed attempts that trigger an emergency reset.
    pub max_suppressed: u32,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            cooldown: Duration::milliseconds(500),
            settle: Duration::milliseconds(1_000),
            max_suppressed: 3,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("navigation to {route:?} failed: {message}")]
pub struct NavigatorError {
    pub route: Route,
    pub message: String,
}

/// Performs the actual route change (window location, router, ...).
#[async_trait]
pub trait Navigator: Send + Sync {
    async fn navigate(&self, route: Route) -> Result<(), NavigatorError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationOutcome {
    Navigated(Route),
    /// Dropped because another navigation is in flight or just happened.
    Suppressed { count: u32 },
    AlreadyThere(Route),
    /// Too many suppressed attempts; state and persisted identity were wiped.
    EmergencyReset,
    Failed(String),
}

impl NavigationOutcome {
    /// Whether the route actually changed.
    pub fn performed(&self) -> bool {
        matches!(self, NavigationOutcome::Navigated(_))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NavigationState {
    pub navigating_until: Option<DateTime<Utc>>,
    pub last_navigation_at: Option<DateTime<Utc>>,
    pub current_route: Option<Route>,
    pub suppressed_count: u32,
}

impl NavigationState {
    pub fn is_navigating(&self, now: DateTime<Utc>) -> bool {
        self.navigating_until.is_some_and(|until| now < until)
    }
}

pub struct NavigationGuard {
    config: NavigationConfig,
    clock: Arc<dyn Clock>,
    navigator: Arc<dyn Navigator>,
    store: Arc<dyn KeyValueStore>,
    state: Mutex<NavigationState>,
}

impl NavigationGuard {
    pub fn new(
        config: NavigationConfig,
        clock: Arc<dyn Clock>,
        navigator: Arc<dyn Navigator>,
        store: Arc<dyn KeyValueStore>,
    ) -> Self {
        Self {
            config,
            clock,
            navigator,
            store,
            state: Mutex::new(NavigationState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, NavigationState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn state(&self) -> NavigationState {
        self.lock().clone()
    }

    pub fn is_navigating(&self) -> bool {
        self.lock().is_navigating(self.clock.now())
    }

    /// Record where the user already is, e.g. after a direct page load.
    pub fn set_current_route(&self, route: Route) {
        self.lock().current_route = Some(route);
    }

    /// Navigate to `target` unless a navigation is in flight or within the
    /// cooldown. Returns what happened; only [`NavigationOutcome::Navigated`]
    /// changed the route.
    pub async fn request_navigate(&self, target: Route) -> NavigationOutcome {
        let now = self.clock.now();
        {
            let mut state = self.lock();
            let cooling_down = state
                .last_navigation_at
                .is_some_and(|at| now - at < self.config.cooldown);

            if state.is_navigating(now) || cooling_down {
                state.suppressed_count += 1;
                let count = state.suppressed_count;
                if count >= self.config.max_suppressed {
                    *state = NavigationState::default();
                    drop(state);
                    warn!(?target, suppressed = count, "navigation loop detected; emergency reset");
                    self.clear_persisted_identity();
                    return NavigationOutcome::EmergencyReset;
                }
                debug!(?target, suppressed = count, "navigation suppressed");
                return NavigationOutcome::Suppressed { count };
            }

            if state.current_route == Some(target) {
                return NavigationOutcome::AlreadyThere(target);
            }

            state.navigating_until = Some(now + self.config.settle);
            state.last_navigation_at = Some(now);
            state.suppressed_count = 0;
        }

        match self.navigator.navigate(target).await {
            Ok(()) => {
                self.lock().current_route = Some(target);
                info!(route = target.path(), "navigated");
                NavigationOutcome::Navigated(target)
            }
            Err(err) => {
                self.lock().navigating_until = None;
                warn!(route = target.path(), "navigation failed: {err}");
                NavigationOutcome::Failed(err.to_string())
            }
        }
    }

    /// Clear the in-flight marker, cooldown and suppression count.
    ///
    /// The current route and local storage are kept.
    pub fn reset(&self) {
        let mut state = self.lock();
        state.navigating_until = None;
        state.last_navigation_at = None;
        state.suppressed_count = 0;
    }

    /// Return every field to its initial value and remove the persisted
    /// identity keys.
    pub fn emergency_reset(&self) {
        *self.lock() = NavigationState::default();
        self.clear_persisted_identity();
        warn!("navigation state reset");
    }

    fn clear_persisted_identity(&self) {
        for key in RESET_KEYS {
            if let Err(err) = self.store.remove(key) {
                warn!(key, "failed to clear local storage key: {err}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use kaos_auth::InMemoryKeyValueStore;
    use kaos_core::ManualClock;

    use super::*;

    #[derive(Default)]
    struct RecordingNavigator {
        routes: Mutex<Vec<Route>>,
        fail: AtomicBool,
    }

    impl RecordingNavigator {
        fn routes(&self) -> Vec<Route> {
            self.routes.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Navigator for RecordingNavigator {
        async fn navigate(&self, route: Route) -> Result<(), NavigatorError> {
            tokio::task::yield_now().await;
            if self.fail.load(Ordering::SeqCst) {
                return Err(NavigatorError {
                    route,
                    message: "router unavailable".into(),
                });
            }
            self.routes.lock().unwrap().push(route);
            Ok(())
        }
    }

    struct Fixture {
        clock: Arc<ManualClock>,
        navigator: Arc<RecordingNavigator>,
        store: Arc<InMemoryKeyValueStore>,
        guard: Arc<NavigationGuard>,
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(ManualClock::starting_now());
        let navigator = Arc::new(RecordingNavigator::default());
        let store = Arc::new(InMemoryKeyValueStore::new());
        let guard = Arc::new(NavigationGuard::new(
            NavigationConfig::default(),
            clock.clone(),
            navigator.clone(),
            store.clone(),
        ));
        Fixture {
            clock,
            navigator,
            store,
            guard,
        }
    }

    #[tokio::test]
    async fn second_request_within_cooldown_is_suppressed() {
        let f = fixture();
        assert!(f.guard.request_navigate(Route::Login).await.performed());

        f.clock.advance_millis(100);
        let second = f.guard.request_navigate(Route::AuthenticatedArea).await;
        assert_eq!(second, NavigationOutcome::Suppressed { count: 1 });
        assert!(!second.performed());
        assert_eq!(f.navigator.routes(), vec![Route::Login]);
    }

    #[tokio::test]
    async fn fourth_request_in_window_triggers_emergency_reset() {
        let f = fixture();
        for key in RESET_KEYS {
            f.store.set(key, "x").unwrap();
        }
        f.store.set("unrelated", "keep").unwrap();

        assert!(f.guard.request_navigate(Route::Login).await.performed());
        f.clock.advance_millis(50);
        assert_eq!(
            f.guard.request_navigate(Route::AuthenticatedArea).await,
            NavigationOutcome::Suppressed { count: 1 }
        );
        assert_eq!(
            f.guard.request_navigate(Route::Login).await,
            NavigationOutcome::Suppressed { count: 2 }
        );
        assert_eq!(
            f.guard.request_navigate(Route::AuthenticatedArea).await,
            NavigationOutcome::EmergencyReset
        );

        assert_eq!(f.guard.state(), NavigationState::default());
        for key in RESET_KEYS {
            assert_eq!(f.store.get(key).unwrap(), None, "{key} should be cleared");
        }
        assert_eq!(f.store.get("unrelated").unwrap().as_deref(), Some("keep"));
    }

    #[tokio::test]
    async fn navigating_expires_after_settle_window() {
        let f = fixture();
        f.guard.request_navigate(Route::Login).await;
        assert!(f.guard.is_navigating());

        f.clock.advance_millis(1_001);
        assert!(!f.guard.is_navigating());
        assert!(f.guard.request_navigate(Route::AuthenticatedArea).await.performed());
        assert_eq!(f.guard.state().suppressed_count, 0);
    }

    #[tokio::test]
    async fn navigation_to_current_route_is_a_no_op() {
        let f = fixture();
        f.guard.set_current_route(Route::AuthenticatedArea);
        assert_eq!(
            f.guard.request_navigate(Route::AuthenticatedArea).await,
            NavigationOutcome::AlreadyThere(Route::AuthenticatedArea)
        );
        assert!(f.navigator.routes().is_empty());
        assert_eq!(f.guard.state().suppressed_count, 0);
    }

    #[tokio::test]
    async fn failed_navigation_clears_in_flight_marker() {
        let f = fixture();
        f.navigator.fail.store(true, Ordering::SeqCst);

        let outcome = f.guard.request_navigate(Route::Login).await;
        assert!(matches!(outcome, NavigationOutcome::Failed(_)));
        let state = f.guard.state();
        assert_eq!(state.navigating_until, None);
        assert_eq!(state.current_route, None);
    }

    #[tokio::test]
    async fn soft_reset_keeps_route_and_storage() {
        let f = fixture();
        f.store.set(keys::SESSION, "{}").unwrap();
        f.guard.request_navigate(Route::Login).await;
        f.guard.request_navigate(Route::AuthenticatedArea).await;

        f.guard.reset();
        let state = f.guard.state();
        assert_eq!(state.current_route, Some(Route::Login));
        assert_eq!(state.suppressed_count, 0);
        assert!(!f.guard.is_navigating());
        assert!(f.store.get(keys::SESSION).unwrap().is_some());

        assert!(f.guard.request_navigate(Route::AuthenticatedArea).await.performed());
    }

    #[tokio::test]
    async fn simultaneous_requests_navigate_exactly_once() {
        let f = fixture();
        let (a, b) = tokio::join!(
            f.guard.request_navigate(Route::Login),
            f.guard.request_navigate(Route::Login),
        );

        let outcomes = [a, b];
        assert_eq!(outcomes.iter().filter(|o| o.performed()).count(), 1);
        assert_eq!(
            outcomes
                .iter()
                .filter(|o| matches!(o, NavigationOutcome::Suppressed { .. }))
                .count(),
            1
        );
        assert_eq!(f.navigator.routes(), vec![Route::Login]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_tasks_across_threads_navigate_once() {
        let f = fixture();
        let tasks: Vec<_> = (0..2)
            .map(|_| {
                let guard = f.guard.clone();
                tokio::spawn(async move { guard.request_navigate(Route::Login).await })
            })
            .collect();

        let mut performed = 0;
        let mut suppressed = 0;
        for task in tasks {
            match task.await.unwrap() {
                NavigationOutcome::Navigated(_) => performed += 1,
                NavigationOutcome::Suppressed { .. } => suppressed += 1,
                other => panic!("unexpected outcome {other:?}"),
            }
        }
        assert_eq!((performed, suppressed), (1, 1));
        assert_eq!(f.navigator.routes().len(), 1);
    }
}
