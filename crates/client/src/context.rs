//! Application context: the explicitly constructed root of the client.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{info, warn};

use kaos_auth::{
    can_access_page, explain_page_access, filter_leads, AccessExplanation, AuthError, AuthService,
    IdentityProvider, KeyValueStore, PageId, ProfileDirectory, RemoteSession, Session,
    SessionStore, StoreError,
};
use kaos_core::{Clock, SystemClock};
use kaos_infra::{HttpBackend, InMemoryLeadRepository, JsonFileStore, LeadRepository, RepositoryError};
use kaos_leads::{Lead, LeadTable, Page};

use crate::config::{AuthMode, ClientConfig, ConfigError, BACKEND_URL};
use crate::navigation::{
    NavigationGuard, NavigationOutcome, NavigationState, Navigator, NavigatorError, Route,
};
use crate::offline::OfflineMode;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result of opening a page.
#[derive(Debug, Clone)]
pub enum PageOutcome {
    Rendered { page: PageId, session: Session },
    /// The signed-in role does not include the page. Decided locally.
    Forbidden(AccessExplanation),
    NotFound,
    LoginRequired(NavigationOutcome),
}

/// Headless navigator that only records route changes in the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingNavigator;

#[async_trait]
impl Navigator for LoggingNavigator {
    async fn navigate(&self, route: Route) -> Result<(), NavigatorError> {
        info!(route = route.path(), "route change");
        Ok(())
    }
}

/// Everything a page handler needs, passed by reference.
pub struct AppContext {
    config: ClientConfig,
    store: Arc<dyn KeyValueStore>,
    auth: AuthService,
    navigation: NavigationGuard,
    connectivity: OfflineMode,
    leads: Arc<dyn LeadRepository>,
}

impl AppContext {
    pub fn new(
        config: ClientConfig,
        identity: Arc<dyn IdentityProvider>,
        profiles: Arc<dyn ProfileDirectory>,
        store: Arc<dyn KeyValueStore>,
        navigator: Arc<dyn Navigator>,
        leads: Arc<dyn LeadRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let auth = AuthService::new(
            identity,
            profiles,
            store.clone(),
            clock.clone(),
            config.auth_check_ttl,
        );
        let navigation = NavigationGuard::new(config.navigation, clock, navigator, store.clone());
        Self {
            config,
            store,
            auth,
            navigation,
            connectivity: OfflineMode::new(),
            leads,
        }
    }

    /// Production wiring: file-backed storage, system clock and the
    /// collaborators selected by `auth_mode`.
    pub fn from_config(config: ClientConfig) -> Result<Self, StartupError> {
        let store: Arc<dyn KeyValueStore> = Arc::new(JsonFileStore::open(&config.storage_path)?);

        let (identity, profiles): (Arc<dyn IdentityProvider>, Arc<dyn ProfileDirectory>) =
            match config.auth_mode {
                AuthMode::Remote => {
                    let backend_config =
                        config.backend.clone().ok_or(ConfigError::Missing(BACKEND_URL))?;
                    let backend = HttpBackend::new(backend_config);
                    if let Some(session) = SessionStore::new(store.clone()).load() {
                        backend.resume(RemoteSession {
                            email: session.email,
                            access_token: session.access_token,
                            refresh_token: session.refresh_token,
                            expires_at: None,
                        });
                    }
                    let identity: Arc<dyn IdentityProvider> = Arc::new(backend.identity());
                    let profiles: Arc<dyn ProfileDirectory> = Arc::new(backend.profiles());
                    (identity, profiles)
                }
                AuthMode::Demo => demo_collaborators(&store)?,
            };

        Ok(Self::new(
            config,
            identity,
            profiles,
            store,
            Arc::new(LoggingNavigator),
            Arc::new(InMemoryLeadRepository::new()),
            Arc::new(SystemClock),
        ))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    pub fn auth(&self) -> &AuthService {
        &self.auth
    }

    /// Snapshot of the navigation guard. Route changes go through
    /// [`AppContext::navigate`] so resets also drop the session memo.
    pub fn navigation_state(&self) -> NavigationState {
        self.navigation.state()
    }

    pub fn connectivity(&self) -> &OfflineMode {
        &self.connectivity
    }

    pub fn leads(&self) -> &Arc<dyn LeadRepository> {
        &self.leads
    }

    /// Route change through the loop breaker.
    ///
    /// An emergency reset wipes the persisted session, so the memoized
    /// session check is dropped with it.
    pub async fn navigate(&self, route: Route) -> NavigationOutcome {
        let outcome = self.navigation.request_navigate(route).await;
        if outcome == NavigationOutcome::EmergencyReset {
            self.auth.check_cache().invalidate();
        }
        outcome
    }

    /// Manual loop breaker: clear navigation state, persisted identity and
    /// the session memo.
    pub fn emergency_reset(&self) {
        self.navigation.emergency_reset();
        self.auth.check_cache().invalidate();
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        match self.auth.sign_in(email, password).await {
            Ok(session) => {
                self.connectivity.set_online();
                self.navigate(Route::AuthenticatedArea).await;
                Ok(session)
            }
            Err(err) => {
                if matches!(err, AuthError::Network(_)) {
                    self.connectivity.set_offline();
                }
                Err(err)
            }
        }
    }

    pub async fn sign_out(&self) -> NavigationOutcome {
        self.auth.sign_out().await;
        self.navigate(Route::Login).await
    }

    /// Resolve a route path to what the user gets to see.
    ///
    /// Page access is decided from the restored session before any
    /// collaborator is contacted; only permitted pages trigger the memoized
    /// session check.
    pub async fn open_page(&self, path: &str) -> PageOutcome {
        let Some(page) = PageId::from_path(path) else {
            return PageOutcome::NotFound;
        };

        let Some(local) = self.auth.restore() else {
            return PageOutcome::LoginRequired(self.navigate(Route::Login).await);
        };
        if !can_access_page(&local, page) {
            let explanation = explain_page_access(&local, page);
            warn!(user_id = %local.user_id, page = %page, "{}", explanation.reason);
            return PageOutcome::Forbidden(explanation);
        }

        let check = self.auth.check_session().await;
        self.connectivity.observe(check.collaborator_reachable);

        match check.session {
            Some(session) if can_access_page(&session, page) => {
                self.navigation.set_current_route(Route::AuthenticatedArea);
                PageOutcome::Rendered { page, session }
            }
            // Role changed on revalidation.
            Some(session) => PageOutcome::Forbidden(explain_page_access(&session, page)),
            None => PageOutcome::LoginRequired(self.navigate(Route::Login).await),
        }
    }

    /// One page of the leads table, narrowed to the session's territories.
    ///
    /// Narrowing here only shapes what the table shows; the storage backend
    /// applies its own row-level scoping and is the actual access control.
    pub fn lead_page(
        &self,
        session: &Session,
        table: &LeadTable,
        now: DateTime<Utc>,
    ) -> Result<Page<Lead>, RepositoryError> {
        let visible = filter_leads(session, self.leads.list()?);
        Ok(table.view(&visible, now))
    }
}

#[cfg(feature = "demo")]
fn demo_collaborators(
    store: &Arc<dyn KeyValueStore>,
) -> Result<(Arc<dyn IdentityProvider>, Arc<dyn ProfileDirectory>), StartupError> {
    let demo = Arc::new(kaos_auth::demo::DemoIdentity::new(store.clone()));
    let identity: Arc<dyn IdentityProvider> = demo.clone();
    let profiles: Arc<dyn ProfileDirectory> = demo;
    Ok((identity, profiles))
}

#[cfg(not(feature = "demo"))]
fn demo_collaborators(
    _store: &Arc<dyn KeyValueStore>,
) -> Result<(Arc<dyn IdentityProvider>, Arc<dyn ProfileDirectory>), StartupError> {
    Err(ConfigError::DemoModeUnavailable.into())
}
