//! Sign-in, restore, sign-out and memoized session checks.

use std::sync::Arc;

use chrono::Duration;
use thiserror::Error;
use tokio::sync::broadcast;

use kaos_core::{Clock, UserId};

use crate::check_cache::{AuthCheckCache, SessionCheck};
use crate::credentials::validate_credentials;
use crate::identity::{DirectoryError, IdentityError, IdentityProvider, Profile, ProfileDirectory};
use crate::store::{KeyValueStore, SessionStore};
use crate::{Role, Session};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Malformed email or empty password; no network call was made.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("account is inactive")]
    AccountInactive,

    #[error("no profile matches the authenticated identity")]
    ProfileNotFound,

    #[error("network error: {0}")]
    Network(String),
}

impl AuthError {
    /// The single line shown inline on the login form.
    pub fn user_message(&self) -> String {
        match self {
            AuthError::InvalidInput(msg) => msg.clone(),
            AuthError::InvalidCredentials => "Invalid email or password".to_string(),
            AuthError::AccountInactive => {
                "Your account has been deactivated. Please contact your administrator.".to_string()
            }
            AuthError::ProfileNotFound => {
                "No user profile was found for this account. Please contact your administrator."
                    .to_string()
            }
            AuthError::Network(_) => {
                "Unable to reach the server. Please check your connection and try again."
                    .to_string()
            }
        }
    }
}

impl From<IdentityError> for AuthError {
    fn from(value: IdentityError) -> Self {
        match value {
            IdentityError::InvalidCredentials => AuthError::InvalidCredentials,
            other => AuthError::Network(other.to_string()),
        }
    }
}

impl From<DirectoryError> for AuthError {
    fn from(value: DirectoryError) -> Self {
        AuthError::Network(value.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignOutReason {
    UserRequested,
    AccountDeactivated,
    ProfileMissing,
}

/// Auth state change notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn { user_id: UserId, role: Role },
    SignedOut { user_id: Option<UserId>, reason: SignOutReason },
}

const EVENT_CAPACITY: usize = 16;

/// Owns the current session's lifecycle.
///
/// Constructed explicitly and shared by reference; there is no process-wide
/// instance.
pub struct AuthService {
    identity: Arc<dyn IdentityProvider>,
    profiles: Arc<dyn ProfileDirectory>,
    sessions: SessionStore,
    checks: AuthCheckCache,
    clock: Arc<dyn Clock>,
    events: broadcast::Sender<AuthEvent>,
}

impl AuthService {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        profiles: Arc<dyn ProfileDirectory>,
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        check_ttl: Duration,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            identity,
            profiles,
            sessions: SessionStore::new(store),
            checks: AuthCheckCache::new(check_ttl, clock.clone()),
            clock,
            events,
        }
    }

    /// Subscribe to sign-in/sign-out notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    pub fn check_cache(&self) -> &AuthCheckCache {
        &self.checks
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let email = validate_credentials(email, password)?;

        let remote = match self.identity.sign_in_with_password(&email, password).await {
            Ok(remote) => remote,
            Err(err) => {
                tracing::info!(%email, "sign-in rejected: {err}");
                return Err(err.into());
            }
        };

        let profile = match self.profiles.find_by_email(&email).await {
            Ok(Some(profile)) => profile,
            Ok(None) => {
                tracing::warn!(%email, "authenticated identity has no profile row");
                self.discard_remote_session().await;
                return Err(AuthError::ProfileNotFound);
            }
            Err(err) => {
                tracing::warn!(%email, "profile lookup failed after sign-in: {err}");
                self.discard_remote_session().await;
                return Err(err.into());
            }
        };

        if !profile.is_active {
            tracing::warn!(%email, user_id = %profile.id, "sign-in blocked: account inactive");
            self.discard_remote_session().await;
            return Err(AuthError::AccountInactive);
        }

        let session = Session::from_profile(&profile, &remote, self.clock.now());
        self.sessions.persist(&session);
        self.checks.record(SessionCheck {
            session: Some(session.clone()),
            collaborator_reachable: true,
        });

        tracing::info!(user_id = %session.user_id, role = %session.role, "signed in");
        let _ = self.events.send(AuthEvent::SignedIn {
            user_id: session.user_id,
            role: session.role,
        });

        Ok(session)
    }

    /// Restore the persisted session without asking the network.
    pub fn restore(&self) -> Option<Session> {
        self.sessions.load()
    }

    /// Clear local state and ask the collaborator to end the remote session.
    ///
    /// Always succeeds locally; a failed remote call is only logged.
    pub async fn sign_out(&self) {
        self.end_session(SignOutReason::UserRequested).await;
    }

    async fn end_session(&self, reason: SignOutReason) {
        let user_id = self.sessions.load().map(|s| s.user_id);
        self.sessions.clear();
        self.checks.record(SessionCheck::signed_out());
        self.discard_remote_session().await;

        tracing::info!(?user_id, ?reason, "signed out");
        let _ = self.events.send(AuthEvent::SignedOut { user_id, reason });
    }

    async fn discard_remote_session(&self) {
        if let Err(err) = self.identity.sign_out().await {
            tracing::warn!("remote sign-out failed: {err}");
        }
    }

    /// Memoized "who is signed in" check.
    ///
    /// Within the memo TTL, or while another check is running, the memoized
    /// answer is returned. Otherwise the local session is revalidated against
    /// the profile directory (a deactivated account is signed out), or, with
    /// no local session, a session held by the identity collaborator is
    /// adopted.
    pub async fn check_session(&self) -> SessionCheck {
        if let Some(check) = self.checks.fresh() {
            return check;
        }
        let Some(claim) = self.checks.try_begin_check() else {
            tracing::debug!("session check already in progress; using memo");
            return self.checks.last().unwrap_or_else(SessionCheck::signed_out);
        };

        let check = match self.restore() {
            Some(local) => self.revalidate(local).await,
            None => self.adopt_remote_session().await,
        };
        claim.finish(check.clone());
        check
    }

    async fn revalidate(&self, mut local: Session) -> SessionCheck {
        match self.profiles.find_by_email(&local.email).await {
            Ok(Some(profile)) if profile.is_active => {
                if local.refresh_from(&profile) {
                    tracing::info!(user_id = %local.user_id, role = %local.role, "session refreshed from profile");
                    self.sessions.persist(&local);
                }
                SessionCheck {
                    session: Some(local),
                    collaborator_reachable: true,
                }
            }
            Ok(Some(_)) => {
                self.end_session(SignOutReason::AccountDeactivated).await;
                SessionCheck::signed_out()
            }
            Ok(None) => {
                self.end_session(SignOutReason::ProfileMissing).await;
                SessionCheck::signed_out()
            }
            Err(err) => {
                tracing::warn!("profile revalidation failed; keeping local session: {err}");
                SessionCheck {
                    session: Some(local),
                    collaborator_reachable: false,
                }
            }
        }
    }

    async fn adopt_remote_session(&self) -> SessionCheck {
        let remote = match self.identity.get_session().await {
            Ok(Some(remote)) => remote,
            Ok(None) => return SessionCheck::signed_out(),
            Err(err) => {
                tracing::warn!("identity session lookup failed: {err}");
                return SessionCheck {
                    session: None,
                    collaborator_reachable: false,
                };
            }
        };

        match self.profiles.find_by_email(&remote.email).await {
            Ok(Some(profile)) if profile.is_active => {
                let session = Session::from_profile(&profile, &remote, self.clock.now());
                self.sessions.persist(&session);
                tracing::info!(user_id = %session.user_id, "adopted remote session");
                SessionCheck {
                    session: Some(session),
                    collaborator_reachable: true,
                }
            }
            Ok(profile) => {
                let reason = if profile.is_some() {
                    SignOutReason::AccountDeactivated
                } else {
                    SignOutReason::ProfileMissing
                };
                self.end_session(reason).await;
                SessionCheck::signed_out()
            }
            Err(err) => {
                tracing::warn!("profile lookup for remote session failed: {err}");
                SessionCheck {
                    session: None,
                    collaborator_reachable: false,
                }
            }
        }
    }

    /// Look a profile up directly (admin screens).
    pub async fn profile(&self, email: &str) -> Result<Option<Profile>, AuthError> {
        Ok(self.profiles.find_by_email(&email.trim().to_lowercase()).await?)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;
    use kaos_core::ManualClock;

    use super::*;
    use crate::check_cache::DEFAULT_CHECK_TTL_MS;
    use crate::demo::{territories, DemoIdentity};
    use crate::identity::RemoteSession;
    use crate::store::{keys, InMemoryKeyValueStore};
    use crate::{allowed_pages, PageId};

    /// Wraps the demo identity and counts calls; the directory can be made
    /// unreachable.
    struct Harness {
        demo: DemoIdentity,
        identity_calls: AtomicUsize,
        directory_down: AtomicBool,
        directory_hangs: AtomicBool,
    }

    #[async_trait]
    impl IdentityProvider for Harness {
        async fn sign_in_with_password(
            &self,
            email: &str,
            password: &str,
        ) -> Result<RemoteSession, IdentityError> {
            self.identity_calls.fetch_add(1, Ordering::SeqCst);
            self.demo.sign_in_with_password(email, password).await
        }

        async fn get_session(&self) -> Result<Option<RemoteSession>, IdentityError> {
            self.identity_calls.fetch_add(1, Ordering::SeqCst);
            self.demo.get_session().await
        }

        async fn sign_out(&self) -> Result<(), IdentityError> {
            self.demo.sign_out().await
        }
    }

    #[async_trait]
    impl ProfileDirectory for Harness {
        async fn find_by_email(&self, email: &str) -> Result<Option<Profile>, DirectoryError> {
            if self.directory_hangs.load(Ordering::SeqCst) {
                std::future::pending::<()>().await;
            }
            if self.directory_down.load(Ordering::SeqCst) {
                return Err(DirectoryError::Network("connection refused".to_string()));
            }
            self.demo.find_by_email(email).await
        }
    }

    struct Fixture {
        kv: Arc<InMemoryKeyValueStore>,
        clock: Arc<ManualClock>,
        harness: Arc<Harness>,
        service: AuthService,
    }

    fn fixture() -> Fixture {
        let kv = Arc::new(InMemoryKeyValueStore::new());
        let clock = Arc::new(ManualClock::starting_now());
        let harness = Arc::new(Harness {
            demo: DemoIdentity::new(kv.clone()),
            identity_calls: AtomicUsize::new(0),
            directory_down: AtomicBool::new(false),
            directory_hangs: AtomicBool::new(false),
        });
        let service = AuthService::new(
            harness.clone(),
            harness.clone(),
            kv.clone(),
            clock.clone(),
            Duration::milliseconds(DEFAULT_CHECK_TTL_MS),
        );
        Fixture {
            kv,
            clock,
            harness,
            service,
        }
    }

    #[tokio::test]
    async fn malformed_input_fails_before_any_network_call() {
        let f = fixture();

        let err = f.service.sign_in("not-an-email", "pw").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidInput(_)));
        let err = f.service.sign_in("sales@kaos.com", "").await.unwrap_err();
        assert_eq!(err.user_message(), "Password is required");

        assert_eq!(f.harness.identity_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn demo_sales_rep_signs_in_with_any_password() {
        let f = fixture();
        let mut events = f.service.subscribe();

        let session = f.service.sign_in("Sales@kaos.com", "whatever").await.unwrap();

        assert_eq!(session.role, Role::SalesRep);
        assert_eq!(session.email, "sales@kaos.com");
        assert!(session.assigned_territory_ids.contains(&territories::NORTH));
        assert_eq!(
            allowed_pages(session.role),
            &[PageId::Dashboard, PageId::Leads, PageId::Territories, PageId::Settings]
        );
        assert_eq!(f.kv.get(keys::USER_ROLE).unwrap().as_deref(), Some("sales_rep"));
        assert!(f.kv.get(keys::DEMO_USER).unwrap().is_some());
        assert_eq!(f.service.restore(), Some(session.clone()));
        assert_eq!(
            events.recv().await.unwrap(),
            AuthEvent::SignedIn {
                user_id: session.user_id,
                role: Role::SalesRep
            }
        );
    }

    #[tokio::test]
    async fn unknown_account_is_invalid_credentials() {
        let f = fixture();
        let err = f.service.sign_in("ceo@kaos.com", "pw").await.unwrap_err();
        assert_eq!(err, AuthError::InvalidCredentials);
        assert_eq!(err.user_message(), "Invalid email or password");
    }

    #[tokio::test]
    async fn inactive_account_is_stopped_and_remote_session_discarded() {
        let f = fixture();
        f.harness.demo.deactivate("manager@kaos.com");

        let err = f.service.sign_in("manager@kaos.com", "pw").await.unwrap_err();

        assert_eq!(err, AuthError::AccountInactive);
        assert_eq!(f.kv.get(keys::DEMO_USER).unwrap(), None);
        assert_eq!(f.service.restore(), None);
    }

    #[tokio::test]
    async fn directory_outage_during_sign_in_is_a_network_error() {
        let f = fixture();
        f.harness.directory_down.store(true, Ordering::SeqCst);

        let err = f.service.sign_in("admin@kaos.com", "pw").await.unwrap_err();
        assert!(matches!(err, AuthError::Network(_)));
        assert_eq!(f.service.restore(), None);
    }

    #[tokio::test]
    async fn sign_out_clears_local_state_and_notifies() {
        let f = fixture();
        let session = f.service.sign_in("hr@kaos.com", "pw").await.unwrap();
        let mut events = f.service.subscribe();

        f.service.sign_out().await;

        assert_eq!(f.service.restore(), None);
        assert!(f.kv.is_empty());
        assert_eq!(
            events.recv().await.unwrap(),
            AuthEvent::SignedOut {
                user_id: Some(session.user_id),
                reason: SignOutReason::UserRequested
            }
        );
    }

    #[tokio::test]
    async fn session_check_is_memoized_within_ttl() {
        let f = fixture();
        f.service.sign_in("admin@kaos.com", "pw").await.unwrap();
        f.harness.directory_down.store(true, Ordering::SeqCst);

        // Memo from sign-in is still fresh: no revalidation happens.
        let check = f.service.check_session().await;
        assert!(check.is_authenticated());
        assert!(check.collaborator_reachable);

        // Past the TTL the directory is consulted; being unreachable keeps the
        // local session.
        f.clock.advance_millis(DEFAULT_CHECK_TTL_MS);
        let check = f.service.check_session().await;
        assert!(check.is_authenticated());
        assert!(!check.collaborator_reachable);
    }

    #[tokio::test]
    async fn deactivation_is_detected_on_revalidation() {
        let f = fixture();
        f.service.sign_in("manager@kaos.com", "pw").await.unwrap();
        let mut events = f.service.subscribe();

        f.harness.demo.deactivate("manager@kaos.com");
        f.clock.advance_millis(DEFAULT_CHECK_TTL_MS + 1);

        let check = f.service.check_session().await;
        assert!(!check.is_authenticated());
        assert_eq!(f.service.restore(), None);
        assert!(matches!(
            events.recv().await.unwrap(),
            AuthEvent::SignedOut {
                reason: SignOutReason::AccountDeactivated,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn remote_session_is_adopted_when_local_copy_is_missing() {
        let f = fixture();
        f.service.sign_in("sales@kaos.com", "pw").await.unwrap();
        SessionStore::new(f.kv.clone()).clear();
        f.clock.advance_millis(DEFAULT_CHECK_TTL_MS);

        let check = f.service.check_session().await;
        assert_eq!(check.session.map(|s| s.role), Some(Role::SalesRep));
        assert!(f.service.restore().is_some());
    }

    #[tokio::test]
    async fn overlapping_check_returns_memo() {
        let f = fixture();
        f.service.check_cache().record(SessionCheck::signed_out());
        f.clock.advance_millis(DEFAULT_CHECK_TTL_MS);
        let _running = f.service.check_cache().try_begin_check().unwrap();

        let check = f.service.check_session().await;
        assert_eq!(check, SessionCheck::signed_out());
        assert_eq!(f.harness.identity_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn cancelled_check_does_not_block_later_revalidation() {
        let f = fixture();
        f.service.sign_in("manager@kaos.com", "pw").await.unwrap();
        f.clock.advance_millis(DEFAULT_CHECK_TTL_MS + 1);

        f.harness.directory_hangs.store(true, Ordering::SeqCst);
        let timed_out = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            f.service.check_session(),
        )
        .await;
        assert!(timed_out.is_err());
        assert!(!f.service.check_cache().is_check_in_progress());

        f.harness.directory_hangs.store(false, Ordering::SeqCst);
        f.harness.demo.deactivate("manager@kaos.com");
        f.clock.advance_millis(60_000);

        let check = f.service.check_session().await;
        assert!(!check.is_authenticated());
        assert_eq!(f.service.restore(), None);
    }
}
