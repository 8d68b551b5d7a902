//! Single-slot memo for the last session check.
//!
//! Page components each ask "am I signed in?" on mount. Within the TTL, or
//! while another check is still running, they get the memoized answer instead
//! of querying the identity collaborator again.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};

use kaos_core::Clock;

use crate::Session;

/// Default memo lifetime.
pub const DEFAULT_CHECK_TTL_MS: i64 = 5_000;

/// Outcome of a session check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCheck {
    pub session: Option<Session>,
    /// `false` when a collaborator could not be reached and the answer was
    /// derived from local state alone.
    pub collaborator_reachable: bool,
}

impl SessionCheck {
    pub fn signed_out() -> Self {
        Self {
            session: None,
            collaborator_reachable: true,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }
}

#[derive(Debug, Default)]
struct MemoState {
    last: Option<(SessionCheck, DateTime<Utc>)>,
    in_progress: bool,
}

pub struct AuthCheckCache {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    state: Mutex<MemoState>,
}

impl AuthCheckCache {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            clock,
            state: Mutex::new(MemoState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, MemoState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// The memoized result, if it is younger than the TTL.
    pub fn fresh(&self) -> Option<SessionCheck> {
        let now = self.clock.now();
        let state = self.state();
        match &state.last {
            Some((check, at)) if now - *at < self.ttl => Some(check.clone()),
            _ => None,
        }
    }

    /// The memoized result regardless of age.
    pub fn last(&self) -> Option<SessionCheck> {
        self.state().last.as_ref().map(|(check, _)| check.clone())
    }

    pub fn record(&self, check: SessionCheck) {
        let now = self.clock.now();
        self.state().last = Some((check, now));
    }

    pub fn is_check_in_progress(&self) -> bool {
        self.state().in_progress
    }

    pub fn set_check_in_progress(&self, in_progress: bool) {
        self.state().in_progress = in_progress;
    }

    /// Claim the right to run a check. Returns `None` if one is already running.
    ///
    /// The claim is released when the returned [`CheckClaim`] is finished or
    /// dropped, so a cancelled check cannot leave the flag set.
    pub fn try_begin_check(&self) -> Option<CheckClaim<'_>> {
        let mut state = self.state();
        if state.in_progress {
            return None;
        }
        state.in_progress = true;
        Some(CheckClaim { cache: self })
    }

    pub fn invalidate(&self) {
        self.state().last = None;
    }
}

/// An in-progress session check. Releases the claim on drop.
#[must_use = "dropping the claim releases it immediately"]
pub struct CheckClaim<'a> {
    cache: &'a AuthCheckCache,
}

impl CheckClaim<'_> {
    /// Record the result and release the claim.
    pub fn finish(self, check: SessionCheck) {
        self.cache.record(check);
    }
}

impl Drop for CheckClaim<'_> {
    fn drop(&mut self) {
        self.cache.set_check_in_progress(false);
    }
}

#[cfg(test)]
mod tests {
    use kaos_core::ManualClock;

    use super::*;

    fn cache() -> (Arc<ManualClock>, AuthCheckCache) {
        let clock = Arc::new(ManualClock::starting_now());
        let cache = AuthCheckCache::new(Duration::milliseconds(DEFAULT_CHECK_TTL_MS), clock.clone());
        (clock, cache)
    }

    #[test]
    fn memo_expires_after_ttl() {
        let (clock, cache) = cache();
        assert_eq!(cache.fresh(), None);

        cache.record(SessionCheck::signed_out());
        clock.advance_millis(4_999);
        assert_eq!(cache.fresh(), Some(SessionCheck::signed_out()));

        clock.advance_millis(1);
        assert_eq!(cache.fresh(), None);
        assert_eq!(cache.last(), Some(SessionCheck::signed_out()));
    }

    #[test]
    fn only_one_check_can_be_claimed() {
        let (_clock, cache) = cache();
        let claim = cache.try_begin_check().unwrap();
        assert!(cache.is_check_in_progress());
        assert!(cache.try_begin_check().is_none());

        claim.finish(SessionCheck::signed_out());
        assert!(!cache.is_check_in_progress());
        assert_eq!(cache.fresh(), Some(SessionCheck::signed_out()));
        assert!(cache.try_begin_check().is_some());
    }

    #[test]
    fn abandoned_claim_is_released() {
        let (_clock, cache) = cache();
        let claim = cache.try_begin_check().unwrap();
        drop(claim);

        assert!(!cache.is_check_in_progress());
        assert_eq!(cache.last(), None);
        assert!(cache.try_begin_check().is_some());
    }

    #[test]
    fn invalidate_drops_the_memo() {
        let (_clock, cache) = cache();
        cache.record(SessionCheck::signed_out());
        cache.invalidate();
        assert_eq!(cache.fresh(), None);
        assert_eq!(cache.last(), None);
    }
}
