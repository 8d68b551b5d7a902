//! Lead storage with compare-and-swap writes.

use std::collections::HashMap;
use std::sync::RwLock;

use thiserror::Error;

use kaos_core::{Aggregate, DomainError, LeadId};
use kaos_leads::{Lead, LeadCommand};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    /// The lead changed since the caller read it.
    #[error("lead {lead_id} was modified concurrently (expected version {expected}, found {actual})")]
    Conflict {
        lead_id: LeadId,
        expected: u64,
        actual: u64,
    },

    #[error("lead {0} not found")]
    NotFound(LeadId),

    #[error(transparent)]
    Domain(DomainError),

    #[error("lead storage unavailable: {0}")]
    Storage(String),
}

impl RepositoryError {
    fn from_domain(lead_id: LeadId, err: DomainError) -> Self {
        match err {
            DomainError::VersionConflict { expected, actual } => Self::Conflict {
                lead_id,
                expected,
                actual,
            },
            DomainError::NotFound => Self::NotFound(lead_id),
            other => Self::Domain(other),
        }
    }
}

/// Lead persistence port.
///
/// Reads never return soft-deleted rows. Writes go through lead commands and
/// are rejected when the stored version differs from the command's.
pub trait LeadRepository: Send + Sync {
    fn list(&self) -> Result<Vec<Lead>, RepositoryError>;

    fn get(&self, id: LeadId) -> Result<Option<Lead>, RepositoryError>;

    /// Apply a command atomically and return the updated lead.
    fn execute(&self, command: &LeadCommand) -> Result<Lead, RepositoryError>;
}

/// In-memory lead table.
///
/// Intended for tests/dev. The write lock is held across read, decide and
/// write, which makes every `execute` a compare-and-swap.
#[derive(Debug, Default)]
pub struct InMemoryLeadRepository {
    rows: RwLock<HashMap<LeadId, Lead>>,
}

impl InMemoryLeadRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert rows as-is (import/seed), replacing rows with the same id.
    pub fn import(&self, leads: impl IntoIterator<Item = Lead>) {
        let mut rows = self.rows.write().unwrap_or_else(|p| p.into_inner());
        for lead in leads {
            rows.insert(lead.id, lead);
        }
    }
}

impl LeadRepository for InMemoryLeadRepository {
    fn list(&self) -> Result<Vec<Lead>, RepositoryError> {
        let rows = self
            .rows
            .read()
            .map_err(|_| RepositoryError::Storage("lock poisoned".to_string()))?;
        let mut leads: Vec<Lead> = rows.values().filter(|l| !l.is_deleted).cloned().collect();
        leads.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(leads)
    }

    fn get(&self, id: LeadId) -> Result<Option<Lead>, RepositoryError> {
        let rows = self
            .rows
            .read()
            .map_err(|_| RepositoryError::Storage("lock poisoned".to_string()))?;
        Ok(rows.get(&id).filter(|l| !l.is_deleted).cloned())
    }

    fn execute(&self, command: &LeadCommand) -> Result<Lead, RepositoryError> {
        let lead_id = command.lead_id();
        let mut rows = self
            .rows
            .write()
            .map_err(|_| RepositoryError::Storage("lock poisoned".to_string()))?;

        let mut lead = rows.get(&lead_id).cloned().unwrap_or_else(|| Lead::empty(lead_id));
        let events = lead.handle(command).map_err(|err| {
            let err = RepositoryError::from_domain(lead_id, err);
            if matches!(err, RepositoryError::Conflict { .. }) {
                tracing::warn!(%lead_id, "{err}");
            }
            err
        })?;

        for event in &events {
            lead.apply(event);
            tracing::info!(%lead_id, version = lead.version, event = event.event_type(), "lead updated");
        }
        if !events.is_empty() {
            rows.insert(lead_id, lead.clone());
        }
        Ok(lead)
    }
}
