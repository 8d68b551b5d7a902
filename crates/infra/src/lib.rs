//! Infrastructure adapters for the CRM client.
//!
//! Implementations of the ports declared by the domain crates: local durable
//! storage, the hosted identity/profile backend over HTTP, and a lead
//! repository that enforces optimistic concurrency.

pub mod lead_repository;
pub mod local_store;
pub mod remote;

pub use lead_repository::{InMemoryLeadRepository, LeadRepository, RepositoryError};
pub use local_store::JsonFileStore;
pub use remote::{BackendConfig, HttpBackend, HttpIdentityProvider, HttpProfileDirectory};
