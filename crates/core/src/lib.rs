//! `kaos-core`: shared building blocks for the CRM domain crates.
//!
//! Pure types only: identifiers, the domain error model, aggregate traits and
//! a clock abstraction. Nothing in here performs IO.

pub mod aggregate;
pub mod clock;
pub mod entity;
pub mod error;
pub mod id;
pub mod scope;
pub mod value_object;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use clock::{Clock, ManualClock, SystemClock};
pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{LeadId, OrganizationId, TerritoryId, UserId};
pub use scope::TerritoryScoped;
pub use value_object::ValueObject;
