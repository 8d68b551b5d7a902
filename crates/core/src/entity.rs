//! Entity trait: records that keep their identity while their fields change.

/// Entity marker + minimal interface.
///
/// Territories and profiles are entities; leads go further and are aggregates
/// (see [`crate::aggregate`]).
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}
