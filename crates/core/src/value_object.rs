//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// A coordinate or a polygon ring has no identity of its own; two of them with
/// the same vertices are the same value. Implementors are immutable once built.
///
/// ```ignore
/// #[derive(Debug, Clone, Copy, PartialEq)]
/// struct GeoPoint { lat: f64, lng: f64 }
///
/// impl ValueObject for GeoPoint {}
/// ```
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
