//! Territory scoping for records that authorization filters by territory.

use crate::TerritoryId;

/// A record that may belong to a territory.
///
/// The authorization layer only needs this much to decide whether a record is
/// inside a user's visible scope, so it stays independent of the lead and
/// territory crates.
pub trait TerritoryScoped {
    fn territory_id(&self) -> Option<TerritoryId>;
}

impl<T: TerritoryScoped + ?Sized> TerritoryScoped for &T {
    fn territory_id(&self) -> Option<TerritoryId> {
        (**self).territory_id()
    }
}
