use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use kaos_core::{DomainError, Entity, TerritoryId, TerritoryScoped, UserId, ValueObject};

/// A WGS84 coordinate in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl ValueObject for GeoPoint {}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if !self.lat.is_finite() || !(-90.0..=90.0).contains(&self.lat) {
            return Err(DomainError::validation(format!("latitude out of range: {}", self.lat)));
        }
        if !self.lng.is_finite() || !(-180.0..=180.0).contains(&self.lng) {
            return Err(DomainError::validation(format!("longitude out of range: {}", self.lng)));
        }
        Ok(())
    }
}

/// A named sales region.
///
/// The boundary is an ordered ring of vertices; the closing vertex may be
/// repeated or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Territory {
    pub id: TerritoryId,
    pub name: String,
    /// Display color, e.g. `#3b82f6`.
    pub color: String,
    #[serde(default)]
    pub boundary: Option<Vec<GeoPoint>>,
    #[serde(default)]
    pub center: Option<GeoPoint>,
    #[serde(default)]
    pub assigned_user_id: Option<UserId>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

fn default_active() -> bool {
    true
}

impl Territory {
    pub fn new(id: TerritoryId, name: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            name: name.into(),
            color: "#3b82f6".to_string(),
            boundary: None,
            center: None,
            assigned_user_id: None,
            is_active: true,
            created_at,
        }
    }

    pub fn with_boundary(mut self, boundary: Vec<GeoPoint>) -> Self {
        self.boundary = Some(boundary);
        self
    }

    /// Check name and boundary before a territory is saved.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("territory name cannot be empty"));
        }
        if let Some(boundary) = &self.boundary {
            if boundary.len() < 3 {
                return Err(DomainError::validation(
                    "territory boundary needs at least 3 vertices",
                ));
            }
            for vertex in boundary {
                vertex.validate()?;
            }
        }
        Ok(())
    }

    /// Stored center, or the vertex average of the boundary.
    pub fn center(&self) -> Option<GeoPoint> {
        if self.center.is_some() {
            return self.center;
        }
        let boundary = self.boundary.as_ref().filter(|b| !b.is_empty())?;
        let n = boundary.len() as f64;
        let (lat, lng) = boundary
            .iter()
            .fold((0.0, 0.0), |(lat, lng), p| (lat + p.lat, lng + p.lng));
        Some(GeoPoint::new(lat / n, lng / n))
    }
}

impl Entity for Territory {
    type Id = TerritoryId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl TerritoryScoped for Territory {
    fn territory_id(&self) -> Option<TerritoryId> {
        Some(self.id)
    }
}
