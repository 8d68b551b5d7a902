//! Point-in-polygon containment and approximate polygon area.
//!
//! Coordinates are treated as planar (lng = x, lat = y) for containment. That
//! is accurate enough at territory scale and away from the antimeridian.

use crate::{GeoPoint, Territory};

/// Mean Earth radius used for area approximation.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Even-odd ray casting over the polygon's vertex ring.
///
/// Fewer than 3 vertices never contain anything. Points exactly on an edge
/// may land on either side.
pub fn point_in_polygon(lat: f64, lng: f64, polygon: &[GeoPoint]) -> bool {
    if polygon.len() < 3 {
        return false;
    }

    let mut inside = false;
    let mut j = polygon.len() - 1;
    for i in 0..polygon.len() {
        let (xi, yi) = (polygon[i].lng, polygon[i].lat);
        let (xj, yj) = (polygon[j].lng, polygon[j].lat);

        if (yi > lat) != (yj > lat) && lng < (xj - xi) * (lat - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Approximate area in km² using the spherical excess of each edge.
///
/// Only meant for comparing territories against each other.
pub fn polygon_area_km2(polygon: &[GeoPoint]) -> f64 {
    if polygon.len() < 3 {
        return 0.0;
    }

    let mut total = 0.0;
    for (i, p1) in polygon.iter().enumerate() {
        let p2 = &polygon[(i + 1) % polygon.len()];
        total += (p2.lng - p1.lng).to_radians()
            * (2.0 + p1.lat.to_radians().sin() + p2.lat.to_radians().sin());
    }
    (total * EARTH_RADIUS_KM * EARTH_RADIUS_KM / 2.0).abs()
}

/// Active territories whose boundary contains the point.
pub fn territories_containing<'a>(point: GeoPoint, territories: &'a [Territory]) -> Vec<&'a Territory> {
    territories
        .iter()
        .filter(|t| t.is_active)
        .filter(|t| {
            t.boundary
                .as_deref()
                .is_some_and(|b| point_in_polygon(point.lat, point.lng, b))
        })
        .collect()
}

/// The territory a point belongs to.
///
/// When several active territories overlap at the point, the one with the
/// smallest area wins.
pub fn best_territory_for_point(point: GeoPoint, territories: &[Territory]) -> Option<&Territory> {
    territories_containing(point, territories)
        .into_iter()
        .min_by(|a, b| area_of(a).total_cmp(&area_of(b)))
}

fn area_of(territory: &Territory) -> f64 {
    territory.boundary.as_deref().map(polygon_area_km2).unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use kaos_core::TerritoryId;
    use proptest::prelude::*;

    use super::*;

    fn ring(points: &[(f64, f64)]) -> Vec<GeoPoint> {
        points.iter().map(|(lat, lng)| GeoPoint::new(*lat, *lng)).collect()
    }

    fn square(min: f64, max: f64) -> Vec<GeoPoint> {
        ring(&[(min, min), (min, max), (max, max), (max, min)])
    }

    fn territory(name: &str, boundary: Vec<GeoPoint>) -> Territory {
        Territory::new(TerritoryId::new(), name, Utc::now()).with_boundary(boundary)
    }

    #[test]
    fn square_contains_its_centroid() {
        let sq = square(0.0, 2.0);
        assert!(point_in_polygon(1.0, 1.0, &sq));
        assert!(!point_in_polygon(50.0, 50.0, &sq));
        assert!(!point_in_polygon(-1.0, 1.0, &sq));
    }

    #[test]
    fn l_shape_handles_the_notch() {
        let l = ring(&[(0.0, 0.0), (0.0, 2.0), (1.0, 2.0), (1.0, 1.0), (2.0, 1.0), (2.0, 0.0)]);
        // Area centroid of this L is (5/6, 5/6).
        assert!(point_in_polygon(5.0 / 6.0, 5.0 / 6.0, &l));
        assert!(point_in_polygon(1.5, 0.5, &l));
        assert!(point_in_polygon(0.5, 1.5, &l));
        assert!(!point_in_polygon(1.5, 1.5, &l));
        assert!(!point_in_polygon(40.0, -40.0, &l));
    }

    #[test]
    fn fewer_than_three_vertices_contain_nothing() {
        let segment = ring(&[(0.0, 0.0), (2.0, 2.0)]);
        assert!(!point_in_polygon(1.0, 1.0, &segment));
        assert!(!point_in_polygon(0.0, 0.0, &[]));
        assert_eq!(polygon_area_km2(&segment), 0.0);
    }

    #[test]
    fn area_grows_with_size_and_ignores_orientation() {
        let small = square(0.0, 1.0);
        let large = square(0.0, 2.0);
        assert!(polygon_area_km2(&large) > polygon_area_km2(&small));

        let mut reversed = small.clone();
        reversed.reverse();
        assert!((polygon_area_km2(&reversed) - polygon_area_km2(&small)).abs() < 1e-6);

        // One degree square at the equator is roughly 12,300 km².
        let one_degree = polygon_area_km2(&small);
        assert!((12_000.0..12_700.0).contains(&one_degree), "{one_degree}");
    }

    #[test]
    fn smallest_overlapping_territory_wins() {
        let a = territory("Region", square(0.0, 4.0));
        let b = territory("Downtown", square(1.0, 2.0));
        let territories = vec![a.clone(), b.clone()];

        let best = best_territory_for_point(GeoPoint::new(1.5, 1.5), &territories);
        assert_eq!(best.map(|t| t.id), Some(b.id));

        let best = best_territory_for_point(GeoPoint::new(3.0, 3.0), &territories);
        assert_eq!(best.map(|t| t.id), Some(a.id));

        assert!(best_territory_for_point(GeoPoint::new(10.0, 10.0), &territories).is_none());
    }

    #[test]
    fn inactive_and_unbounded_territories_are_skipped() {
        let mut inactive = territory("Old", square(1.0, 2.0));
        inactive.is_active = false;
        let unbounded = Territory::new(TerritoryId::new(), "Nowhere", Utc::now());
        let region = territory("Region", square(0.0, 4.0));
        let territories = vec![inactive, unbounded, region.clone()];

        assert_eq!(
            territories_containing(GeoPoint::new(1.5, 1.5), &territories)
                .iter()
                .map(|t| t.id)
                .collect::<Vec<_>>(),
            vec![region.id]
        );
    }

    proptest! {
        #[test]
        fn rectangle_contains_interior_points(
            lat0 in -60.0f64..60.0,
            lng0 in -170.0f64..170.0,
            h in 0.01f64..5.0,
            w in 0.01f64..5.0,
            fy in 0.01f64..0.99,
            fx in 0.01f64..0.99,
        ) {
            let rect = ring(&[(lat0, lng0), (lat0, lng0 + w), (lat0 + h, lng0 + w), (lat0 + h, lng0)]);
            prop_assert!(point_in_polygon(lat0 + fy * h, lng0 + fx * w, &rect));
            prop_assert!(!point_in_polygon(lat0 + h + 1.0, lng0 + fx * w, &rect));
            prop_assert!(!point_in_polygon(lat0 + fy * h, lng0 - 1.0, &rect));
        }
    }
}
