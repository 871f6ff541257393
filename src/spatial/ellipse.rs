//! Two-focus ellipse filter (spec.md §4.10 step 1).
//!
//! A major axis equal to the inter-focal distance collapses the
//! ellipse onto the segment joining the foci (b = 0), rejecting every
//! off-line station, so the major axis is expanded by
//! `ellipse_expansion_factor` (default 1.2, giving a tube roughly
//! 0.66x the focal distance wide).

use super::Start;
use crate::graph::Hub;
use geo::{prelude::*, Point};

fn point_of(lat: f64, lon: f64) -> Point {
    Point::new(lon, lat)
}

/// Sum of great-circle distances from `hub` to both foci, compared
/// against the expanded major axis. Haversine distance is used
/// consistently on both sides of the comparison (property 11:
/// haversine is symmetric).
pub fn hub_in_ellipse(focus_a: Start, focus_b: Start, hub: &Hub, expansion_factor: f64) -> bool {
    let a = point_of(focus_a.lat, focus_a.lon);
    let b = point_of(focus_b.lat, focus_b.lon);
    let h = point_of(hub.lat, hub.lon);

    let focal_distance = a.haversine_distance(&b);
    let major_axis = expansion_factor * focal_distance;
    let sum_of_distances = h.haversine_distance(&a) + h.haversine_distance(&b);

    sum_of_distances <= major_axis
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{ConstituentStation, Mode};

    fn hub(id: &str, lat: f64, lon: f64) -> Hub {
        Hub {
            id: id.to_string(),
            name: id.to_string(),
            lat,
            lon,
            zone: None,
            modes: vec![Mode::Tube],
            lines: vec![],
            constituent_stations: vec![ConstituentStation {
                name: id.to_string(),
                naptan_id: id.to_string(),
            }],
            primary_naptan_id: id.to_string(),
        }
    }

    /// Scenario S1: Ladbroke Grove / Canary Wharf foci, Paddington candidate.
    #[test]
    fn s1_paddington_qualifies() {
        let a = Start { lat: 51.516, lon: -0.176 };
        let b = Start { lat: 51.504, lon: -0.019 };
        let paddington = hub("paddington", 51.517, -0.176);

        assert!(hub_in_ellipse(a, b, &paddington, 1.2));
    }

    #[test]
    fn both_foci_always_qualify() {
        let a = Start { lat: 51.516, lon: -0.176 };
        let b = Start { lat: 51.504, lon: -0.019 };

        assert!(hub_in_ellipse(a, b, &hub("a", a.lat, a.lon), 1.2));
        assert!(hub_in_ellipse(a, b, &hub("b", b.lat, b.lon), 1.2));
    }

    #[test]
    fn a_distant_hub_does_not_qualify() {
        let a = Start { lat: 51.516, lon: -0.176 };
        let b = Start { lat: 51.504, lon: -0.019 };
        let far = hub("far", 52.5, -1.9); // Birmingham-ish

        assert!(!hub_in_ellipse(a, b, &far, 1.2));
    }

    /// Property 11: haversine distance is symmetric, so swapping the
    /// foci must not change which hubs qualify.
    #[test]
    fn haversine_distance_is_symmetric() {
        let a = point_of(51.516, -0.176);
        let b = point_of(51.504, -0.019);

        approx::assert_relative_eq!(
            a.haversine_distance(&b),
            b.haversine_distance(&a),
            epsilon = 1e-9
        );
    }
}
