//! Spatial Candidate Filter
//!
//! Reduces the full hub set to O(100) candidates using the travelling
//! group's geometry (spec.md §4.10), combining an ellipse or
//! convex-hull test with a separate coverage-circle intersection.

pub mod coverage;
pub mod ellipse;
pub mod hull;

use crate::graph::{Graph, Hub};

/// A start location: one per traveller.
#[derive(Debug, Clone, Copy)]
pub struct Start {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct SpatialFilterConfig {
    pub ellipse_expansion_factor: f64,
    pub hull_buffer_fraction: f64,
    pub coverage_fraction: f64,
}

/// Run the full spatial filter: ellipse (2 starts) or buffered hull
/// (>= 3 starts), intersected with the coverage circle. Fewer than 2
/// starts degenerates to "every hub qualifies" since neither an
/// ellipse nor a hull is well-defined for a single point.
pub fn filter_candidates<'a>(
    starts: &[Start],
    graph: &'a Graph,
    config: SpatialFilterConfig,
) -> Vec<&'a Hub> {
    let geometry_pass: Box<dyn Fn(&Hub) -> bool> = match starts.len() {
        0 | 1 => Box::new(|_| true),
        2 => {
            let (a, b) = (starts[0], starts[1]);
            Box::new(move |hub: &Hub| {
                ellipse::hub_in_ellipse(a, b, hub, config.ellipse_expansion_factor)
            })
        }
        _ => {
            let polygon = hull::buffered_hull(starts, config.hull_buffer_fraction);
            Box::new(move |hub: &Hub| hull::hub_in_polygon(&polygon, hub))
        }
    };

    let (centroid, radius) = coverage::coverage_circle(starts, config.coverage_fraction);

    graph
        .hubs()
        .filter(|hub| geometry_pass(hub) && coverage::hub_in_circle(centroid, radius, hub))
        .collect()
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

    /// Property 6: both foci are always included in the 2-user case.
    #[test]
    fn ellipse_path_always_includes_both_foci() {
        let mut g = Graph::new();
        g.add_hub(hub("A", 51.516, -0.176));
        g.add_hub(hub("B", 51.504, -0.019));

        let starts = vec![
            Start { lat: 51.516, lon: -0.176 },
            Start { lat: 51.504, lon: -0.019 },
        ];
        let config = SpatialFilterConfig {
            ellipse_expansion_factor: 1.2,
            hull_buffer_fraction: 0.005,
            coverage_fraction: 0.70,
        };

        let candidates = filter_candidates(&starts, &g, config);
        let ids: Vec<&str> = candidates.iter().map(|h| h.id.as_str()).collect();
        assert!(ids.contains(&"A"));
        assert!(ids.contains(&"B"));
    }
}
