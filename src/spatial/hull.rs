//! Convex-hull filter for three or more starts (spec.md §4.10 step 2).
//!
//! The hull is computed in (lon, lat) space with `geo`'s `ConvexHull`
//! algorithm, then buffered outward by `hull_buffer_fraction` (scaling
//! each vertex away from the hull's own centroid) to compensate for
//! Earth-curvature and floating-point error at the boundary, and
//! tested with `geo`'s `Contains` point-in-polygon algorithm.

use super::Start;
use crate::graph::Hub;
use geo::{prelude::*, Coord, MultiPoint, Point, Polygon};

fn polygon_centroid(polygon: &Polygon) -> Coord {
    let coords: Vec<Coord> = polygon.exterior().coords().copied().collect();
    let n = coords.len() as f64;
    let (sum_x, sum_y) = coords
        .iter()
        .fold((0.0, 0.0), |(sx, sy), c| (sx + c.x, sy + c.y));
    Coord {
        x: sum_x / n,
        y: sum_y / n,
    }
}

fn scale_outward(coord: Coord, centroid: Coord, factor: f64) -> Coord {
    Coord {
        x: centroid.x + (coord.x - centroid.x) * factor,
        y: centroid.y + (coord.y - centroid.y) * factor,
    }
}

pub fn buffered_hull(starts: &[Start], buffer_fraction: f64) -> Polygon {
    let points: Vec<Point> = starts.iter().map(|s| Point::new(s.lon, s.lat)).collect();
    let hull = MultiPoint::new(points).convex_hull();

    let centroid = polygon_centroid(&hull);
    let factor = 1.0 + buffer_fraction;
    let buffered: Vec<Coord> = hull
        .exterior()
        .coords()
        .map(|&c| scale_outward(c, centroid, factor))
        .collect();

    Polygon::new(buffered.into(), vec![])
}

pub fn hub_in_polygon(polygon: &Polygon, hub: &Hub) -> bool {
    let point = Point::new(hub.lon, hub.lat);
    polygon.contains(&point) || polygon.exterior().contains(&point)
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

    /// Property 7: every start hub is itself in the candidate set.
    #[test]
    fn every_start_is_inside_its_own_buffered_hull() {
        let starts = vec![
            Start { lat: 51.50, lon: -0.20 },
            Start { lat: 51.52, lon: -0.05 },
            Start { lat: 51.46, lon: -0.10 },
        ];
        let polygon = buffered_hull(&starts, 0.005);

        for s in &starts {
            let h = hub("s", s.lat, s.lon);
            assert!(hub_in_polygon(&polygon, &h), "start {s:?} should qualify");
        }
    }

    #[test]
    fn a_far_away_hub_is_excluded() {
        let starts = vec![
            Start { lat: 51.50, lon: -0.20 },
            Start { lat: 51.52, lon: -0.05 },
            Start { lat: 51.46, lon: -0.10 },
        ];
        let polygon = buffered_hull(&starts, 0.005);
        let far = hub("far", 53.0, -2.5);
        assert!(!hub_in_polygon(&polygon, &far));
    }
}
