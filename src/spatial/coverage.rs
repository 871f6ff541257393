//! Coverage-circle filter (spec.md §4.10 steps 3-4).
//!
//! The coverage centroid is the arithmetic mean of the starts' lat/lon;
//! the coverage radius is the smallest radius containing at least
//! `coverage_fraction` of the starts, found by sorting the starts'
//! distances to the centroid and taking the `ceil(fraction * n)`-th
//! smallest.

use super::Start;
use crate::graph::Hub;
use geo::{prelude::*, Point};

pub type Centroid = Point;

fn point_of(lat: f64, lon: f64) -> Point {
    Point::new(lon, lat)
}

/// Returns the centroid and the coverage radius in metres.
pub fn coverage_circle(starts: &[Start], fraction: f64) -> (Centroid, f64) {
    if starts.is_empty() {
        return (point_of(0.0, 0.0), 0.0);
    }

    let n = starts.len() as f64;
    let mean_lat = starts.iter().map(|s| s.lat).sum::<f64>() / n;
    let mean_lon = starts.iter().map(|s| s.lon).sum::<f64>() / n;
    let centroid = point_of(mean_lat, mean_lon);

    let mut distances: Vec<f64> = starts
        .iter()
        .map(|s| point_of(s.lat, s.lon).haversine_distance(&centroid))
        .collect();
    distances.sort_by(|a, b| a.partial_cmp(b).unwrap());

    let required = ((fraction * n).ceil() as usize).clamp(1, starts.len());
    let radius = distances[required - 1];

    (centroid, radius)
}

pub fn hub_in_circle(centroid: Centroid, radius: f64, hub: &Hub) -> bool {
    let h = point_of(hub.lat, hub.lon);
    h.haversine_distance(&centroid) <= radius
}
