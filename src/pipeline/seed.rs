//! Curated Line List
//!
//! The terminal-hub list and fallback allow-list are "curated
//! constants" per spec.md §4.5/§4.6 — hand-maintained alongside the
//! line list itself rather than discovered from the provider, since the
//! provider has no endpoint that enumerates a line's terminals or the
//! edges its timetable structurally omits.
//!
//! This is a representative starter set, not an exhaustive network
//! description; operators extend it as new lines are onboarded.

use super::{FallbackEdge, LineSpec, TerminalHubs};
use crate::graph::Mode;

pub fn lines() -> Vec<LineSpec> {
    vec![
        LineSpec {
            id: "victoria".to_string(),
            mode: Mode::Tube,
            directions: vec!["outbound".to_string(), "inbound".to_string()],
        },
        LineSpec {
            id: "central".to_string(),
            mode: Mode::Tube,
            directions: vec!["outbound".to_string(), "inbound".to_string()],
        },
        LineSpec {
            id: "jubilee".to_string(),
            mode: Mode::Tube,
            directions: vec!["outbound".to_string(), "inbound".to_string()],
        },
        LineSpec {
            id: "dlr".to_string(),
            mode: Mode::LightRail,
            directions: vec!["outbound".to_string(), "inbound".to_string()],
        },
        LineSpec {
            id: "london-overground".to_string(),
            mode: Mode::Overground,
            directions: vec!["outbound".to_string(), "inbound".to_string()],
        },
    ]
}

pub fn terminal_hubs() -> TerminalHubs {
    let mut hubs = TerminalHubs::new();
    hubs.insert(
        "victoria".to_string(),
        vec!["940GZZLUBXN".to_string(), "940GZZLUVIC".to_string()],
    );
    hubs.insert(
        "central".to_string(),
        vec!["940GZZLUWRU".to_string(), "940GZZLUEPG".to_string()],
    );
    hubs.insert("jubilee".to_string(), vec!["940GZZLUSTD".to_string(), "940GZZLUSTM".to_string()]);
    hubs.insert("dlr".to_string(), vec!["940GZZDLBKG".to_string()]);
    hubs.insert("london-overground".to_string(), vec!["910GHGHAMIS".to_string()]);
    hubs
}

/// Edges a terminal-anchored timetable traversal structurally misses —
/// most commonly a loop line's closing segment back to its own
/// terminal. Resolved via the journey endpoint in stage 5 instead.
pub fn fallback_allowlist() -> Vec<FallbackEdge> {
    Vec::new()
}
