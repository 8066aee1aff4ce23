//! # Network Matcher
//!
//! Segment-based matching of two independently collected street/path
//! networks covering the same area (e.g. a crowd-sourced OSM extract
//! against an authoritative reference dataset).
//!
//! For every edge in each network, the engine decides whether a
//! geometrically and topologically equivalent edge exists in the other
//! network:
//!
//! 1. **Segmentation** - polyline edges are cut into fixed-length segments
//! 2. **Candidate location** - an R-tree buffer search pairs up spatially
//!    proximate segments across the two sets
//! 3. **Resolution** - pairs are filtered on angular deviation and
//!    Hausdorff distance, then ambiguity is resolved into per-segment
//!    verdicts (matched / unmatched / undecided)
//! 4. **Aggregation** - segment verdicts roll up to the original edge ids,
//!    and categorical attributes can be transferred between matched edges
//!
//! Coordinates must be in a shared projected CRS; all math is planar
//! Euclidean in that CRS's linear unit.
//!
//! ## Features
//!
//! - **`parallel`** - Parallel candidate scoring with rayon
//!
//! ## Quick Start
//!
//! ```rust
//! use geo::LineString;
//! use network_matcher::{match_networks, Edge, EdgeStatus, MatchParams, Network};
//!
//! // Two one-edge networks tracing the same 100 m street
//! let osm = Network {
//!     edges: vec![Edge::new(1, LineString::from(vec![(0.0, 0.0), (100.0, 0.0)]))],
//! };
//! let reference = Network {
//!     edges: vec![Edge::new(1, LineString::from(vec![(0.0, 1.0), (100.0, 1.0)]))],
//! };
//!
//! let outcome = match_networks(&osm, &reference, &MatchParams::default()).unwrap();
//! assert_eq!(outcome.osm_edges.results[0].status, EdgeStatus::Matched);
//! assert_eq!(outcome.ref_edges.results[0].status, EdgeStatus::Matched);
//! ```

use std::collections::{HashMap, HashSet};
use std::fmt;

use geo::LineString;
use log::{info, warn};
use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{MatchError, Result};

// Planar geometry helpers
pub mod geo_utils;

// Segmentation of edges into matching units
pub mod segment;
pub use segment::{segment_edges, Segment, SegmentCollection};

// Spatial candidate location
pub mod candidates;
pub use candidates::{find_candidates, CandidatePair};

// Similarity scoring and match resolution
pub mod resolve;
pub use resolve::{resolve, score_pair, MatchDecision, MatchStatus, SegmentMatchTable};

// Edge-level rollup and attribute transfer
pub mod aggregate;
pub use aggregate::{propagate_attribute, summarize, EdgeMatchResult, EdgeStatus, EdgeSummary};

// ============================================================================
// Core Types
// ============================================================================

/// Stable edge identifier, unique within its network.
pub type EdgeId = u64;

/// Segment identifier, unique within its [`SegmentCollection`] (and equal to
/// the segment's index in it).
pub type SegId = u64;

/// Which of the two input networks a collection or status belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NetworkRole {
    Osm,
    Reference,
}

impl fmt::Display for NetworkRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkRole::Osm => write!(f, "osm"),
            NetworkRole::Reference => write!(f, "reference"),
        }
    }
}

/// One polyline feature of a network, with a stable id and an attribute bag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    /// Polyline geometry in the shared projected CRS.
    pub geometry: LineString<f64>,
    /// Network-specific tags (e.g. a protection classification).
    pub attributes: HashMap<String, String>,
}

impl Edge {
    pub fn new(id: EdgeId, geometry: LineString<f64>) -> Self {
        Self {
            id,
            geometry,
            attributes: HashMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// An ordered collection of edges forming one network.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Network {
    pub edges: Vec<Edge>,
}

impl Network {
    pub fn new(edges: Vec<Edge>) -> Self {
        Self { edges }
    }

    /// Check the input contract: edge ids must be unique within the network.
    pub fn validate(&self, role: NetworkRole) -> Result<()> {
        let mut seen: HashSet<EdgeId> = HashSet::with_capacity(self.edges.len());
        for edge in &self.edges {
            if !seen.insert(edge.id) {
                return Err(MatchError::DuplicateEdgeId { role, edge_id: edge.id });
            }
        }
        Ok(())
    }
}

/// Tuning parameters for a matching run. All values are in the CRS's linear
/// unit except `angular_threshold` (degrees). All must be positive; no
/// default is safe across datasets, so review these against your data's
/// positional accuracy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchParams {
    /// Nominal segment length; the last segment of an edge may be shorter.
    pub segment_length: f64,
    /// Spatial proximity filter radius for candidate location.
    pub buffer_distance: f64,
    /// Maximum undirected angular deviation in degrees, within `[0, 90]`.
    pub angular_threshold: f64,
    /// Maximum symmetric Hausdorff distance.
    pub hausdorff_threshold: f64,
}

impl Default for MatchParams {
    fn default() -> Self {
        // Production settings for a Danish reference comparison (10 m
        // segments, EPSG:25832); treat as a starting point, not a universal
        // default.
        Self {
            segment_length: 10.0,
            buffer_distance: 15.0,
            angular_threshold: 30.0,
            hausdorff_threshold: 17.0,
        }
    }
}

impl MatchParams {
    /// Reject non-positive or non-finite parameters.
    pub fn validate(&self) -> Result<()> {
        MatchError::check_positive("segment_length", self.segment_length)?;
        MatchError::check_positive("buffer_distance", self.buffer_distance)?;
        MatchError::check_positive("angular_threshold", self.angular_threshold)?;
        MatchError::check_positive("hausdorff_threshold", self.hausdorff_threshold)?;
        Ok(())
    }
}

/// Diagnostic counts for one run, reported so operators can detect mistuned
/// thresholds (near-100% unmatched usually means `buffer_distance` or the
/// similarity thresholds are too tight for the data).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchStats {
    pub osm_segment_count: usize,
    pub reference_segment_count: usize,
    pub osm_skipped_degenerate: u32,
    pub osm_skipped_empty: u32,
    pub reference_skipped_degenerate: u32,
    pub reference_skipped_empty: u32,
    pub candidate_pairs: usize,
    pub osm_matched: usize,
    pub osm_undecided: usize,
    pub osm_unmatched: usize,
    pub reference_matched: usize,
    pub reference_undecided: usize,
    pub reference_unmatched: usize,
}

/// Everything produced by one matching run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchOutcome {
    pub osm_segments: SegmentCollection,
    pub ref_segments: SegmentCollection,
    /// Single source of truth for segment match state.
    pub table: SegmentMatchTable,
    pub osm_edges: EdgeSummary,
    pub ref_edges: EdgeSummary,
    pub stats: MatchStats,
}

// ============================================================================
// Pipeline
// ============================================================================

/// Run the full matching pipeline over a static pair of networks.
///
/// Validates the input contract (unique edge ids, positive parameters),
/// then runs segmentation, candidate location, resolution and edge rollup
/// for both sides. Attribute transfer is a separate call
/// ([`propagate_attribute`]) since it needs a caller-chosen attribute key.
pub fn match_networks(
    osm: &Network,
    reference: &Network,
    params: &MatchParams,
) -> Result<MatchOutcome> {
    params.validate()?;
    osm.validate(NetworkRole::Osm)?;
    reference.validate(NetworkRole::Reference)?;

    let osm_segments = segment_edges(osm, NetworkRole::Osm, params.segment_length)?;
    let ref_segments = segment_edges(reference, NetworkRole::Reference, params.segment_length)?;
    info!(
        "matching {} osm segments against {} reference segments",
        osm_segments.len(),
        ref_segments.len()
    );

    let candidates = find_candidates(&ref_segments, &osm_segments, params.buffer_distance)?;
    let table = resolve(&candidates, &osm_segments, &ref_segments, params)?;

    let osm_edges = summarize(&osm_segments, &table);
    let ref_edges = summarize(&ref_segments, &table);

    let stats = MatchStats {
        osm_segment_count: osm_segments.len(),
        reference_segment_count: ref_segments.len(),
        osm_skipped_degenerate: osm_segments.skipped_degenerate,
        osm_skipped_empty: osm_segments.skipped_empty,
        reference_skipped_degenerate: ref_segments.skipped_degenerate,
        reference_skipped_empty: ref_segments.skipped_empty,
        candidate_pairs: candidates.len(),
        osm_matched: table.count_matched(NetworkRole::Osm),
        osm_undecided: table.count_undecided(NetworkRole::Osm),
        osm_unmatched: table.count_unmatched(NetworkRole::Osm),
        reference_matched: table.count_matched(NetworkRole::Reference),
        reference_undecided: table.count_undecided(NetworkRole::Reference),
        reference_unmatched: table.count_unmatched(NetworkRole::Reference),
    };

    if stats.osm_segment_count > 0 && stats.osm_matched == 0 && stats.osm_undecided == 0 {
        warn!(
            "no osm segment matched anything; buffer_distance or thresholds \
             may be too tight for this data"
        );
    }
    info!(
        "matched {}/{} osm and {}/{} reference segments",
        stats.osm_matched,
        stats.osm_segment_count,
        stats.reference_matched,
        stats.reference_segment_count
    );

    Ok(MatchOutcome {
        osm_segments,
        ref_segments,
        table,
        osm_edges,
        ref_edges,
        stats,
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn straight(id: EdgeId, y: f64, len: f64) -> Edge {
        Edge::new(id, LineString::from(vec![(0.0, y), (len, y)]))
    }

    #[test]
    fn test_network_validation_rejects_duplicate_ids() {
        let net = Network {
            edges: vec![straight(1, 0.0, 50.0), straight(1, 10.0, 50.0)],
        };
        let err = net.validate(NetworkRole::Osm).unwrap_err();
        assert_eq!(
            err,
            MatchError::DuplicateEdgeId {
                role: NetworkRole::Osm,
                edge_id: 1
            }
        );
    }

    #[test]
    fn test_params_validation() {
        assert!(MatchParams::default().validate().is_ok());
        let bad = MatchParams {
            angular_threshold: -5.0,
            ..MatchParams::default()
        };
        assert!(matches!(
            bad.validate().unwrap_err(),
            MatchError::NonPositiveParameter {
                name: "angular_threshold",
                ..
            }
        ));
        let nan = MatchParams {
            buffer_distance: f64::NAN,
            ..MatchParams::default()
        };
        assert!(nan.validate().is_err());
    }

    #[test]
    fn test_pipeline_smoke() {
        let osm = Network {
            edges: vec![straight(1, 0.0, 100.0)],
        };
        let reference = Network {
            edges: vec![straight(7, 1.0, 100.0)],
        };
        let outcome = match_networks(&osm, &reference, &MatchParams::default()).unwrap();
        assert_eq!(outcome.stats.osm_segment_count, 10);
        assert_eq!(outcome.stats.reference_segment_count, 10);
        assert_eq!(outcome.osm_edges.matched_ids(), vec![1]);
        assert_eq!(outcome.ref_edges.matched_ids(), vec![7]);
    }

    #[test]
    fn test_pipeline_rejects_bad_params_before_touching_geometry() {
        let osm = Network {
            edges: vec![straight(1, 0.0, 100.0)],
        };
        let reference = Network { edges: vec![] };
        let params = MatchParams {
            segment_length: 0.0,
            ..MatchParams::default()
        };
        assert!(match_networks(&osm, &reference, &params).is_err());
    }

    #[test]
    fn test_outcome_serializes() {
        let osm = Network {
            edges: vec![straight(1, 0.0, 30.0)],
        };
        let reference = Network {
            edges: vec![straight(2, 1.0, 30.0)],
        };
        let outcome = match_networks(&osm, &reference, &MatchParams::default()).unwrap();
        let json = serde_json::to_string(&outcome).unwrap();
        assert!(json.contains("\"stats\""));
    }
}
