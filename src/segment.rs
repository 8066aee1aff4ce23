//! Segmentation of network edges into fixed-length matching units.
//!
//! Matching operates on short segments rather than whole edges: two datasets
//! rarely break the same street into the same polylines, but their 10 m
//! pieces line up well. Each segment keeps a non-owning back-reference to
//! its parent edge so verdicts can be rolled back up after resolution.

use geo::LineString;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::{MatchError, Result};
use crate::geo_utils::{cut_linestring, polyline_length, LENGTH_EPS};
use crate::{EdgeId, Network, NetworkRole, SegId};

/// A fixed-length (or shorter remainder) piece of one edge's geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Unique within the owning [`SegmentCollection`]; equals the segment's
    /// index in it.
    pub seg_id: SegId,
    /// Id of the edge this segment was cut from (lookup only, not ownership).
    pub parent_edge_id: EdgeId,
    /// 0-based position along the parent edge.
    pub position: u32,
    /// Contiguous sub-portion of the parent edge's geometry.
    pub geometry: LineString<f64>,
}

/// All segments produced from one network in one run, plus the diagnostic
/// counts of what segmentation had to skip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentCollection {
    pub role: NetworkRole,
    /// Invariant: `segments[i].seg_id == i`.
    pub segments: Vec<Segment>,
    /// Edges with usable geometry but zero length (or a single coordinate).
    pub skipped_degenerate: u32,
    /// Edges whose geometry was empty (upstream fault, recovered here).
    pub skipped_empty: u32,
}

impl SegmentCollection {
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Look up a segment by id. Panics on an id not issued for this
    /// collection; candidate pairs and match tables only carry issued ids.
    pub fn get(&self, seg_id: SegId) -> &Segment {
        &self.segments[seg_id as usize]
    }
}

/// Split every edge of `network` into segments of `target_length`, assigning
/// seg ids sequentially in edge input order, then in-edge position order.
/// The last segment of an edge keeps the remainder and may be shorter.
///
/// Degenerate and empty-geometry edges are excluded and counted on the
/// returned collection; they never abort the run.
pub fn segment_edges(
    network: &Network,
    role: NetworkRole,
    target_length: f64,
) -> Result<SegmentCollection> {
    MatchError::check_positive("target_length", target_length)?;

    let mut segments: Vec<Segment> = Vec::new();
    let mut skipped_degenerate = 0u32;
    let mut skipped_empty = 0u32;

    for edge in &network.edges {
        if edge.geometry.0.is_empty() {
            skipped_empty += 1;
            continue;
        }
        if edge.geometry.0.len() < 2 || polyline_length(&edge.geometry) <= LENGTH_EPS {
            skipped_degenerate += 1;
            continue;
        }

        let pieces = cut_linestring(&edge.geometry, target_length);
        if pieces.is_empty() {
            skipped_degenerate += 1;
            continue;
        }

        for (position, geometry) in pieces.into_iter().enumerate() {
            segments.push(Segment {
                seg_id: segments.len() as SegId,
                parent_edge_id: edge.id,
                position: position as u32,
                geometry,
            });
        }
    }

    if skipped_degenerate > 0 || skipped_empty > 0 {
        warn!(
            "{role} segmentation skipped {skipped_degenerate} degenerate and {skipped_empty} empty edges"
        );
    }
    debug!(
        "segmented {} {role} edges into {} segments of <= {target_length}",
        network.edges.len(),
        segments.len()
    );

    Ok(SegmentCollection {
        role,
        segments,
        skipped_degenerate,
        skipped_empty,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Edge;

    fn network(edges: Vec<Edge>) -> Network {
        Network { edges }
    }

    fn straight_edge(id: EdgeId, length: f64) -> Edge {
        Edge::new(id, LineString::from(vec![(0.0, 0.0), (length, 0.0)]))
    }

    #[test]
    fn test_segment_count_and_remainder() {
        let net = network(vec![straight_edge(7, 25.0)]);
        let col = segment_edges(&net, NetworkRole::Osm, 10.0).unwrap();
        assert_eq!(col.len(), 3);
        assert!(col.segments.iter().all(|s| s.parent_edge_id == 7));
        assert_eq!(
            col.segments.iter().map(|s| s.position).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        // Remainder is never dropped or merged
        assert!((polyline_length(&col.segments[2].geometry) - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_seg_ids_are_indices_across_edges() {
        let net = network(vec![straight_edge(1, 20.0), straight_edge(2, 15.0)]);
        let col = segment_edges(&net, NetworkRole::Reference, 10.0).unwrap();
        for (i, seg) in col.segments.iter().enumerate() {
            assert_eq!(seg.seg_id, i as SegId);
        }
        assert_eq!(col.len(), 4);
        assert_eq!(col.segments[2].parent_edge_id, 2);
        assert_eq!(col.segments[2].position, 0);
    }

    #[test]
    fn test_coverage_lengths_sum_to_edge_length() {
        let edge = Edge::new(
            3,
            LineString::from(vec![(0.0, 0.0), (12.5, 8.0), (30.0, -4.0), (47.3, 1.0)]),
        );
        let total = polyline_length(&edge.geometry);
        let col = segment_edges(&network(vec![edge]), NetworkRole::Osm, 7.0).unwrap();
        let sum: f64 = col
            .segments
            .iter()
            .map(|s| polyline_length(&s.geometry))
            .sum();
        assert!((sum - total).abs() < 1e-9);
    }

    #[test]
    fn test_degenerate_edges_skipped_and_counted() {
        let net = network(vec![
            straight_edge(1, 20.0),
            Edge::new(2, LineString::from(vec![(5.0, 5.0), (5.0, 5.0)])),
            Edge::new(3, LineString::new(vec![])),
        ]);
        let col = segment_edges(&net, NetworkRole::Osm, 10.0).unwrap();
        assert_eq!(col.len(), 2);
        assert_eq!(col.skipped_degenerate, 1);
        assert_eq!(col.skipped_empty, 1);
    }

    #[test]
    fn test_non_positive_target_length_rejected() {
        let net = network(vec![straight_edge(1, 20.0)]);
        let err = segment_edges(&net, NetworkRole::Osm, 0.0).unwrap_err();
        assert!(matches!(
            err,
            MatchError::NonPositiveParameter {
                name: "target_length",
                ..
            }
        ));
    }

    #[test]
    fn test_deterministic_for_identical_input() {
        let net = network(vec![straight_edge(1, 33.0), straight_edge(2, 21.0)]);
        let a = segment_edges(&net, NetworkRole::Osm, 10.0).unwrap();
        let b = segment_edges(&net, NetworkRole::Osm, 10.0).unwrap();
        assert_eq!(a, b);
    }
}
