//! Spatial candidate location between the two segment sets.
//!
//! For each reference segment, every osm segment lying within
//! `buffer_distance` of it becomes a candidate pair. Proximity alone says
//! nothing about shape similarity; the resolver filters and disambiguates.
//!
//! The lookup runs through an R-tree over osm segment bounding boxes
//! (envelopes expanded by the buffer, then an exact distance check) instead
//! of a cross product. The index is an implementation detail of this module
//! and can be swapped for another spatial structure without touching the
//! pair contract.

use geo::BoundingRect;
use log::debug;
use rstar::{RTree, RTreeObject, AABB};
use serde::{Deserialize, Serialize};

use crate::error::{MatchError, Result};
use crate::geo_utils::linestring_distance;
use crate::segment::{Segment, SegmentCollection};
use crate::SegId;

/// A spatially proximate (osm, reference) segment pair, produced because the
/// two geometries lie within the buffer distance of each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CandidatePair {
    pub osm_seg: SegId,
    pub ref_seg: SegId,
}

/// Segment bounding box wrapper for R-tree indexing.
#[derive(Debug, Clone)]
struct SegmentBounds {
    seg_id: SegId,
    min_x: f64,
    min_y: f64,
    max_x: f64,
    max_y: f64,
}

impl RTreeObject for SegmentBounds {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners([self.min_x, self.min_y], [self.max_x, self.max_y])
    }
}

fn bounds_of(segment: &Segment) -> Option<SegmentBounds> {
    let rect = segment.geometry.bounding_rect()?;
    Some(SegmentBounds {
        seg_id: segment.seg_id,
        min_x: rect.min().x,
        min_y: rect.min().y,
        max_x: rect.max().x,
        max_y: rect.max().y,
    })
}

/// Find all candidate pairs between the reference and osm segment sets.
///
/// A reference segment with no osm segment in range simply contributes no
/// pairs (isolated feature, not an error). Output is sorted by
/// `(osm_seg, ref_seg)` so downstream stages never depend on index
/// traversal order.
pub fn find_candidates(
    reference: &SegmentCollection,
    osm: &SegmentCollection,
    buffer_distance: f64,
) -> Result<Vec<CandidatePair>> {
    MatchError::check_positive("buffer_distance", buffer_distance)?;

    let bounds: Vec<SegmentBounds> = osm.segments.iter().filter_map(bounds_of).collect();
    let tree = RTree::bulk_load(bounds);

    let mut pairs: Vec<CandidatePair> = Vec::new();
    for ref_seg in &reference.segments {
        let Some(rect) = ref_seg.geometry.bounding_rect() else {
            continue;
        };
        let envelope = AABB::from_corners(
            [rect.min().x - buffer_distance, rect.min().y - buffer_distance],
            [rect.max().x + buffer_distance, rect.max().y + buffer_distance],
        );

        for candidate in tree.locate_in_envelope_intersecting(&envelope) {
            let osm_geom = &osm.get(candidate.seg_id).geometry;
            // Envelope hit is only a coarse filter; the buffer contract is
            // exact segment-to-segment distance.
            if linestring_distance(&ref_seg.geometry, osm_geom) <= buffer_distance {
                pairs.push(CandidatePair {
                    osm_seg: candidate.seg_id,
                    ref_seg: ref_seg.seg_id,
                });
            }
        }
    }

    pairs.sort_unstable();
    debug!(
        "located {} candidate pairs ({} reference x {} osm segments, buffer {buffer_distance})",
        pairs.len(),
        reference.len(),
        osm.len()
    );
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::segment_edges;
    use crate::{Edge, Network, NetworkRole};
    use geo::LineString;

    fn collection(role: NetworkRole, lines: &[Vec<(f64, f64)>]) -> SegmentCollection {
        let edges = lines
            .iter()
            .enumerate()
            .map(|(i, coords)| Edge::new(i as u64, LineString::from(coords.clone())))
            .collect();
        segment_edges(&Network { edges }, role, 10.0).unwrap()
    }

    #[test]
    fn test_overlapping_segments_are_candidates() {
        let osm = collection(NetworkRole::Osm, &[vec![(0.0, 0.0), (10.0, 0.0)]]);
        let reference = collection(NetworkRole::Reference, &[vec![(0.0, 2.0), (10.0, 2.0)]]);
        let pairs = find_candidates(&reference, &osm, 15.0).unwrap();
        assert_eq!(
            pairs,
            vec![CandidatePair {
                osm_seg: 0,
                ref_seg: 0
            }]
        );
    }

    #[test]
    fn test_far_segments_are_not_candidates() {
        let osm = collection(NetworkRole::Osm, &[vec![(0.0, 0.0), (10.0, 0.0)]]);
        let reference = collection(NetworkRole::Reference, &[vec![(0.0, 20.0), (10.0, 20.0)]]);
        let pairs = find_candidates(&reference, &osm, 15.0).unwrap();
        assert!(pairs.is_empty());
    }

    #[test]
    fn test_envelope_hit_but_outside_buffer_rejected() {
        // Diagonal neighbor: bounding boxes expanded by the buffer overlap,
        // but true corner-to-corner distance exceeds it.
        let osm = collection(NetworkRole::Osm, &[vec![(0.0, 0.0), (10.0, 0.0)]]);
        let reference = collection(
            NetworkRole::Reference,
            &[vec![(21.0, 12.0), (31.0, 12.0)]],
        );
        let pairs = find_candidates(&reference, &osm, 15.0).unwrap();
        assert!(pairs.is_empty());
    }

    #[test]
    fn test_multiple_candidates_per_segment() {
        // Two parallel osm lines both within range of one reference line
        let osm = collection(
            NetworkRole::Osm,
            &[
                vec![(0.0, 0.0), (10.0, 0.0)],
                vec![(0.0, 8.0), (10.0, 8.0)],
            ],
        );
        let reference = collection(NetworkRole::Reference, &[vec![(0.0, 4.0), (10.0, 4.0)]]);
        let pairs = find_candidates(&reference, &osm, 15.0).unwrap();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].osm_seg, 0);
        assert_eq!(pairs[1].osm_seg, 1);
    }

    #[test]
    fn test_output_sorted_and_deterministic() {
        let lines: Vec<Vec<(f64, f64)>> = (0..6)
            .map(|i| vec![(0.0, i as f64 * 3.0), (10.0, i as f64 * 3.0)])
            .collect();
        let osm = collection(NetworkRole::Osm, &lines);
        let reference = collection(NetworkRole::Reference, &lines);
        let a = find_candidates(&reference, &osm, 5.0).unwrap();
        let b = find_candidates(&reference, &osm, 5.0).unwrap();
        assert_eq!(a, b);
        let mut sorted = a.clone();
        sorted.sort_unstable();
        assert_eq!(a, sorted);
    }

    #[test]
    fn test_non_positive_buffer_rejected() {
        let osm = collection(NetworkRole::Osm, &[vec![(0.0, 0.0), (10.0, 0.0)]]);
        let reference = collection(NetworkRole::Reference, &[vec![(0.0, 0.0), (10.0, 0.0)]]);
        let err = find_candidates(&reference, &osm, -1.0).unwrap_err();
        assert!(matches!(
            err,
            MatchError::NonPositiveParameter {
                name: "buffer_distance",
                ..
            }
        ));
    }
}
