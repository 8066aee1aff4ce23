//! Rolling segment verdicts back up to original edge ids.
//!
//! An edge counts as matched as soon as one of its segments matched; the
//! engine reports edge-level coverage, not fractional coverage. Attribute
//! transfer rides on the same segment-to-segment links to copy categorical
//! values (e.g. a protection classification) between matched counterparts.

use std::collections::HashMap;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::resolve::{MatchStatus, SegmentMatchTable};
use crate::segment::SegmentCollection;
use crate::{EdgeId, Network, SegId};

/// Match verdict for one original (pre-segmentation) edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EdgeStatus {
    /// At least one segment matched.
    Matched,
    /// No matched segment, but at least one undecided segment.
    Undecided,
    /// Every segment unmatched.
    Unmatched,
}

/// Per-edge verdict with the segments that contributed to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeMatchResult {
    pub edge_id: EdgeId,
    pub status: EdgeStatus,
    /// All segments cut from this edge, in position order.
    pub segment_ids: Vec<SegId>,
}

/// Edge-level rollup for one network side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeSummary {
    /// One entry per segmented edge, in edge input order.
    pub results: Vec<EdgeMatchResult>,
}

impl EdgeSummary {
    pub fn matched_ids(&self) -> Vec<EdgeId> {
        self.ids_with(EdgeStatus::Matched)
    }

    pub fn undecided_ids(&self) -> Vec<EdgeId> {
        self.ids_with(EdgeStatus::Undecided)
    }

    pub fn unmatched_ids(&self) -> Vec<EdgeId> {
        self.ids_with(EdgeStatus::Unmatched)
    }

    fn ids_with(&self, status: EdgeStatus) -> Vec<EdgeId> {
        self.results
            .iter()
            .filter(|r| r.status == status)
            .map(|r| r.edge_id)
            .collect()
    }

    pub fn status_of(&self, edge_id: EdgeId) -> Option<EdgeStatus> {
        self.results
            .iter()
            .find(|r| r.edge_id == edge_id)
            .map(|r| r.status)
    }
}

/// Derive per-edge verdicts from a segment match table.
///
/// Pure function of its inputs: rerunning it on the same table yields the
/// same summary.
pub fn summarize(segments: &SegmentCollection, table: &SegmentMatchTable) -> EdgeSummary {
    let statuses = table.statuses(segments.role);
    debug_assert_eq!(statuses.len(), segments.len());

    // Segments arrive in edge order then position order, so grouping by
    // parent preserves edge input order.
    let mut results: Vec<EdgeMatchResult> = Vec::new();
    let mut index_of: HashMap<EdgeId, usize> = HashMap::new();

    for segment in &segments.segments {
        let idx = *index_of.entry(segment.parent_edge_id).or_insert_with(|| {
            results.push(EdgeMatchResult {
                edge_id: segment.parent_edge_id,
                status: EdgeStatus::Unmatched,
                segment_ids: Vec::new(),
            });
            results.len() - 1
        });
        let entry = &mut results[idx];
        entry.segment_ids.push(segment.seg_id);

        match &statuses[segment.seg_id as usize] {
            MatchStatus::Matched { .. } => entry.status = EdgeStatus::Matched,
            MatchStatus::Undecided { .. } if entry.status == EdgeStatus::Unmatched => {
                entry.status = EdgeStatus::Undecided
            }
            _ => {}
        }
    }

    debug!(
        "{} edge rollup: {} matched, {} undecided, {} unmatched",
        segments.role,
        results.iter().filter(|r| r.status == EdgeStatus::Matched).count(),
        results.iter().filter(|r| r.status == EdgeStatus::Undecided).count(),
        results.iter().filter(|r| r.status == EdgeStatus::Unmatched).count(),
    );

    EdgeSummary { results }
}

/// Copy a categorical attribute from matched counterpart edges onto the
/// edges of the `target` side.
///
/// For every target edge, each of its matched segments contributes the
/// `key` value of its counterpart's parent edge in `source_network`. The
/// transferred value is chosen by **majority vote among contributing
/// segments; ties go to the value encountered first in segment position
/// order**. Counterpart edges lacking the attribute contribute nothing, and
/// target edges with no attributed counterpart are absent from the result.
///
/// `source` must be the segment collection for the opposite side of the
/// same run that produced `table`, and `source_network` the network it was
/// cut from.
pub fn propagate_attribute(
    target: &SegmentCollection,
    source: &SegmentCollection,
    source_network: &Network,
    table: &SegmentMatchTable,
    key: &str,
) -> HashMap<EdgeId, String> {
    debug_assert_ne!(target.role, source.role);

    let source_values: HashMap<EdgeId, &str> = source_network
        .edges
        .iter()
        .filter_map(|e| e.attributes.get(key).map(|v| (e.id, v.as_str())))
        .collect();

    // Vote tallies per target edge, insertion-ordered so ties resolve to
    // the first-encountered value.
    let mut votes: HashMap<EdgeId, Vec<(String, u32)>> = HashMap::new();

    let statuses = table.statuses(target.role);
    for segment in &target.segments {
        let Some(partner) = statuses[segment.seg_id as usize].partner() else {
            continue;
        };
        let counterpart_edge = source.get(partner).parent_edge_id;
        let Some(value) = source_values.get(&counterpart_edge) else {
            continue;
        };

        let tally = votes.entry(segment.parent_edge_id).or_default();
        match tally.iter_mut().find(|(v, _)| v == value) {
            Some((_, count)) => *count += 1,
            None => tally.push((value.to_string(), 1)),
        }
    }

    votes
        .into_iter()
        .map(|(edge_id, tally)| {
            let mut best: Option<(&str, u32)> = None;
            for (value, count) in &tally {
                // Strictly greater, so earlier values win ties
                if best.map_or(true, |(_, c)| *count > c) {
                    best = Some((value, *count));
                }
            }
            // tally is never empty: an entry is only created with a vote
            let (value, _) = best.expect("non-empty tally");
            (edge_id, value.to_string())
        })
        .collect()
}
