//! Shape-similarity filtering and many-to-many resolution.
//!
//! Candidate pairs are scored on two independent criteria: undirected
//! angular deviation and symmetric Hausdorff distance. A pair failing
//! either threshold is rejected outright; there is no weighted combination.
//!
//! Accepted candidates then collapse into a per-segment verdict: a pair is
//! matched only when both sides decisively prefer each other. Genuine
//! ambiguity (parallel carriageways, duplicated reference lines scoring
//! identically) is never forced into a pick: it comes out `Undecided`, a
//! first-class status downstream consumers must handle.

use geo::HausdorffDistance;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::candidates::CandidatePair;
use crate::error::{MatchError, Result};
use crate::geo_utils::angular_deviation_deg;
use crate::segment::SegmentCollection;
use crate::{MatchParams, NetworkRole, SegId};

/// Similarity scores for one candidate pair and the accept/reject verdict
/// they produced.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchDecision {
    pub pair: CandidatePair,
    /// Undirected angular deviation in degrees, in `[0, 90]`.
    pub angle_deg: f64,
    /// Symmetric Hausdorff distance in CRS units.
    pub hausdorff: f64,
    pub accepted: bool,
}

/// Resolved state of one segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchStatus {
    /// Decisive mutual best partner on the other side.
    Matched { partner: SegId },
    /// No accepted candidate (possibly no candidate at all).
    Unmatched,
    /// Accepted candidates exist but none resolves: the top scores tie
    /// exactly, the best partner prefers someone else, or the partner is
    /// itself contested. Candidates are listed best-first.
    Undecided { candidates: Vec<SegId> },
}

impl MatchStatus {
    pub fn is_matched(&self) -> bool {
        matches!(self, MatchStatus::Matched { .. })
    }

    pub fn is_undecided(&self) -> bool {
        matches!(self, MatchStatus::Undecided { .. })
    }

    /// The matched partner, if resolved.
    pub fn partner(&self) -> Option<SegId> {
        match self {
            MatchStatus::Matched { partner } => Some(*partner),
            _ => None,
        }
    }
}

/// Per-segment match state for both sides, indexed by seg id.
///
/// Built once by [`resolve`] and immutable afterwards; this is the single
/// source of truth for match state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentMatchTable {
    osm: Vec<MatchStatus>,
    reference: Vec<MatchStatus>,
}

impl SegmentMatchTable {
    pub fn osm_status(&self, seg_id: SegId) -> &MatchStatus {
        &self.osm[seg_id as usize]
    }

    pub fn reference_status(&self, seg_id: SegId) -> &MatchStatus {
        &self.reference[seg_id as usize]
    }

    /// All statuses for one side, indexed by seg id.
    pub fn statuses(&self, role: NetworkRole) -> &[MatchStatus] {
        match role {
            NetworkRole::Osm => &self.osm,
            NetworkRole::Reference => &self.reference,
        }
    }

    pub fn count_matched(&self, role: NetworkRole) -> usize {
        self.statuses(role).iter().filter(|s| s.is_matched()).count()
    }

    pub fn count_undecided(&self, role: NetworkRole) -> usize {
        self.statuses(role).iter().filter(|s| s.is_undecided()).count()
    }

    pub fn count_unmatched(&self, role: NetworkRole) -> usize {
        self.statuses(role)
            .iter()
            .filter(|s| matches!(s, MatchStatus::Unmatched))
            .count()
    }
}

/// Score one candidate pair against the thresholds.
///
/// Both criteria are hard gates: angular deviation must stay within
/// `angular_threshold` AND Hausdorff distance within `hausdorff_threshold`.
/// Segments must have non-empty geometry; [`resolve`] enforces that before
/// scoring.
pub fn score_pair(
    pair: CandidatePair,
    osm: &SegmentCollection,
    reference: &SegmentCollection,
    params: &MatchParams,
) -> MatchDecision {
    let osm_geom = &osm.get(pair.osm_seg).geometry;
    let ref_geom = &reference.get(pair.ref_seg).geometry;

    let angle_deg = angular_deviation_deg(osm_geom, ref_geom);
    let hausdorff = osm_geom.hausdorff_distance(ref_geom);
    let accepted =
        angle_deg <= params.angular_threshold && hausdorff <= params.hausdorff_threshold;

    MatchDecision {
        pair,
        angle_deg,
        hausdorff,
        accepted,
    }
}

/// An accepted partner with the scores that ranked it.
#[derive(Debug, Clone, Copy)]
struct ScoredPartner {
    partner: SegId,
    hausdorff: f64,
    angle_deg: f64,
}

/// Best-first ordering: lowest Hausdorff distance, then lowest angular
/// deviation, then lowest partner id. The id tail keeps resolution
/// deterministic when scores tie exactly.
fn partner_order(a: &ScoredPartner, b: &ScoredPartner) -> std::cmp::Ordering {
    a.hausdorff
        .total_cmp(&b.hausdorff)
        .then(a.angle_deg.total_cmp(&b.angle_deg))
        .then(a.partner.cmp(&b.partner))
}

/// A best pick is decisive only when it beats the runner-up on the scores
/// themselves; an exact score tie (duplicate parallel lines) is genuine
/// geometric ambiguity and must not be settled by id.
fn has_decisive_best(partners: &[ScoredPartner]) -> bool {
    match partners {
        [] => false,
        [_] => true,
        [first, second, ..] => {
            first.hausdorff.total_cmp(&second.hausdorff).is_lt()
                || (first.hausdorff.total_cmp(&second.hausdorff).is_eq()
                    && first.angle_deg.total_cmp(&second.angle_deg).is_lt())
        }
    }
}

/// Resolve one segment given both sides' accepted-partner lists (sorted
/// best-first). Matched iff this segment and its best partner decisively
/// pick each other; the condition is symmetric, so matched statuses always
/// come in mutual pairs.
fn status_from_partners(
    seg_id: SegId,
    own: &[ScoredPartner],
    other_side: &[Vec<ScoredPartner>],
) -> MatchStatus {
    let Some(best) = own.first() else {
        return MatchStatus::Unmatched;
    };
    let partner_list = &other_side[best.partner as usize];
    let reciprocated = partner_list.first().map(|p| p.partner) == Some(seg_id);
    if has_decisive_best(own) && reciprocated && has_decisive_best(partner_list) {
        MatchStatus::Matched {
            partner: best.partner,
        }
    } else {
        MatchStatus::Undecided {
            candidates: own.iter().map(|p| p.partner).collect(),
        }
    }
}

/// Resolve candidate pairs into the definitive [`SegmentMatchTable`].
///
/// Fails fast on empty segment geometry (the segmenter excludes those, so
/// one reaching this point is a contract violation). A run where every
/// threshold fails is a valid result: every segment simply comes out
/// `Unmatched`.
pub fn resolve(
    candidates: &[CandidatePair],
    osm: &SegmentCollection,
    reference: &SegmentCollection,
    params: &MatchParams,
) -> Result<SegmentMatchTable> {
    params.validate()?;
    for collection in [osm, reference] {
        for segment in &collection.segments {
            if segment.geometry.0.is_empty() {
                return Err(MatchError::EmptyGeometry {
                    role: collection.role,
                    seg_id: segment.seg_id,
                });
            }
        }
    }

    // Pairwise scoring has no cross-pair dependency; parallelize it.
    #[cfg(feature = "parallel")]
    let decisions: Vec<MatchDecision> = {
        use rayon::prelude::*;
        candidates
            .par_iter()
            .map(|&pair| score_pair(pair, osm, reference, params))
            .collect()
    };

    #[cfg(not(feature = "parallel"))]
    let decisions: Vec<MatchDecision> = candidates
        .iter()
        .map(|&pair| score_pair(pair, osm, reference, params))
        .collect();

    let accepted = decisions.iter().filter(|d| d.accepted).count();
    debug!(
        "scored {} candidate pairs, accepted {accepted} (angle <= {}, hausdorff <= {})",
        decisions.len(),
        params.angular_threshold,
        params.hausdorff_threshold
    );

    // Accepted-partner adjacency per side, then a deterministic sequential
    // pass over it. Candidate input is sorted, so adjacency order is too.
    let mut osm_partners: Vec<Vec<ScoredPartner>> = vec![Vec::new(); osm.len()];
    let mut ref_partners: Vec<Vec<ScoredPartner>> = vec![Vec::new(); reference.len()];
    for d in decisions.iter().filter(|d| d.accepted) {
        osm_partners[d.pair.osm_seg as usize].push(ScoredPartner {
            partner: d.pair.ref_seg,
            hausdorff: d.hausdorff,
            angle_deg: d.angle_deg,
        });
        ref_partners[d.pair.ref_seg as usize].push(ScoredPartner {
            partner: d.pair.osm_seg,
            hausdorff: d.hausdorff,
            angle_deg: d.angle_deg,
        });
    }
    for partners in osm_partners.iter_mut().chain(ref_partners.iter_mut()) {
        partners.sort_unstable_by(partner_order);
    }

    let osm_statuses: Vec<MatchStatus> = osm_partners
        .iter()
        .enumerate()
        .map(|(i, own)| status_from_partners(i as SegId, own, &ref_partners))
        .collect();
    let ref_statuses: Vec<MatchStatus> = ref_partners
        .iter()
        .enumerate()
        .map(|(i, own)| status_from_partners(i as SegId, own, &osm_partners))
        .collect();

    let table = SegmentMatchTable {
        osm: osm_statuses,
        reference: ref_statuses,
    };
    info!(
        "resolved segment matches: osm {}/{}/{} matched/undecided/unmatched, reference {}/{}/{}",
        table.count_matched(NetworkRole::Osm),
        table.count_undecided(NetworkRole::Osm),
        table.count_unmatched(NetworkRole::Osm),
        table.count_matched(NetworkRole::Reference),
        table.count_undecided(NetworkRole::Reference),
        table.count_unmatched(NetworkRole::Reference),
    );
    Ok(table)
}
