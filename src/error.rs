//! Unified error handling for network matching.
//!
//! Input contract violations (duplicate ids, non-positive parameters, empty
//! geometry reaching the resolver) are fatal and fail the run. Degenerate
//! geometry at segmentation time is recovered and counted instead, and
//! ambiguous or isolated segments are reported through match statuses, not
//! errors.

use crate::{EdgeId, NetworkRole, SegId};

/// Errors produced by the matching pipeline.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MatchError {
    /// An edge id appears more than once within the same network.
    #[error("duplicate edge id {edge_id} in {role} network")]
    DuplicateEdgeId { role: NetworkRole, edge_id: EdgeId },

    /// A tuning parameter is zero, negative, or not finite.
    #[error("parameter `{name}` must be a positive finite value, got {value}")]
    NonPositiveParameter { name: &'static str, value: f64 },

    /// A segment with empty geometry reached the resolver. The segmenter
    /// excludes these, so this indicates a caller-constructed collection
    /// that violates the segment contract.
    #[error("segment {seg_id} in {role} collection has empty geometry")]
    EmptyGeometry { role: NetworkRole, seg_id: SegId },
}

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, MatchError>;

impl MatchError {
    /// Validate a tuning parameter, naming it in the error on failure.
    pub(crate) fn check_positive(name: &'static str, value: f64) -> Result<()> {
        if value.is_finite() && value > 0.0 {
            Ok(())
        } else {
            Err(MatchError::NonPositiveParameter { name, value })
        }
    }
}
