//! # Planar Geometry Utilities
//!
//! Low-level geometric operations shared by the matching stages.
//!
//! All functions assume coordinates in a shared **projected** CRS, so
//! distances and angles are plain Euclidean math in the unit of that CRS
//! (typically meters). Callers working in geographic coordinates must
//! reproject before building networks.
//!
//! | Function | Description |
//! |----------|-------------|
//! | [`polyline_length`] | Total length of a polyline |
//! | [`cut_linestring`] | Split a polyline into fixed-length pieces |
//! | [`direction`] | Dominant (endpoint) direction of a polyline |
//! | [`angular_deviation_deg`] | Undirected angle between two polylines |
//! | [`linestring_distance`] | Minimum distance between two polylines |

use geo::{Coord, EuclideanDistance, EuclideanLength, LineString};

/// Lengths at or below this are treated as zero (collapsed geometry,
/// duplicate vertices, cut residue).
pub(crate) const LENGTH_EPS: f64 = 1e-9;

/// Total Euclidean length of a polyline.
pub fn polyline_length(line: &LineString<f64>) -> f64 {
    line.euclidean_length()
}

/// Minimum Euclidean distance between two polylines.
///
/// A polyline lies within distance `d` of another iff this value is `<= d`,
/// which is how the candidate locator realizes its buffer-intersects filter
/// without materializing buffer polygons.
pub fn linestring_distance(a: &LineString<f64>, b: &LineString<f64>) -> f64 {
    a.euclidean_distance(b)
}

fn coord_distance(a: Coord<f64>, b: Coord<f64>) -> f64 {
    (b.x - a.x).hypot(b.y - a.y)
}

/// Split a polyline into contiguous pieces of length `step`, walking the
/// original vertices and interpolating a cut point at every `step` of
/// accumulated length. The final piece keeps whatever remainder is left, so
/// the pieces partition the input exactly (no gaps, no overlap).
///
/// Returns an empty vector for degenerate input (fewer than two coordinates
/// or zero total length). `step` must be positive; callers validate.
pub fn cut_linestring(line: &LineString<f64>, step: f64) -> Vec<LineString<f64>> {
    let coords = &line.0;
    if coords.len() < 2 || polyline_length(line) <= LENGTH_EPS {
        return vec![];
    }

    let mut pieces: Vec<LineString<f64>> = Vec::new();
    let mut current: Vec<Coord<f64>> = vec![coords[0]];
    let mut acc = 0.0; // length accumulated in the current piece

    for window in coords.windows(2) {
        let mut from = window[0];
        let to = window[1];
        let mut remaining = coord_distance(from, to);

        // Emit full pieces while this vertex pair crosses cut points.
        while remaining > LENGTH_EPS && acc + remaining >= step {
            let take = step - acc;
            let t = (take / remaining).min(1.0);
            let cut = Coord {
                x: from.x + t * (to.x - from.x),
                y: from.y + t * (to.y - from.y),
            };
            current.push(cut);
            pieces.push(LineString::new(std::mem::replace(&mut current, vec![cut])));
            from = cut;
            remaining -= take;
            acc = 0.0;
        }

        if remaining > LENGTH_EPS {
            current.push(to);
            acc += remaining;
        }
    }

    // Remainder shorter than `step` becomes its own piece; cut residue
    // below the length epsilon is dropped.
    if current.len() >= 2 && acc > LENGTH_EPS {
        pieces.push(LineString::new(current));
    }

    pieces
}

/// Dominant direction of a polyline as a unit vector.
///
/// Uses the chord from first to last coordinate. For closed or collapsed
/// chords, falls back to the longest constituent line so short loop
/// fragments still get a usable orientation. Returns `None` only when no
/// constituent line has positive length.
pub fn direction(line: &LineString<f64>) -> Option<[f64; 2]> {
    let coords = &line.0;
    let first = coords.first()?;
    let last = coords.last()?;

    let (dx, dy) = (last.x - first.x, last.y - first.y);
    let norm = dx.hypot(dy);
    if norm > LENGTH_EPS {
        return Some([dx / norm, dy / norm]);
    }

    // Closed chord: longest constituent line decides.
    let mut best: Option<([f64; 2], f64)> = None;
    for window in coords.windows(2) {
        let (sdx, sdy) = (window[1].x - window[0].x, window[1].y - window[0].y);
        let len = sdx.hypot(sdy);
        if len > LENGTH_EPS && best.map_or(true, |(_, l)| len > l) {
            best = Some(([sdx / len, sdy / len], len));
        }
    }
    best.map(|(v, _)| v)
}

/// Undirected angular deviation between two polylines, in degrees.
///
/// Compares dominant direction vectors with the sign folded out, so the
/// result is normalized into `[0, 90]` (a line and its reverse deviate by
/// 0°). Polylines without a usable direction deviate maximally (90°).
pub fn angular_deviation_deg(a: &LineString<f64>, b: &LineString<f64>) -> f64 {
    match (direction(a), direction(b)) {
        (Some(u), Some(v)) => {
            let cos = (u[0] * v[0] + u[1] * v[1]).abs().clamp(0.0, 1.0);
            cos.acos().to_degrees()
        }
        _ => 90.0,
    }
}
