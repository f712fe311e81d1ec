// Planar geometry over landmark coordinates
//
// All measurements are in the 2D pixel plane; depth is never used.

use nalgebra::Point2;

use crate::models::pose::{BodyLandmark, LandmarkSet};

/// Default visibility threshold for landmark gating
pub const VISIBILITY_THRESHOLD: f64 = 0.5;

/// Default pixel tolerance for alignment tests
pub const ALIGNMENT_THRESHOLD: f64 = 20.0;

/// Angle at `vertex` between the rays to `a` and `c`, in degrees [0, 180].
///
/// Returns 0 when either ray has zero length.
pub fn calculate_angle(a: &Point2<f64>, vertex: &Point2<f64>, c: &Point2<f64>) -> f64 {
    let ray_a = a - vertex;
    let ray_c = c - vertex;

    let magnitude_a = ray_a.norm();
    let magnitude_c = ray_c.norm();
    if magnitude_a == 0.0 || magnitude_c == 0.0 {
        return 0.0;
    }

    // Rounding can push the cosine slightly outside [-1, 1]
    let cos_angle = (ray_a.dot(&ray_c) / (magnitude_a * magnitude_c)).clamp(-1.0, 1.0);
    cos_angle.acos().to_degrees()
}

/// Euclidean distance in the image plane
pub fn calculate_distance(a: &Point2<f64>, b: &Point2<f64>) -> f64 {
    nalgebra::distance(a, b)
}

/// True when the two points share (roughly) the same x coordinate
pub fn vertically_aligned(a: &Point2<f64>, b: &Point2<f64>, threshold: f64) -> bool {
    (b.x - a.x).abs() < threshold
}

/// True when the two points share (roughly) the same y coordinate
pub fn horizontally_aligned(a: &Point2<f64>, b: &Point2<f64>, threshold: f64) -> bool {
    (b.y - a.y).abs() < threshold
}

/// Relative imbalance of the distances from `left` and `right` to `center`.
///
/// 0 is perfectly symmetric, 1 is maximally lopsided. Returns 0 when both
/// distances are zero.
pub fn calculate_symmetry(left: &Point2<f64>, right: &Point2<f64>, center: &Point2<f64>) -> f64 {
    let left_dist = calculate_distance(left, center);
    let right_dist = calculate_distance(right, center);

    let total = left_dist + right_dist;
    if total == 0.0 {
        return 0.0;
    }

    (left_dist - right_dist).abs() / total
}

pub fn midpoint(a: &Point2<f64>, b: &Point2<f64>) -> Point2<f64> {
    nalgebra::center(a, b)
}

/// Visibility gate: every named landmark must be present with visibility at
/// or above `threshold`. An absent set never passes.
pub fn check_visibility(
    landmarks: Option<&LandmarkSet>,
    names: &[BodyLandmark],
    threshold: f64,
) -> bool {
    let Some(landmarks) = landmarks else {
        return false;
    };

    names.iter().all(|name| {
        landmarks
            .get(*name)
            .map(|landmark| landmark.is_visible(threshold))
            .unwrap_or(false)
    })
}
