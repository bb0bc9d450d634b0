//! Face alignment via 4-DOF similarity transform.
//!
//! Maps the five detected landmarks onto the canonical InsightFace
//! 112×112 positions with a least-squares similarity estimate, then
//! warps the frame with `imageproc`.

use image::{Rgb, RgbImage};
use imageproc::geometric_transformations::{warp_into, Interpolation, Projection};

/// ArcFace reference landmarks for a 112×112 output.
const REFERENCE_LANDMARKS_112: [(f32, f32); 5] = [
    (38.2946, 51.6963), // left eye
    (73.5318, 51.5014), // right eye
    (56.0252, 71.7366), // nose
    (41.5493, 92.3655), // left mouth
    (70.7299, 92.2041), // right mouth
];

pub const ALIGNED_SIZE: u32 = 112;

/// Warp a face out of `frame` into a canonical 112×112 crop.
///
/// Returns `None` when the landmark geometry is degenerate (all points
/// coincident) and no similarity transform exists; callers fall back to
/// a plain crop.
pub fn align_face(frame: &RgbImage, landmarks: &[(f32, f32); 5]) -> Option<RgbImage> {
    let m = estimate_similarity(landmarks, &REFERENCE_LANDMARKS_112)?;

    // Row-major 3x3: frame coordinates → aligned coordinates.
    let projection = Projection::from_matrix([
        m[0], m[1], m[2],
        m[3], m[4], m[5],
        0.0, 0.0, 1.0,
    ])?;

    let mut aligned = RgbImage::new(ALIGNED_SIZE, ALIGNED_SIZE);
    warp_into(frame, &projection, Interpolation::Bilinear, Rgb([0, 0, 0]), &mut aligned);
    Some(aligned)
}

/// Least-squares similarity transform (scale, rotation, translation)
/// from `src` points to `dst` points.
///
/// Uses the centered closed form: with both point sets shifted to their
/// centroids the rotation/scale part decouples from the translation,
/// which keeps the estimate well-conditioned in f32.
///
/// Returns `[a, -b, tx, b, a, ty]` for the matrix
/// ```text
/// | a  -b  tx |
/// | b   a  ty |
/// ```
fn estimate_similarity(src: &[(f32, f32); 5], dst: &[(f32, f32); 5]) -> Option<[f32; 6]> {
    let n = src.len() as f32;
    let (smx, smy) = centroid(src);
    let (dmx, dmy) = centroid(dst);

    // a = Σ⟨s', d'⟩ / Σ|s'|², b = Σ(s' × d') / Σ|s'|² over centered points.
    let mut dot = 0.0f32;
    let mut cross = 0.0f32;
    let mut src_norm = 0.0f32;

    for ((sx, sy), (dx, dy)) in src.iter().zip(dst.iter()) {
        let (sx, sy) = (sx - smx, sy - smy);
        let (dx, dy) = (dx - dmx, dy - dmy);
        dot += sx * dx + sy * dy;
        cross += sx * dy - sy * dx;
        src_norm += sx * sx + sy * sy;
    }

    if src_norm < n * 1e-6 {
        return None;
    }

    let a = dot / src_norm;
    let b = cross / src_norm;
    let tx = dmx - (a * smx - b * smy);
    let ty = dmy - (b * smx + a * smy);

    Some([a, -b, tx, b, a, ty])
}

fn centroid(points: &[(f32, f32); 5]) -> (f32, f32) {
    let n = points.len() as f32;
    let (sx, sy) = points
        .iter()
        .fold((0.0f32, 0.0f32), |(ax, ay), (x, y)| (ax + x, ay + y));
    (sx / n, sy / n)
}
