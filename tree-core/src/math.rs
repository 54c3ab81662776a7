//! Small helpers on top of `glam` for spline evaluation and local frames.
//!
//! A frame is a `(tangent, normal)` pair; the binormal is never stored and
//! is always derived as `tangent × normal`.

use glam::{Mat3, Mat4, Vec3};

/// Derives the binormal of a frame.
#[inline]
pub fn binormal(tangent: Vec3, normal: Vec3) -> Vec3 {
    tangent.cross(normal)
}

/// Re-orthonormalizes `normal` against `tangent` (Gram-Schmidt).
///
/// Returns `None` when the inputs are (near) parallel or zero.
pub fn orthonormalize(tangent: Vec3, normal: Vec3) -> Option<(Vec3, Vec3)> {
    let t = tangent.try_normalize()?;
    let n = (normal - t * t.dot(normal)).try_normalize()?;
    Some((t, n))
}

/// Builds `translate(position) * basis * scale(scale)` where the basis maps
/// local `X` to the binormal, `Y` to the tangent and `Z` to the normal.
///
/// Geometry authored growing up `+Y` therefore follows the frame.
pub fn frame_matrix(position: Vec3, tangent: Vec3, normal: Vec3, scale: Vec3) -> Mat4 {
    let basis = Mat3::from_cols(binormal(tangent, normal), tangent, normal);
    Mat4::from_translation(position) * Mat4::from_mat3(basis) * Mat4::from_scale(scale)
}

/// Uniform Catmull-Rom interpolation between `p1` and `p2`.
pub fn catmull_rom(p0: Vec3, p1: Vec3, p2: Vec3, p3: Vec3, t: f32) -> Vec3 {
    let t2 = t * t;
    let t3 = t2 * t;
    0.5 * ((2.0 * p1)
        + (p2 - p0) * t
        + (2.0 * p0 - 5.0 * p1 + 4.0 * p2 - p3) * t2
        + (3.0 * p1 - p0 - 3.0 * p2 + p3) * t3)
}

/// Evaluates a Catmull-Rom spline through `points` at `t` in `[0, 1]`.
///
/// The end points are duplicated so the curve passes through every input.
pub fn catmull_rom_chain(points: &[Vec3], t: f32) -> Option<Vec3> {
    match points.len() {
        0 => None,
        1 => Some(points[0]),
        n => {
            let segments = (n - 1) as f32;
            let scaled = t.clamp(0.0, 1.0) * segments;
            let i = (scaled.floor() as usize).min(n - 2);
            let local = scaled - i as f32;
            let p0 = points[i.saturating_sub(1)];
            let p1 = points[i];
            let p2 = points[i + 1];
            let p3 = points[(i + 2).min(n - 1)];
            Some(catmull_rom(p0, p1, p2, p3, local))
        }
    }
}
