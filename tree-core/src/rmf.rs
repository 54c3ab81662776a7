//! Rotation-minimizing frame transport by double reflection.
//!
//! Re-deriving a normal at every node from cross products lets twist
//! accumulate along a branch. Reflecting the previous frame across the
//! bisecting plane of the step, and then across the plane that maps the
//! reflected tangent onto the new one, carries the normal forward with no
//! rotation about the tangent.

use glam::Vec3;

/// Below this squared length a reflection vector is treated as zero.
const DEGENERATE_SQ: f32 = 1e-12;

/// Transports the normal `r0` of the frame `(x0, t0, r0)` to a new point `x1`
/// whose tangent is `t1`.
///
/// `t0` and `t1` are expected to be unit length. The result is re-projected
/// onto the plane orthogonal to `t1` and normalized so that rounding does not
/// drift over long chains.
pub fn grow_rmf_normal(x0: Vec3, t0: Vec3, r0: Vec3, x1: Vec3, t1: Vec3) -> Vec3 {
    let v1 = x1 - x0;
    let c1 = v1.dot(v1);
    let (r_l, t_l) = if c1 > DEGENERATE_SQ {
        (
            r0 - v1 * (2.0 / c1 * v1.dot(r0)),
            t0 - v1 * (2.0 / c1 * v1.dot(t0)),
        )
    } else {
        (r0, t0)
    };

    let v2 = t1 - t_l;
    let c2 = v2.dot(v2);
    let r1 = if c2 > DEGENERATE_SQ {
        r_l - v2 * (2.0 / c2 * v2.dot(r_l))
    } else {
        r_l
    };

    let projected = r1 - t1 * t1.dot(r1);
    projected
        .try_normalize()
        .unwrap_or_else(|| t1.any_orthonormal_vector())
}

/// Transports an initial frame along a polyline, returning one normal per
/// point. Tangents are taken from the forward differences.
pub fn transport_along(points: &[Vec3], t0: Vec3, r0: Vec3) -> Vec<(Vec3, Vec3)> {
    let mut frames = Vec::with_capacity(points.len());
    let Some(&first) = points.first() else {
        return frames;
    };
    let mut prev = (first, t0, r0);
    frames.push((t0, r0));

    for (i, &x1) in points.iter().enumerate().skip(1) {
        let next = points.get(i + 1).copied().unwrap_or(x1 + (x1 - prev.0));
        let t1 = (next - x1)
            .try_normalize()
            .or_else(|| (x1 - prev.0).try_normalize())
            .unwrap_or(prev.1);
        let r1 = grow_rmf_normal(prev.0, prev.1, prev.2, x1, t1);
        frames.push((t1, r1));
        prev = (x1, t1, r1);
    }
    frames
}
