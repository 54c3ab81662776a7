//! UV spheres, used to mark attraction points.

use crate::mesh::{Mesh, Vertex};
use glam::{Vec2, Vec3};
use std::f32::consts::{PI, TAU};

/// Emits an unindexed UV sphere with outward normals.
///
/// `segments` is clamped to at least 3 and `rings` to at least 2. Tangents
/// follow increasing longitude and bitangents decreasing latitude.
pub fn uv_sphere(center: Vec3, radius: f32, segments: usize, rings: usize) -> Mesh {
    let segments = segments.max(3);
    let rings = rings.max(2);

    let vertex = |ring: usize, seg: usize| {
        let u = seg as f32 / segments as f32;
        let v = ring as f32 / rings as f32;
        let (sin_phi, cos_phi) = (v * PI).sin_cos();
        let (sin_theta, cos_theta) = (u * TAU).sin_cos();
        let normal = Vec3::new(sin_phi * cos_theta, cos_phi, sin_phi * sin_theta);
        let tangent = Vec3::new(-sin_theta, 0.0, cos_theta);
        Vertex {
            position: center + normal * radius,
            normal,
            uv: Vec2::new(u, v),
            tangent,
            bitangent: normal.cross(tangent),
        }
    };

    let mut mesh = Mesh::new();
    for ring in 0..rings {
        for seg in 0..segments {
            let a = vertex(ring, seg);
            let b = vertex(ring, seg + 1);
            let c = vertex(ring + 1, seg);
            let d = vertex(ring + 1, seg + 1);
            // Pole rows collapse to a single triangle each.
            if ring != 0 {
                mesh.push_triangle(a, b, c);
            }
            if ring != rings - 1 {
                mesh.push_triangle(b, d, c);
            }
        }
    }
    mesh
}

/// One small sphere per position.
pub fn attractor_markers(
    positions: impl IntoIterator<Item = Vec3>,
    radius: f32,
    segments: usize,
    rings: usize,
) -> Mesh {
    let mut mesh = Mesh::new();
    for p in positions {
        mesh.extend(&uv_sphere(p, radius, segments, rings));
    }
    mesh
}
