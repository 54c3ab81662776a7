//! Tube meshing of a grown tree.
//!
//! Every node gets a ring of `circle_res` points in the plane spanned by its
//! binormal and normal. Each parent/child edge is stitched into a tube of
//! `2 * circle_res` triangles and every tip is closed with a fan. Triangles
//! carry their own vertex copies; [`IndexedMesh::weld`] merges them.

mod weld;

pub use weld::{IndexFormat, IndexedMesh, Indices};

use crate::{
    config::validate_circle_res, error::TreeError, math, tree::Tree, tree::TreeNode,
};
use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};
use std::f32::consts::TAU;

/// One triangle corner.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub uv: Vec2,
    pub tangent: Vec3,
    pub bitangent: Vec3,
}

/// Flat per-attribute arrays for upload.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VertexArrays {
    pub positions: Vec<f32>,
    pub normals: Vec<f32>,
    pub uvs: Vec<f32>,
    pub tangents: Vec<f32>,
    pub bitangents: Vec<f32>,
}

impl VertexArrays {
    pub(crate) fn from_vertices(vertices: &[Vertex]) -> Self {
        let n = vertices.len();
        let mut out = Self {
            positions: Vec::with_capacity(n * 3),
            normals: Vec::with_capacity(n * 3),
            uvs: Vec::with_capacity(n * 2),
            tangents: Vec::with_capacity(n * 3),
            bitangents: Vec::with_capacity(n * 3),
        };
        for v in vertices {
            out.positions.extend_from_slice(&v.position.to_array());
            out.normals.extend_from_slice(&v.normal.to_array());
            out.uvs.extend_from_slice(&v.uv.to_array());
            out.tangents.extend_from_slice(&v.tangent.to_array());
            out.bitangents.extend_from_slice(&v.bitangent.to_array());
        }
        out
    }
}

/// Texture `u` for ring index `t` of an `n`-point ring.
///
/// Folds `0 → 1 → 0` around the ring so a tiling texture meets itself
/// without a seam.
pub fn ring_u(t: usize, n: usize) -> f32 {
    let half = n / 2;
    if half == 0 {
        return 0.0;
    }
    if t < half {
        t as f32 / half as f32
    } else if t == half {
        1.0
    } else {
        n.saturating_sub(t) as f32 / half as f32
    }
}

/// Cross-section of a branch at one node.
#[derive(Clone, Debug, PartialEq)]
pub struct Ring {
    pub center: Vec3,
    pub points: Vec<Vec3>,
    pub tangent: Vec3,
    pub normal: Vec3,
    pub binormal: Vec3,
    /// Texture `v` shared by every point of the ring.
    pub v: f32,
}

impl Ring {
    /// Places `res` points at `radius` around `center`:
    /// `center + binormal * cos(a) * radius + normal * sin(a) * radius`.
    pub fn around(center: Vec3, tangent: Vec3, normal: Vec3, radius: f32, v: f32, res: usize) -> Self {
        let binormal = math::binormal(tangent, normal);
        let step = TAU / res as f32;
        let points = (0..res)
            .map(|j| {
                let (sin, cos) = (j as f32 * step).sin_cos();
                center + binormal * cos * radius + normal * sin * radius
            })
            .collect();

        Self {
            center,
            points,
            tangent,
            normal,
            binormal,
            v,
        }
    }

    pub fn for_node(node: &TreeNode, res: usize) -> Self {
        Self::around(node.pos, node.tangent, node.normal, node.width, node.depth, res)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    fn corner(&self, i: usize) -> Vertex {
        let position = self.points[i];
        Vertex {
            position,
            normal: (position - self.center).normalize_or_zero(),
            uv: Vec2::new(ring_u(i, self.len()), self.v),
            tangent: self.tangent,
            bitangent: self.binormal,
        }
    }
}

/// Unindexed triangle list.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
}

impl Mesh {
    pub fn new() -> Self {
        Self::default()
    }

    /// Meshes `tree` at its configured circle resolution.
    pub fn from_tree(tree: &Tree) -> Self {
        let mut mesh = Self::new();
        mesh.emit_tree(tree, tree.config().circle_res);
        mesh
    }

    /// Meshes `tree` at an explicit circle resolution.
    pub fn from_tree_with_res(tree: &Tree, circle_res: usize) -> Result<Self, TreeError> {
        validate_circle_res(circle_res)?;
        let mut mesh = Self::new();
        mesh.emit_tree(tree, circle_res);
        Ok(mesh)
    }

    fn emit_tree(&mut self, tree: &Tree, res: usize) {
        let rings = node_rings(&tree.nodes, res);
        self.emit_rings(tree, &rings);
    }

    /// Stitches `tree` from precomputed rings indexed by node id. Edges and
    /// tips whose ring is missing are skipped.
    pub(crate) fn emit_rings(&mut self, tree: &Tree, rings: &[Ring]) {
        for (from, to) in tree.edges() {
            let (Some(a), Some(b)) = (rings.get(from), rings.get(to)) else {
                tracing::trace!(from, to, "skipping edge without rings");
                continue;
            };
            self.push_tube(a, b);
        }
        for id in tree.leaves() {
            let Some(ring) = rings.get(id) else {
                tracing::trace!(id, "skipping tip without ring");
                continue;
            };
            self.push_cap(ring);
        }

        tracing::debug!(
            nodes = tree.nodes.len(),
            corners = self.vertices.len(),
            "tree meshed"
        );
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.vertices.len() / 3
    }

    pub fn triangles(&self) -> impl Iterator<Item = &[Vertex]> + '_ {
        self.vertices.chunks_exact(3)
    }

    #[inline]
    pub fn push_triangle(&mut self, a: Vertex, b: Vertex, c: Vertex) {
        self.vertices.extend_from_slice(&[a, b, c]);
    }

    /// Stitches two rings of equal size into an outward-facing tube.
    ///
    /// Rings of different sizes are skipped.
    pub fn push_tube(&mut self, from: &Ring, to: &Ring) {
        let n = from.len();
        if n == 0 || n != to.len() {
            tracing::trace!(from = n, to = to.len(), "ring size mismatch");
            return;
        }
        self.vertices.reserve(n * 6);
        for i in 0..n {
            let j = (i + 1) % n;
            let (f0, f1) = (from.corner(i), from.corner(j));
            let (t0, t1) = (to.corner(i), to.corner(j));
            // Angle grows from binormal toward normal, i.e. clockwise seen
            // from ahead along the tangent.
            self.push_triangle(f0, t0, f1);
            self.push_triangle(f1, t0, t1);
        }
    }

    /// Closes a ring with a fan around its center facing along the tangent.
    pub fn push_cap(&mut self, ring: &Ring) {
        let n = ring.len();
        let corner = |position: Vec3, u: f32| Vertex {
            position,
            normal: ring.tangent,
            uv: Vec2::new(u, ring.v),
            tangent: ring.binormal,
            bitangent: ring.normal,
        };
        let center = corner(ring.center, 0.5);
        for i in 0..n {
            let j = (i + 1) % n;
            self.push_triangle(
                center,
                corner(ring.points[j], ring_u(j, n)),
                corner(ring.points[i], ring_u(i, n)),
            );
        }
    }

    pub fn extend(&mut self, other: &Mesh) {
        self.vertices.extend_from_slice(&other.vertices);
    }

    /// Interleaved vertex buffer bytes.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn to_arrays(&self) -> VertexArrays {
        VertexArrays::from_vertices(&self.vertices)
    }
}

#[cfg(not(feature = "parallel"))]
fn node_rings(nodes: &[TreeNode], res: usize) -> Vec<Ring> {
    nodes.iter().map(|n| Ring::for_node(n, res)).collect()
}

#[cfg(feature = "parallel")]
fn node_rings(nodes: &[TreeNode], res: usize) -> Vec<Ring> {
    use rayon::prelude::*;

    nodes.par_iter().map(|n| Ring::for_node(n, res)).collect()
}
