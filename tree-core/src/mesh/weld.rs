use super::{Mesh, Vertex, VertexArrays};
use crate::error::TreeError;
use glam::{Vec2, Vec3};
use hashbrown::HashMap;

/// Width of the index buffer handed to the renderer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IndexFormat {
    U16,
    U32,
}

impl IndexFormat {
    /// Number of distinct vertices the format can address.
    pub const fn max_vertices(self) -> usize {
        match self {
            Self::U16 => u16::MAX as usize + 1,
            Self::U32 => u32::MAX as usize + 1,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Indices {
    U16(Vec<u16>),
    U32(Vec<u32>),
}

impl Indices {
    pub fn len(&self) -> usize {
        match self {
            Self::U16(v) => v.len(),
            Self::U32(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn format(&self) -> IndexFormat {
        match self {
            Self::U16(_) => IndexFormat::U16,
            Self::U32(_) => IndexFormat::U32,
        }
    }

    pub fn iter(&self) -> Box<dyn Iterator<Item = usize> + '_> {
        match self {
            Self::U16(v) => Box::new(v.iter().map(|&i| i as usize)),
            Self::U32(v) => Box::new(v.iter().map(|&i| i as usize)),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::U16(v) => bytemuck::cast_slice(v),
            Self::U32(v) => bytemuck::cast_slice(v),
        }
    }
}

/// Triangle list with shared vertices.
#[derive(Clone, Debug, PartialEq)]
pub struct IndexedMesh {
    pub vertices: Vec<Vertex>,
    pub indices: Indices,
}

type Cell = (i64, i64, i64);

fn cell_of(p: Vec3, inv_eps: f32) -> Cell {
    let c = (p * inv_eps).floor();
    (c.x as i64, c.y as i64, c.z as i64)
}

/// Finds welded vertices within `eps` of each other using a uniform grid
/// whose cells are `eps` wide, so only the 27 surrounding cells are searched.
struct WeldGrid {
    inv_eps: f32,
    eps2: f32,
    cells: HashMap<Cell, Vec<u32>>,
}

impl WeldGrid {
    fn new(eps: f32) -> Self {
        Self {
            inv_eps: 1.0 / eps,
            eps2: eps * eps,
            cells: HashMap::new(),
        }
    }

    /// Lowest-index welded vertex within `eps` of `p`.
    fn find(&self, p: Vec3, welded: &[Vertex]) -> Option<u32> {
        let (cx, cy, cz) = cell_of(p, self.inv_eps);
        let mut best: Option<u32> = None;
        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let Some(bucket) = self.cells.get(&(cx + dx, cy + dy, cz + dz)) else {
                        continue;
                    };
                    for &i in bucket {
                        let close =
                            (welded[i as usize].position - p).length_squared() <= self.eps2;
                        if close && best.is_none_or(|b| i < b) {
                            best = Some(i);
                        }
                    }
                }
            }
        }
        best
    }

    fn insert(&mut self, p: Vec3, index: u32) {
        self.cells
            .entry(cell_of(p, self.inv_eps))
            .or_default()
            .push(index);
    }
}

#[derive(Clone, Copy, Default)]
struct Accum {
    normal: Vec3,
    tangent: Vec3,
    bitangent: Vec3,
}

/// Per-triangle tangent and bitangent from UV gradients, or `None` when the
/// UV mapping of the triangle is degenerate.
pub(crate) fn triangle_tangents(
    p: [Vec3; 3],
    uv: [Vec2; 3],
) -> Option<(Vec3, Vec3)> {
    let edge1 = p[1] - p[0];
    let edge2 = p[2] - p[0];
    let d1 = uv[1] - uv[0];
    let d2 = uv[2] - uv[0];
    let det = d1.x * d2.y - d2.x * d1.y;
    if det.abs() < 1e-12 {
        return None;
    }
    let r = 1.0 / det;
    let tangent = ((edge1 * d2.y - edge2 * d1.y) * r).try_normalize()?;
    let bitangent = ((edge2 * d1.x - edge1 * d2.x) * r).try_normalize()?;
    Some((tangent, bitangent))
}

impl IndexedMesh {
    /// Merges corners of `mesh` that lie within `eps` of each other.
    ///
    /// The first corner seen at a location becomes the shared vertex.
    /// Normals become the average face normal of the triangles using the
    /// vertex; tangents and bitangents the average of their UV-derived
    /// tangent frames. A vertex no triangle gives a usable contribution to
    /// keeps its original attribute.
    ///
    /// Fails with [`TreeError::IndexOverflow`] when the merged vertex count
    /// exceeds what `format` can address.
    pub fn weld(mesh: &Mesh, eps: f32, format: IndexFormat) -> Result<Self, TreeError> {
        if !eps.is_finite() || eps <= 0.0 {
            return Err(TreeError::config("weld_epsilon", format!("must be positive, got {eps}")));
        }
        let max = IndexFormat::U32.max_vertices();
        if mesh.vertices.len() > max {
            return Err(TreeError::IndexOverflow {
                vertices: mesh.vertices.len(),
                max,
            });
        }

        let mut grid = WeldGrid::new(eps);
        let mut welded: Vec<Vertex> = Vec::new();
        let mut remap: Vec<u32> = Vec::with_capacity(mesh.vertices.len());

        for v in &mesh.vertices {
            let index = match grid.find(v.position, &welded) {
                Some(i) => i,
                None => {
                    let i = welded.len() as u32;
                    welded.push(*v);
                    grid.insert(v.position, i);
                    i
                }
            };
            remap.push(index);
        }

        if welded.len() > format.max_vertices() {
            return Err(TreeError::IndexOverflow {
                vertices: welded.len(),
                max: format.max_vertices(),
            });
        }

        recompute_shading(&mut welded, &remap);

        let indices = match format {
            IndexFormat::U16 => Indices::U16(remap.iter().map(|&i| i as u16).collect()),
            IndexFormat::U32 => Indices::U32(remap),
        };

        tracing::debug!(
            corners = mesh.vertices.len(),
            vertices = welded.len(),
            "mesh welded"
        );
        Ok(Self {
            vertices: welded,
            indices,
        })
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Expands back into one vertex per triangle corner.
    pub fn to_unindexed(&self) -> Mesh {
        Mesh {
            vertices: self
                .indices
                .iter()
                .filter_map(|i| self.vertices.get(i).copied())
                .collect(),
        }
    }

    pub fn to_arrays(&self) -> (VertexArrays, Vec<u32>) {
        (
            VertexArrays::from_vertices(&self.vertices),
            self.indices.iter().map(|i| i as u32).collect(),
        )
    }

    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }
}

fn recompute_shading(vertices: &mut [Vertex], indices: &[u32]) {
    let mut acc = vec![Accum::default(); vertices.len()];

    for tri in indices.chunks_exact(3) {
        let ids = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
        let p = ids.map(|i| vertices[i].position);
        let uv = ids.map(|i| vertices[i].uv);

        let face = (p[1] - p[0]).cross(p[2] - p[0]).try_normalize();
        let frame = triangle_tangents(p, uv);
        for i in ids {
            if let Some(n) = face {
                acc[i].normal += n;
            }
            if let Some((t, b)) = frame {
                acc[i].tangent += t;
                acc[i].bitangent += b;
            }
        }
    }

    for (v, a) in vertices.iter_mut().zip(acc) {
        if let Some(n) = a.normal.try_normalize() {
            v.normal = n;
        }
        if let Some(t) = a.tangent.try_normalize() {
            v.tangent = t;
        }
        if let Some(b) = a.bitangent.try_normalize() {
            v.bitangent = b;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        attractor::AttractorSet, config::Config, mesh::Ring, tree::Tree,
    };

    fn quad() -> Mesh {
        let v = |x: f32, y: f32| Vertex {
            position: Vec3::new(x, y, 0.0),
            uv: Vec2::new(x, y),
            ..Vertex::default()
        };
        let mut mesh = Mesh::new();
        mesh.push_triangle(v(0.0, 0.0), v(1.0, 0.0), v(1.0, 1.0));
        mesh.push_triangle(v(0.0, 0.0), v(1.0, 1.0), v(0.0, 1.0));
        mesh
    }

    fn small_tree() -> Tree {
        let mut tree = Tree::with_attractors(Config::default(), AttractorSet::default()).unwrap();
        let a = tree.grow_from(0, Vec3::Y).unwrap();
        tree.grow_from(a, Vec3::new(1.0, 1.0, 0.0)).unwrap();
        tree.grow_from(a, Vec3::new(-1.0, 1.0, 0.0)).unwrap();
        tree.add_ends();
        tree.calculate_depth();
        tree
    }

    #[test]
    fn quad_welds_to_four_vertices() {
        let welded = IndexedMesh::weld(&quad(), 1e-4, IndexFormat::U16).unwrap();

        assert_eq!(welded.vertices.len(), 4);
        assert_eq!(welded.indices, Indices::U16(vec![0, 1, 2, 0, 2, 3]));
        for v in &welded.vertices {
            assert!((v.normal - Vec3::Z).length() < 1e-5);
            assert!((v.tangent - Vec3::X).length() < 1e-5);
            assert!((v.bitangent - Vec3::Y).length() < 1e-5);
        }
    }

    #[test]
    fn triangle_tangents_rejects_degenerate_uv() {
        let p = [Vec3::ZERO, Vec3::X, Vec3::Y];
        assert!(triangle_tangents(p, [Vec2::ZERO; 3]).is_none());
    }

    #[test]
    fn welding_a_tree_shrinks_and_preserves_triangles() {
        let tree = small_tree();
        let mesh = Mesh::from_tree(&tree);
        let welded = IndexedMesh::weld(&mesh, 1e-3, IndexFormat::U32).unwrap();

        assert!(welded.vertices.len() <= mesh.vertex_count());
        assert!(welded.vertices.len() < mesh.vertex_count() / 3);
        assert_eq!(welded.triangle_count(), mesh.triangle_count());

        let expanded = welded.to_unindexed();
        for (a, b) in expanded.vertices.iter().zip(&mesh.vertices) {
            assert!((a.position - b.position).length() <= 1e-3);
        }
        for v in &welded.vertices {
            assert!((v.normal.length() - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn welding_is_idempotent() {
        let tree = small_tree();
        let mesh = Mesh::from_tree(&tree);

        let first = IndexedMesh::weld(&mesh, 1e-3, IndexFormat::U32).unwrap();
        let again = IndexedMesh::weld(&mesh, 1e-3, IndexFormat::U32).unwrap();
        assert_eq!(first, again);

        let rewelded = IndexedMesh::weld(&first.to_unindexed(), 1e-3, IndexFormat::U32).unwrap();
        assert_eq!(rewelded.indices, first.indices);
        assert_eq!(rewelded.vertices.len(), first.vertices.len());
    }

    #[test]
    fn u16_overflow_fails_before_emitting_indices() {
        let mut mesh = Mesh::new();
        // Rings far enough apart that nothing welds.
        for i in 0..3000 {
            let center = Vec3::new(i as f32 * 10.0, 0.0, 0.0);
            let from = Ring::around(center, Vec3::Y, Vec3::Z, 1.0, 0.0, 12);
            let to = Ring::around(center + Vec3::Y, Vec3::Y, Vec3::Z, 1.0, 1.0, 12);
            mesh.push_tube(&from, &to);
        }

        let err = IndexedMesh::weld(&mesh, 1e-3, IndexFormat::U16).unwrap_err();
        assert_eq!(
            err,
            TreeError::IndexOverflow {
                vertices: 3000 * 24,
                max: 65536,
            }
        );
        assert!(IndexedMesh::weld(&mesh, 1e-3, IndexFormat::U32).is_ok());
    }

    #[test]
    fn index_arrays_match_vertex_count() {
        let welded = IndexedMesh::weld(&quad(), 1e-4, IndexFormat::U32).unwrap();
        let (arrays, indices) = welded.to_arrays();
        assert_eq!(arrays.positions.len(), 12);
        assert_eq!(indices, vec![0, 1, 2, 0, 2, 3]);
        assert_eq!(welded.indices.as_bytes().len(), 6 * 4);
        assert_eq!(welded.vertex_bytes().len(), 4 * std::mem::size_of::<Vertex>());
    }
}
