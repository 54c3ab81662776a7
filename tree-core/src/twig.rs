//! Instanced twigs with leaf cards.
//!
//! A single twig template is built in local space growing up `+Y`: a curved
//! Bézier stem swept into a thin tube along RMF-transported frames, with
//! leaf cards alternating along it. Each qualifying node gets one instance
//! transform built from its frame and a random roll about its tangent.

use crate::{
    bezier::CubicBezier,
    config::validate_circle_res,
    error::TreeError,
    math,
    mesh::{Mesh, Ring, Vertex},
    rmf,
    tree::Tree,
};
use glam::{Mat3, Mat4, Vec2, Vec3};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::f32::consts::TAU;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TwigConfig {
    pub stem_length: f32,
    /// Sideways bend of the stem tip, relative to its length.
    pub stem_curl: f32,
    pub stem_width: f32,
    pub stem_segments: usize,
    /// Ring resolution of the stem tube. Must be even.
    pub stem_res: usize,
    pub leaf_count: usize,
    /// Leaf card width and length.
    pub leaf_size: Vec2,
    /// Non-tip nodes thinner than this also receive a twig.
    pub max_width: f32,
    /// Uniform scale applied to every instance.
    pub scale: f32,
}

impl Default for TwigConfig {
    fn default() -> Self {
        Self {
            stem_length: 1.0,
            stem_curl: 0.25,
            stem_width: 0.03,
            stem_segments: 6,
            stem_res: 4,
            leaf_count: 4,
            leaf_size: Vec2::new(0.18, 0.35),
            max_width: 2.0,
            scale: 20.0,
        }
    }
}

impl TwigConfig {
    pub fn validate(&self) -> Result<(), TreeError> {
        for (field, value) in [
            ("stem_length", self.stem_length),
            ("stem_width", self.stem_width),
            ("scale", self.scale),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(TreeError::config(field, format!("must be positive, got {value}")));
            }
        }
        if !self.stem_curl.is_finite() {
            return Err(TreeError::config("stem_curl", "must be finite"));
        }
        if self.stem_segments == 0 {
            return Err(TreeError::config("stem_segments", "must be at least 1"));
        }
        if !self.leaf_size.is_finite() || self.leaf_size.min_element() <= 0.0 {
            return Err(TreeError::config("leaf_size", "must be positive"));
        }
        validate_circle_res(self.stem_res)
    }
}

/// The twig template plus one transform per instance.
#[derive(Clone, Debug, Default)]
pub struct TwigSet {
    pub template: Mesh,
    pub instances: Vec<Mat4>,
}

impl TwigSet {
    /// Places a twig on every tip and on every node thinner than
    /// `cfg.max_width`, in node order.
    pub fn generate(tree: &Tree, cfg: &TwigConfig, rng: &mut impl Rng) -> Result<Self, TreeError> {
        cfg.validate()?;
        let template = twig_template(cfg);
        let scale = Vec3::splat(cfg.scale);

        let instances = tree
            .nodes
            .iter()
            .filter(|n| n.is_tip() || n.width < cfg.max_width)
            .map(|n| {
                let roll = rng.random_range(0.0..TAU);
                math::frame_matrix(n.pos, n.tangent, n.normal, scale) * Mat4::from_rotation_y(roll)
            })
            .collect::<Vec<_>>();

        tracing::debug!(
            instances = instances.len(),
            template_corners = template.vertex_count(),
            "twigs placed"
        );
        Ok(Self {
            template,
            instances,
        })
    }

    /// Applies every instance transform to the template, for renderers
    /// without instancing.
    pub fn bake(&self) -> Mesh {
        let mut mesh = Mesh::new();
        mesh.vertices
            .reserve(self.template.vertex_count() * self.instances.len());
        for m in &self.instances {
            let normal_matrix = Mat3::from_mat4(*m).inverse().transpose();
            mesh.vertices.extend(self.template.vertices.iter().map(|v| Vertex {
                position: m.transform_point3(v.position),
                normal: (normal_matrix * v.normal).normalize_or_zero(),
                uv: v.uv,
                tangent: m.transform_vector3(v.tangent).normalize_or_zero(),
                bitangent: m.transform_vector3(v.bitangent).normalize_or_zero(),
            }));
        }
        mesh
    }
}

/// Builds the twig in local space: stem from the origin up `+Y`, bending
/// toward `+X`.
pub fn twig_template(cfg: &TwigConfig) -> Mesh {
    let len = cfg.stem_length;
    let curl = cfg.stem_curl * len;
    let stem = CubicBezier::new(
        Vec3::ZERO,
        Vec3::new(0.0, len / 3.0, 0.0),
        Vec3::new(curl * 0.5, len * 2.0 / 3.0, 0.0),
        Vec3::new(curl, len, 0.0),
    );

    let points = stem.sample(cfg.stem_segments);
    let frames = rmf::transport_along(&points, Vec3::Y, Vec3::Z);
    let last = points.len().saturating_sub(1).max(1) as f32;

    let rings: Vec<Ring> = points
        .iter()
        .zip(&frames)
        .enumerate()
        .map(|(i, (&p, &(t, n)))| {
            let f = i as f32 / last;
            let radius = cfg.stem_width * (1.0 - 0.7 * f);
            Ring::around(p, t, n, radius, f, cfg.stem_res)
        })
        .collect();

    let mut mesh = Mesh::new();
    for pair in rings.windows(2) {
        mesh.push_tube(&pair[0], &pair[1]);
    }
    if let Some(tip) = rings.last() {
        mesh.push_cap(tip);
    }

    for i in 0..cfg.leaf_count {
        let t = (i + 1) as f32 / (cfg.leaf_count + 1) as f32;
        let side = if i % 2 == 0 { 1.0 } else { -1.0 };
        let base = stem.point(t);
        let along = stem.derivative(t).try_normalize().unwrap_or(Vec3::Y);
        let out = (Vec3::Z.cross(along) * side)
            .try_normalize()
            .unwrap_or(Vec3::X * side);
        push_leaf(&mut mesh, base, out, along, cfg.leaf_size);
    }
    mesh
}

/// A double-sided card from `base` reaching along `out`.
fn push_leaf(mesh: &mut Mesh, base: Vec3, out: Vec3, along: Vec3, size: Vec2) {
    let half = along * (size.x * 0.5);
    let tip = out * size.y;
    let normal = out.cross(along).normalize_or_zero();
    let corner = |position: Vec3, uv: Vec2, normal: Vec3| Vertex {
        position,
        normal,
        uv,
        tangent: out,
        bitangent: along,
    };

    let quad = [
        (base - half, Vec2::new(0.0, 0.0)),
        (base - half + tip, Vec2::new(1.0, 0.0)),
        (base + half + tip, Vec2::new(1.0, 1.0)),
        (base + half, Vec2::new(0.0, 1.0)),
    ];
    let front = quad.map(|(p, uv)| corner(p, uv, normal));
    let back = quad.map(|(p, uv)| corner(p, uv, -normal));

    mesh.push_triangle(front[0], front[1], front[2]);
    mesh.push_triangle(front[0], front[2], front[3]);
    mesh.push_triangle(back[0], back[2], back[1]);
    mesh.push_triangle(back[0], back[3], back[2]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{attractor::AttractorSet, config::Config};
    use rand::SeedableRng;
    use rand_pcg::Pcg64;

    fn tree() -> Tree {
        let mut tree = Tree::with_attractors(Config::default(), AttractorSet::default()).unwrap();
        let a = tree.grow_from(0, Vec3::Y).unwrap();
        tree.grow_from(a, Vec3::X).unwrap();
        tree.grow_from(a, Vec3::NEG_X).unwrap();
        tree
    }

    #[test]
    fn template_counts() {
        let cfg = TwigConfig::default();
        let mesh = twig_template(&cfg);
        let stem = cfg.stem_segments * cfg.stem_res * 6 + cfg.stem_res * 3;
        let leaves = cfg.leaf_count * 12;
        assert_eq!(mesh.vertex_count(), stem + leaves);
    }

    #[test]
    fn leaf_cards_face_their_normals() {
        let cfg = TwigConfig {
            stem_segments: 1,
            leaf_count: 1,
            ..TwigConfig::default()
        };
        let mesh = twig_template(&cfg);
        let leaf_start = mesh.vertex_count() - 12;
        for tri in mesh.vertices[leaf_start..].chunks_exact(3) {
            let n = (tri[1].position - tri[0].position).cross(tri[2].position - tri[0].position);
            assert!(n.dot(tri[0].normal) > 0.0);
        }
    }

    #[test]
    fn tips_get_instances_aligned_with_their_frame() {
        let tree = tree();
        let cfg = TwigConfig {
            max_width: 0.0,
            ..TwigConfig::default()
        };
        let set = TwigSet::generate(&tree, &cfg, &mut Pcg64::seed_from_u64(9)).unwrap();

        let tips: Vec<_> = tree.leaves().collect();
        assert_eq!(set.instances.len(), tips.len());
        for (m, &id) in set.instances.iter().zip(&tips) {
            let node = &tree.nodes[id];
            assert!((m.transform_point3(Vec3::ZERO) - node.pos).length() < 1e-4);
            let up = m.transform_vector3(Vec3::Y).normalize();
            assert!((up - node.tangent).length() < 1e-4);
        }
    }

    #[test]
    fn bake_multiplies_template() {
        let tree = tree();
        let set = TwigSet::generate(&tree, &TwigConfig::default(), &mut Pcg64::seed_from_u64(1))
            .unwrap();
        let baked = set.bake();
        assert_eq!(
            baked.vertex_count(),
            set.template.vertex_count() * set.instances.len()
        );
        assert!(baked.vertices.iter().all(|v| v.position.is_finite()));
    }

    #[test]
    fn odd_stem_resolution_is_rejected() {
        let cfg = TwigConfig {
            stem_res: 3,
            ..TwigConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
