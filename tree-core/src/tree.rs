use crate::{
    attractor::AttractorSet, config::Config, error::TreeError, influence_buffer::InfluenceBuffer,
    math, phases, rmf::grow_rmf_normal, types::NodeId,
};
use glam::Vec3;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;

#[derive(Clone, Debug)]
pub struct TreeNode {
    pub pos: Vec3,
    /// Unit growth direction.
    pub tangent: Vec3,
    /// Unit reference vector of the rotation-minimizing frame.
    pub normal: Vec3,
    pub width: f32,
    /// Step length used when growing the next node from this one.
    pub branch_length: f32,
    /// Path length from the root in units of the configured branch length.
    pub depth: f32,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

impl TreeNode {
    pub fn new_root(pos: Vec3, tangent: Vec3, normal: Vec3, width: f32, branch_length: f32) -> Self {
        Self {
            pos,
            tangent,
            normal,
            width,
            branch_length,
            depth: 0.0,
            parent: None,
            children: Vec::with_capacity(2),
        }
    }

    pub fn new_child(
        pos: Vec3,
        tangent: Vec3,
        normal: Vec3,
        width: f32,
        branch_length: f32,
        parent: NodeId,
    ) -> Self {
        Self {
            parent: Some(parent),
            ..Self::new_root(pos, tangent, normal, width, branch_length)
        }
    }

    #[inline]
    pub fn binormal(&self) -> Vec3 {
        math::binormal(self.tangent, self.normal)
    }

    #[inline]
    pub fn is_tip(&self) -> bool {
        self.children.is_empty()
    }
}

/// Why [`Tree::grow_to_completion`] stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GrowthOutcome {
    /// The node ceiling was reached.
    NodeLimit,
    /// Every attraction point was consumed.
    Exhausted,
    /// A step added no node while work remained.
    Stalled,
    IterationLimit,
}

/// A branching skeleton grown toward a cloud of attraction points.
///
/// Nodes live in a flat, insertion-ordered store with the root at index 0.
/// Children are owned forward links; `parent` is a plain back-index.
#[derive(Debug)]
pub struct Tree {
    pub nodes: Vec<TreeNode>,
    pub attractors: AttractorSet,
    cfg: Config,
    acc: InfluenceBuffer,
    iterations: usize,
}

impl Tree {
    /// Validates `cfg`, places the root and samples the attraction points.
    pub fn new(cfg: Config, rng: &mut impl Rng) -> Result<Self, TreeError> {
        cfg.validate()?;
        let attractors = AttractorSet::random_in_ellipsoid(
            cfg.crown_center,
            cfg.crown_radii,
            cfg.attractor_count,
            cfg.sampling_attempts_per_point,
            rng,
        )?;
        Self::with_attractors(cfg, attractors)
    }

    /// Builds a single-root tree around an explicit set of attraction points.
    pub fn with_attractors(cfg: Config, attractors: AttractorSet) -> Result<Self, TreeError> {
        cfg.validate()?;
        let (tangent, normal) = math::orthonormalize(cfg.root_tangent, cfg.root_normal)
            .ok_or_else(|| TreeError::config("root_normal", "is parallel to root_tangent"))?;
        let root = TreeNode::new_root(
            cfg.root_position,
            tangent,
            normal,
            cfg.root_width,
            cfg.branch_length,
        );

        Ok(Self {
            nodes: vec![root],
            attractors,
            cfg,
            acc: InfluenceBuffer::with_len(1),
            iterations: 0,
        })
    }

    /// Grows a complete tree from a seed: growth to completion, tip capping
    /// and depth assignment.
    pub fn generate(cfg: Config, seed: u64) -> Result<Self, TreeError> {
        let mut rng = Pcg64::seed_from_u64(seed);
        let mut tree = Self::new(cfg, &mut rng)?;
        let outcome = tree.grow_to_completion();
        let ends = tree.add_ends();
        tree.calculate_depth();

        tracing::info!(
            seed,
            ?outcome,
            nodes = tree.nodes.len(),
            ends,
            iterations = tree.iterations,
            attractors_left = tree.attractors.len(),
            "tree generated"
        );
        Ok(tree)
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Appends a child node and links it to `parent`.
    ///
    /// Returns `None` and leaves the tree untouched if `parent` is not an
    /// existing node.
    pub fn add_child(
        &mut self,
        parent: NodeId,
        pos: Vec3,
        tangent: Vec3,
        normal: Vec3,
        width: f32,
        branch_length: f32,
    ) -> Option<NodeId> {
        let id = self.nodes.len();
        if parent >= id {
            return None;
        }
        self.nodes.push(TreeNode::new_child(
            pos,
            tangent,
            normal,
            width,
            branch_length,
            parent,
        ));
        self.nodes[parent].children.push(id);
        Some(id)
    }

    /// Returns the nearest node to `pos` and the squared distance to it.
    pub fn find_nearest_node(&self, pos: Vec3) -> Option<(NodeId, f32)> {
        find_nearest(&self.nodes, pos)
    }

    /// Returns `true` if any node lies within `eps` of `pos`.
    pub fn has_node_near(&self, pos: Vec3, eps: f32) -> bool {
        let eps2 = eps * eps;
        self.nodes
            .iter()
            .any(|n| (n.pos - pos).length_squared() < eps2)
    }

    /// Grows one node from `source` in `direction`.
    ///
    /// The child sits one `branch_length` away from the source, carries the
    /// transported frame normal and the decayed width and step length. A
    /// coincident position is dropped outright; the source is not retried
    /// in another direction.
    ///
    /// ### Parameters
    /// - `source` - Id of the node to grow from.
    /// - `direction` - Growth direction; need not be normalized.
    ///
    /// ### Returns
    /// The new node's id, or `None` without touching the tree if `source`
    /// does not exist, the direction is zero, the node ceiling is reached,
    /// or the new position lies within `merge_epsilon` of an existing node.
    pub fn grow_from(&mut self, source: NodeId, direction: Vec3) -> Option<NodeId> {
        if self.nodes.len() >= self.cfg.max_nodes {
            return None;
        }
        let src = self.nodes.get(source)?;
        let dir = direction.try_normalize()?;

        let new_pos = src.pos + dir * src.branch_length;
        if self.has_node_near(new_pos, self.cfg.merge_epsilon) {
            tracing::trace!(source, ?new_pos, "skipping coincident growth");
            return None;
        }

        let normal = grow_rmf_normal(src.pos, src.tangent, src.normal, new_pos, dir);
        let width = src.width * self.cfg.branch_width_scale;
        let branch_length = src.branch_length * self.cfg.branch_length_scale;
        self.add_child(source, new_pos, dir, normal, width, branch_length)
    }

    /// `true` once no attraction point remains or the node ceiling is hit.
    pub fn is_finished(&self) -> bool {
        self.attractors.is_empty() || self.nodes.len() >= self.cfg.max_nodes
    }

    /// Runs one attraction / growth / kill step.
    ///
    /// Growth directions are decided from the tree as it was at the start of
    /// the step; the new nodes are appended afterwards.
    ///
    /// ### Returns
    /// The ids of the nodes added in this step. Empty when the tree is
    /// already finished or every request was dropped.
    pub fn grow(&mut self) -> Vec<NodeId> {
        if self.is_finished() {
            return Vec::new();
        }

        phases::attraction_phase(&self.nodes, &mut self.attractors, &self.cfg, &mut self.acc);
        let acc = std::mem::take(&mut self.acc);
        let new_ids = phases::growth_phase(self, &acc);
        self.acc = acc;
        phases::kill_phase(&self.nodes, &mut self.attractors, &self.cfg);

        self.iterations += 1;
        tracing::debug!(
            iteration = self.iterations,
            added = new_ids.len(),
            nodes = self.nodes.len(),
            attractors = self.attractors.len(),
            "growth step"
        );
        new_ids
    }

    /// Calls [`Tree::grow`] until a stop condition holds.
    pub fn grow_to_completion(&mut self) -> GrowthOutcome {
        loop {
            if self.nodes.len() >= self.cfg.max_nodes {
                return GrowthOutcome::NodeLimit;
            }
            if self.attractors.is_empty() {
                return GrowthOutcome::Exhausted;
            }
            if self.iterations >= self.cfg.max_iterations {
                return GrowthOutcome::IterationLimit;
            }
            if self.grow().is_empty() {
                tracing::warn!(
                    nodes = self.nodes.len(),
                    attractors = self.attractors.len(),
                    "growth stalled"
                );
                return GrowthOutcome::Stalled;
            }
        }
    }

    /// Appends a short tapered child to every current tip.
    ///
    /// The end node continues along the tip's tangent with half its width
    /// and half its branch length. Returns how many ends were added.
    pub fn add_ends(&mut self) -> usize {
        let tips: Vec<NodeId> = self.leaves().collect();
        for &id in &tips {
            let tip = &self.nodes[id];
            let branch_length = tip.branch_length * 0.5;
            let pos = tip.pos + tip.tangent * branch_length;
            let (tangent, normal, width) = (tip.tangent, tip.normal, tip.width * 0.5);
            self.add_child(id, pos, tangent, normal, width, branch_length);
        }
        tips.len()
    }

    /// Assigns every node its path length from the root, measured in units
    /// of the configured branch length.
    pub fn calculate_depth(&mut self) {
        let Some(root) = self.nodes.first_mut() else {
            return;
        };
        root.depth = 0.0;

        let mut stack = vec![0];
        while let Some(id) = stack.pop() {
            let (pos, depth) = (self.nodes[id].pos, self.nodes[id].depth);
            for i in 0..self.nodes[id].children.len() {
                let child = self.nodes[id].children[i];
                let node = &mut self.nodes[child];
                node.depth = depth + node.pos.distance(pos) / self.cfg.branch_length;
                stack.push(child);
            }
        }
    }

    /// Root-first pre-order traversal. Nodes reachable twice are visited once.
    pub fn depth_first(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        if self.nodes.is_empty() {
            return order;
        }
        let mut visited = vec![false; self.nodes.len()];
        let mut stack = vec![0];
        while let Some(id) = stack.pop() {
            if std::mem::replace(&mut visited[id], true) {
                continue;
            }
            order.push(id);
            stack.extend(self.nodes[id].children.iter().rev());
        }
        order
    }

    /// Tip nodes in insertion order.
    pub fn leaves(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(id, n)| n.is_tip().then_some(id))
    }

    /// Parent/child pairs in parent insertion order.
    pub fn edges(&self) -> impl Iterator<Item = (NodeId, NodeId)> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .flat_map(|(id, n)| n.children.iter().map(move |&c| (id, c)))
    }
}

pub(crate) fn find_nearest(nodes: &[TreeNode], pos: Vec3) -> Option<(NodeId, f32)> {
    let mut best = None;
    let mut best_d2 = f32::MAX;
    for (id, n) in nodes.iter().enumerate() {
        let d2 = (n.pos - pos).length_squared();
        if d2 < best_d2 {
            best_d2 = d2;
            best = Some(id);
        }
    }
    best.map(|id| (id, best_d2))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bare_tree(cfg: Config) -> Tree {
        Tree::with_attractors(cfg, AttractorSet::default()).unwrap()
    }

    #[test]
    fn add_child_links_both_directions() {
        let mut tree = bare_tree(Config::default());
        let id = tree.add_child(0, Vec3::Y, Vec3::Y, Vec3::Z, 1.0, 1.0);

        assert_eq!(id, Some(1));
        assert_eq!(tree.nodes[0].children, vec![1]);
        assert_eq!(tree.nodes[1].parent, Some(0));
    }

    #[test]
    fn add_child_rejects_missing_parent() {
        let mut tree = bare_tree(Config::default());

        // The id the new node would get is not yet a valid parent.
        assert_eq!(tree.add_child(1, Vec3::Y, Vec3::Y, Vec3::Z, 1.0, 1.0), None);
        assert_eq!(tree.add_child(5, Vec3::Y, Vec3::Y, Vec3::Z, 1.0, 1.0), None);

        assert_eq!(tree.len(), 1);
        assert!(tree.nodes[0].children.is_empty());
        tree.calculate_depth();
        assert_eq!(tree.depth_first(), vec![0]);
    }

    #[test]
    fn grow_from_applies_step_and_decay() {
        let mut tree = bare_tree(Config::default());
        let id = tree.grow_from(0, Vec3::Y * 5.0).unwrap();
        let node = &tree.nodes[id];

        assert!((node.pos - Vec3::new(0.0, 30.0, 0.0)).length() < 1e-5);
        assert!((node.width - 12.0 * 0.9).abs() < 1e-5);
        assert!((node.branch_length - 30.0 * 0.99).abs() < 1e-5);
        assert!((node.normal - Vec3::Z).length() < 1e-5);
    }

    #[test]
    fn coincident_growth_is_skipped() {
        let mut tree = bare_tree(Config::default());
        assert!(tree.grow_from(0, Vec3::Y).is_some());
        // Same source, same direction: the new node would land on node 1.
        assert!(tree.grow_from(0, Vec3::Y).is_none());
        assert_eq!(tree.len(), 2);
        assert_eq!(tree.nodes[0].children, vec![1]);
    }

    #[test]
    fn grow_from_respects_ceiling_and_zero_direction() {
        let mut tree = bare_tree(Config {
            max_nodes: 2,
            ..Config::default()
        });
        assert!(tree.grow_from(0, Vec3::ZERO).is_none());
        assert!(tree.grow_from(0, Vec3::Y).is_some());
        assert!(tree.grow_from(1, Vec3::Y).is_none());
        assert!(tree.grow_from(99, Vec3::Y).is_none());
    }

    #[test]
    fn add_ends_caps_every_tip() {
        let mut tree = bare_tree(Config::default());
        tree.grow_from(0, Vec3::Y);
        tree.grow_from(0, Vec3::X);

        let added = tree.add_ends();
        assert_eq!(added, 2);
        assert_eq!(tree.len(), 5);

        for end in 3..5 {
            let node = &tree.nodes[end];
            let parent = &tree.nodes[node.parent.unwrap()];
            assert!((node.width - parent.width * 0.5).abs() < 1e-6);
            assert!((node.branch_length - parent.branch_length * 0.5).abs() < 1e-6);
            let step = node.pos - parent.pos;
            assert!((step.normalize() - parent.tangent).length() < 1e-5);
            assert!(node.is_tip());
        }
    }

    #[test]
    fn calculate_depth_accumulates_normalized_distance() {
        let mut tree = bare_tree(Config::default());
        let a = tree.grow_from(0, Vec3::Y).unwrap();
        let b = tree.grow_from(a, Vec3::X).unwrap();
        tree.calculate_depth();

        assert_eq!(tree.nodes[0].depth, 0.0);
        for (p, c) in [(0, a), (a, b)] {
            let expected =
                tree.nodes[p].depth + tree.nodes[c].pos.distance(tree.nodes[p].pos) / 30.0;
            assert!((tree.nodes[c].depth - expected).abs() < 1e-5);
        }
    }

    #[test]
    fn depth_first_visits_each_node_once() {
        let mut tree = bare_tree(Config::default());
        let a = tree.grow_from(0, Vec3::Y).unwrap();
        tree.grow_from(a, Vec3::X).unwrap();
        tree.grow_from(a, Vec3::NEG_X).unwrap();
        tree.grow_from(0, Vec3::Z).unwrap();

        let order = tree.depth_first();
        assert_eq!(order, vec![0, 1, 2, 3, 4]);
        assert_eq!(tree.edges().count(), 4);
        assert_eq!(tree.leaves().collect::<Vec<_>>(), vec![2, 3, 4]);
    }

    #[test]
    fn grow_with_unreachable_points_extends_trunk() {
        let cfg = Config {
            influence_max_dist: 50.0,
            ..Config::default()
        };
        let attractors = AttractorSet::from_positions(vec![Vec3::new(0.0, 1000.0, 0.0)]);
        let mut tree = Tree::with_attractors(cfg, attractors).unwrap();

        let added = tree.grow();
        assert_eq!(added, vec![1]);
        assert!((tree.nodes[1].pos - Vec3::new(0.0, 30.0, 0.0)).length() < 1e-4);

        let added = tree.grow();
        assert_eq!(added, vec![2]);
        assert_eq!(tree.nodes[2].parent, Some(1));
    }

    #[test]
    fn generate_is_reproducible() {
        let cfg = Config {
            attractor_count: 80,
            max_nodes: 60,
            ..Config::default()
        };
        let a = Tree::generate(cfg, 42).unwrap();
        let b = Tree::generate(cfg, 42).unwrap();

        assert_eq!(a.len(), b.len());
        for (na, nb) in a.nodes.iter().zip(&b.nodes) {
            assert_eq!(na.pos, nb.pos);
            assert_eq!(na.parent, nb.parent);
        }
    }

    #[test]
    fn invalid_config_fails_before_growth() {
        let cfg = Config {
            circle_res: 5,
            ..Config::default()
        };
        assert!(Tree::generate(cfg, 1).is_err());
    }
}
