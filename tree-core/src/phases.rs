//! The three phases of one space-colonization step.
//!
//! 1. [`attraction_phase`] — every attraction point pulls on its nearest
//!    node if that node is inside the influence shell, accumulating unit
//!    directions in an [`InfluenceBuffer`].
//! 2. [`growth_phase`] — every pulled node grows one child along the summed
//!    pull plus its own weighted tangent. New nodes are decided against a
//!    snapshot of the tree and only appended afterwards.
//! 3. [`kill_phase`] — attraction points now closer than the minimum
//!    influence distance are consumed.

use crate::{
    attractor::AttractorSet,
    config::Config,
    influence_buffer::InfluenceBuffer,
    tree::{Tree, TreeNode, find_nearest},
    types::NodeId,
};
use glam::Vec3;

/// Nearest node (and squared distance) for every attraction point, in point
/// order.
#[cfg(not(feature = "parallel"))]
fn nearest_per_point(nodes: &[TreeNode], attractors: &AttractorSet) -> Vec<Option<(NodeId, f32)>> {
    attractors
        .points
        .iter()
        .map(|a| find_nearest(nodes, a.pos))
        .collect()
}

#[cfg(feature = "parallel")]
fn nearest_per_point(nodes: &[TreeNode], attractors: &AttractorSet) -> Vec<Option<(NodeId, f32)>> {
    use rayon::prelude::*;

    attractors
        .points
        .par_iter()
        .map(|a| find_nearest(nodes, a.pos))
        .collect()
}

/// Accumulates the pull of every attraction point onto its nearest node.
///
/// A point influences its nearest node only when the distance lies strictly
/// between `cfg.influence_min_dist` and `cfg.influence_max_dist`. The
/// point's `owner` is set to that node, or cleared otherwise.
///
/// The buffer is resized (and cleared) to `nodes.len()` first via
/// [`InfluenceBuffer::ensure_len`].
///
/// ### Parameters
/// - `nodes` - The current node store; only read access is required.
/// - `attractors` - Remaining attraction points; their `owner` fields are
///   rewritten for this step.
/// - `cfg` - Global configuration, providing the influence shell radii.
/// - `acc` - Scratch buffer receiving the per-node pull directions.
///
/// ### Returns
/// The number of points that influenced some node.
pub fn attraction_phase(
    nodes: &[TreeNode],
    attractors: &mut AttractorSet,
    cfg: &Config,
    acc: &mut InfluenceBuffer,
) -> usize {
    let min2 = cfg.influence_min_dist * cfg.influence_min_dist;
    let max2 = cfg.influence_max_dist * cfg.influence_max_dist;

    acc.ensure_len(nodes.len());

    let nearest = nearest_per_point(nodes, attractors);
    let mut influencing = 0;
    for (a, hit) in attractors.points.iter_mut().zip(nearest) {
        a.owner = match hit {
            Some((id, d2)) if d2 > min2 && d2 < max2 => {
                acc.add(id, (a.pos - nodes[id].pos).normalize_or_zero());
                influencing += 1;
                Some(id)
            }
            _ => None,
        };
    }
    influencing
}

/// Grows the tree along the accumulated influences.
///
/// For each influenced node the direction is the summed pull plus the
/// node's tangent weighted by `previous_dir_power`, normalized. If nothing
/// was influenced at all, the most recently created node keeps growing
/// along its tangent so the trunk still advances.
///
/// ### Parameters
/// - `tree` - The tree to be mutated; new nodes are appended through
///   [`Tree::grow_from`].
/// - `acc` - The accumulated influence buffer from [`attraction_phase`].
///
/// ### Returns
/// The ids of the nodes actually added, in creation order.
pub fn growth_phase(tree: &mut Tree, acc: &InfluenceBuffer) -> Vec<NodeId> {
    let power = tree.config().previous_dir_power;

    let mut requests: Vec<(NodeId, Vec3)> = acc
        .influenced_indices()
        .filter_map(|id| {
            let node = tree.nodes.get(id)?;
            let dir = acc.sum_dir(id) + node.tangent * power;
            dir.try_normalize().map(|dir| (id, dir))
        })
        .collect();

    if acc.is_empty()
        && let Some(last) = tree.nodes.len().checked_sub(1)
    {
        requests.push((last, tree.nodes[last].tangent));
    }

    let mut new_ids = Vec::with_capacity(requests.len());
    for (source, dir) in requests {
        if let Some(id) = tree.grow_from(source, dir) {
            new_ids.push(id);
        }
    }
    new_ids
}

/// Removes attraction points that are now within `cfg.influence_min_dist`
/// of the tree.
///
/// ### Parameters
/// - `nodes` - The node store after this step's growth.
/// - `attractors` - Attraction points; reached ones are dropped.
/// - `cfg` - Global configuration, providing the kill radius.
pub fn kill_phase(nodes: &[TreeNode], attractors: &mut AttractorSet, cfg: &Config) {
    let r2 = cfg.influence_min_dist * cfg.influence_min_dist;
    attractors.points.retain(|a| {
        find_nearest(nodes, a.pos).is_none_or(|(_id, d2)| d2 >= r2)
    });
}
