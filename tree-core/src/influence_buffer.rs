use crate::types::NodeId;
use glam::Vec3;

/// A temporary buffer that accumulates directional influence per node.
///
/// For each `NodeId`, this buffer stores:
///
/// - The sum of all incoming unit direction vectors.
/// - The number of contributions that were added.
///
/// Attraction points are grouped by the node they pull on simply by adding
/// their directions into that node's slot; nodes with a non-zero count are
/// the ones that grow in the next step.
#[derive(Debug, Default)]
pub struct InfluenceBuffer {
    /// Accumulated direction vectors for each node.
    dir: Vec<Vec3>,
    /// Number of contributions for each node.
    pub count: Vec<u32>,
}

impl InfluenceBuffer {
    /// Creates a new [`InfluenceBuffer`] with the given length.
    ///
    /// All accumulated directions are initialized to `Vec3::ZERO`,
    /// and all counts are initialized to `0`.
    pub fn with_len(len: usize) -> Self {
        Self {
            dir: vec![Vec3::ZERO; len],
            count: vec![0; len],
        }
    }

    /// Ensures that the internal storage has exactly the given length.
    ///
    /// After this call, all entries are cleared, even if the length was
    /// already correct.
    pub fn ensure_len(&mut self, len: usize) {
        if self.dir.len() != len {
            self.dir.resize(len, Vec3::ZERO);
            self.count.resize(len, 0);
        }
        self.clear();
    }

    /// Clears all accumulated influences, keeping the length.
    pub fn clear(&mut self) {
        self.dir.fill(Vec3::ZERO);
        self.count.fill(0);
    }

    /// Adds one directional influence for the given node.
    ///
    /// ### Panics
    /// Panics if `id` is out of bounds for the internal arrays.
    #[inline]
    pub fn add(&mut self, id: NodeId, dir: Vec3) {
        self.dir[id] += dir;
        self.count[id] += 1;
    }

    /// Returns the summed influence direction for a node, or `Vec3::ZERO`
    /// if nothing pulled on it.
    #[inline]
    pub fn sum_dir(&self, id: NodeId) -> Vec3 {
        self.dir.get(id).copied().unwrap_or(Vec3::ZERO)
    }

    #[inline]
    pub fn is_influenced(&self, id: NodeId) -> bool {
        self.count.get(id).is_some_and(|&c| c > 0)
    }

    /// Returns `true` if no node received any influence.
    pub fn is_empty(&self) -> bool {
        self.count.iter().all(|&c| c == 0)
    }

    /// Returns an iterator over all node indices that have been influenced,
    /// in ascending order.
    pub fn influenced_indices(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.count
            .iter()
            .enumerate()
            .filter_map(|(i, &c)| if c > 0 { Some(i) } else { None })
    }
}
