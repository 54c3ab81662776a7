use crate::{error::TreeError, types::NodeId};
use glam::Vec3;
use rand::Rng;

#[derive(Clone, Debug)]
pub struct Attractor {
    pub pos: Vec3,
    /// Node this point pulled on during the last attraction phase.
    pub owner: Option<NodeId>,
}

/// The attraction points that have not been consumed yet.
#[derive(Clone, Debug, Default)]
pub struct AttractorSet {
    pub points: Vec<Attractor>,
}

/// Returns `true` if `p` lies inside the axis-aligned ellipsoid.
pub fn good_point(p: Vec3, center: Vec3, radii: Vec3) -> bool {
    if radii.min_element() <= 0.0 {
        return false;
    }
    ((p - center) / radii).length_squared() <= 1.0
}

impl AttractorSet {
    pub fn from_positions(positions: Vec<Vec3>) -> Self {
        let points = positions
            .into_iter()
            .map(|pos| Attractor { pos, owner: None })
            .collect();

        Self { points }
    }

    /// Rejection-samples `count` points inside an ellipsoid.
    ///
    /// Candidates are drawn uniformly from the bounding box of the ellipsoid;
    /// at most `count * attempts_per_point` candidates are tried before
    /// giving up with [`TreeError::AttractorSampling`]. Negative or
    /// non-finite radii are rejected up front as a config error.
    pub fn random_in_ellipsoid(
        center: Vec3,
        radii: Vec3,
        count: usize,
        attempts_per_point: u32,
        rng: &mut impl Rng,
    ) -> Result<Self, TreeError> {
        if !radii.is_finite() || radii.min_element() < 0.0 {
            return Err(TreeError::config(
                "crown_radii",
                format!("must be finite and non-negative, got {radii}"),
            ));
        }

        let budget = count as u64 * u64::from(attempts_per_point);
        let mut positions = Vec::with_capacity(count);
        let mut attempts = 0u64;

        while positions.len() < count {
            if attempts >= budget {
                return Err(TreeError::AttractorSampling {
                    accepted: positions.len(),
                    requested: count,
                    attempts,
                });
            }
            attempts += 1;

            let candidate = Vec3::new(
                rng.random_range(-radii.x..=radii.x),
                rng.random_range(-radii.y..=radii.y),
                rng.random_range(-radii.z..=radii.z),
            ) + center;
            if good_point(candidate, center, radii) {
                positions.push(candidate);
            }
        }

        tracing::trace!(count, attempts, "sampled attraction points");
        Ok(Self::from_positions(positions))
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn positions(&self) -> impl Iterator<Item = Vec3> + '_ {
        self.points.iter().map(|a| a.pos)
    }
}
