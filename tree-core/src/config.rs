use crate::error::TreeError;
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Parameters for growing and meshing a tree.
///
/// The defaults describe a tree that starts at the origin growing up `+Y`
/// toward an ellipsoidal crown centered 400 units above it.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub attractor_count: usize,
    pub crown_center: Vec3,
    pub crown_radii: Vec3,

    pub root_position: Vec3,
    pub root_tangent: Vec3,
    pub root_normal: Vec3,
    pub root_width: f32,

    /// Attractors closer than this to the tree are consumed.
    pub influence_min_dist: f32,
    /// Attractors farther than this from every node exert no pull.
    pub influence_max_dist: f32,

    pub branch_length: f32,
    pub branch_length_scale: f32,
    pub branch_width_scale: f32,
    /// Weight of a node's current tangent when picking its growth direction.
    pub previous_dir_power: f32,

    pub max_nodes: usize,
    pub max_iterations: usize,
    /// Growth that lands within this distance of an existing node is dropped.
    pub merge_epsilon: f32,
    pub sampling_attempts_per_point: u32,

    /// Points per cross-section ring. Must be even.
    pub circle_res: usize,
    pub weld_epsilon: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            attractor_count: 300,
            crown_center: Vec3::new(0.0, 400.0, 0.0),
            crown_radii: Vec3::new(200.0, 150.0, 200.0),
            root_position: Vec3::ZERO,
            root_tangent: Vec3::Y,
            root_normal: Vec3::Z,
            root_width: 12.0,
            influence_min_dist: 40.0,
            influence_max_dist: 150.0,
            branch_length: 30.0,
            branch_length_scale: 0.99,
            branch_width_scale: 0.9,
            previous_dir_power: 1.0,
            max_nodes: 250,
            max_iterations: 1000,
            merge_epsilon: 0.1,
            sampling_attempts_per_point: 64,
            circle_res: 8,
            weld_epsilon: 1e-3,
        }
    }
}

impl Config {
    /// Checks every parameter up front so growth never meets a bad value.
    pub fn validate(&self) -> Result<(), TreeError> {
        if self.attractor_count == 0 {
            return Err(TreeError::config("attractor_count", "must be at least 1"));
        }
        if !self.crown_center.is_finite() {
            return Err(TreeError::config("crown_center", "must be finite"));
        }
        if !self.crown_radii.is_finite() || self.crown_radii.min_element() <= 0.0 {
            return Err(TreeError::config(
                "crown_radii",
                format!("must be positive on every axis, got {}", self.crown_radii),
            ));
        }
        if !self.root_position.is_finite() {
            return Err(TreeError::config("root_position", "must be finite"));
        }
        if !self.root_tangent.is_finite() || self.root_tangent.length_squared() < 1e-12 {
            return Err(TreeError::config("root_tangent", "must be a non-zero vector"));
        }
        if !self.root_normal.is_finite() || self.root_normal.length_squared() < 1e-12 {
            return Err(TreeError::config("root_normal", "must be a non-zero vector"));
        }
        if self
            .root_tangent
            .normalize()
            .cross(self.root_normal.normalize())
            .length_squared()
            < 1e-6
        {
            return Err(TreeError::config(
                "root_normal",
                "must not be parallel to root_tangent",
            ));
        }

        positive("root_width", self.root_width)?;
        positive("influence_min_dist", self.influence_min_dist)?;
        positive("influence_max_dist", self.influence_max_dist)?;
        if self.influence_min_dist >= self.influence_max_dist {
            return Err(TreeError::config(
                "influence_min_dist",
                format!(
                    "must be below influence_max_dist ({} >= {})",
                    self.influence_min_dist, self.influence_max_dist
                ),
            ));
        }
        positive("branch_length", self.branch_length)?;
        unit_scale("branch_length_scale", self.branch_length_scale)?;
        unit_scale("branch_width_scale", self.branch_width_scale)?;
        if !self.previous_dir_power.is_finite() || self.previous_dir_power < 0.0 {
            return Err(TreeError::config(
                "previous_dir_power",
                "must be finite and non-negative",
            ));
        }

        if self.max_nodes == 0 {
            return Err(TreeError::config("max_nodes", "must be at least 1"));
        }
        if self.max_iterations == 0 {
            return Err(TreeError::config("max_iterations", "must be at least 1"));
        }
        positive("merge_epsilon", self.merge_epsilon)?;
        if self.sampling_attempts_per_point == 0 {
            return Err(TreeError::config(
                "sampling_attempts_per_point",
                "must be at least 1",
            ));
        }

        validate_circle_res(self.circle_res)?;
        positive("weld_epsilon", self.weld_epsilon)?;
        Ok(())
    }
}

pub(crate) fn validate_circle_res(circle_res: usize) -> Result<(), TreeError> {
    if circle_res < 4 || circle_res % 2 != 0 {
        return Err(TreeError::config(
            "circle_res",
            format!("must be even and at least 4, got {circle_res}"),
        ));
    }
    Ok(())
}

fn positive(field: &'static str, value: f32) -> Result<(), TreeError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(TreeError::config(
            field,
            format!("must be positive, got {value}"),
        ));
    }
    Ok(())
}

fn unit_scale(field: &'static str, value: f32) -> Result<(), TreeError> {
    if !value.is_finite() || value <= 0.0 || value > 1.0 {
        return Err(TreeError::config(
            field,
            format!("must lie in (0, 1], got {value}"),
        ));
    }
    Ok(())
}
