//! Space-colonization tree growth and tube meshing.
//!
//! Main components:
//! - [`tree`] — the node graph and the growth driver.
//! - [`phases`] — attraction, growth and kill phases of one growth step.
//! - [`attractor`] — attraction points and ellipsoid sampling.
//! - [`influence_buffer`] — per-node accumulation of attraction pull.
//! - [`rmf`] — rotation-minimizing frame transport.
//! - [`mesh`] — cross-section rings, tube emission and vertex welding.
//! - [`frames`], [`bezier`], [`sphere`], [`twig`] — auxiliary geometry.
//! - [`config`], [`error`], [`math`], [`types`] — shared plumbing.

pub mod attractor;
pub mod bezier;
pub mod config;
pub mod error;
pub mod frames;
pub mod influence_buffer;
pub mod math;
pub mod mesh;
pub mod phases;
pub mod rmf;
pub mod sphere;
pub mod tree;
pub mod twig;
pub mod types;

pub use config::Config;
pub use error::TreeError;
pub use mesh::{IndexFormat, IndexedMesh, Mesh, Vertex};
pub use tree::{GrowthOutcome, Tree, TreeNode};
