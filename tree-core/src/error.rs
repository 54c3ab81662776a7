use thiserror::Error;

/// Errors surfaced by tree construction and geometry emission.
///
/// Degenerate growth steps and missing rings are not errors; they are
/// skipped where they occur. Everything here aborts the whole operation.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TreeError {
    #[error("invalid config: `{field}` {reason}")]
    InvalidConfig { field: &'static str, reason: String },

    #[error(
        "attractor sampling gave up after {attempts} attempts with {accepted} of {requested} points accepted"
    )]
    AttractorSampling {
        accepted: usize,
        requested: usize,
        attempts: u64,
    },

    #[error("{vertices} vertices cannot be addressed by an index buffer holding at most {max}")]
    IndexOverflow { vertices: usize, max: usize },
}

impl TreeError {
    pub(crate) fn config(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field,
            reason: reason.into(),
        }
    }
}
