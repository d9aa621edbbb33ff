//! Error types for the control plane.

use thiserror::Error;

use crate::codegen::ExtractError;
use crate::pipeline::PipelineError;

/// Result type alias using [`ControlError`].
pub type ControlResult<T> = Result<T, ControlError>;

/// Errors that can occur in the control plane.
///
/// Every failure is scoped to one application's one operation; nothing here
/// is fatal to the process.
#[derive(Debug, Error)]
pub enum ControlError {
    /// Unknown application.
    #[error("application not found: {0}")]
    NotFound(String),

    /// Duplicate creation.
    #[error("application already exists: {0}")]
    Conflict(String),

    /// Bad name or template.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Promotion requested without a preview build.
    #[error("no preview build to promote for {0}")]
    NothingToPromote(String),

    /// Promotion failed; automatic revert was attempted when possible.
    #[error("promotion of {app} failed: {reason} ({})", if *reverted { "reverted to previous version" } else { "no previous version to revert to" })]
    PromotionFailed {
        /// Application name.
        app: String,
        /// What went wrong.
        reason: String,
        /// Whether the previous production version was re-applied.
        reverted: bool,
    },

    /// A rollout did not become ready within its bounded wait.
    #[error("rollout of {deployment} not ready within {timeout_secs}s")]
    RolloutTimeout {
        /// The deployment that failed to become ready.
        deployment: String,
        /// The configured wait bound.
        timeout_secs: u64,
    },

    /// Workspace or image operation failed.
    #[error(transparent)]
    Build(#[from] skylift_build::BuildError),

    /// A pipeline phase failed.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// A cluster CLI invocation failed.
    #[error("cluster {op} failed: {detail}")]
    Cluster {
        /// The failing operation.
        op: String,
        /// Captured process output.
        detail: String,
    },

    /// The code generation backend failed.
    #[error("code generation failed: {0}")]
    Generation(String),

    /// Generated output contained no usable files.
    #[error(transparent)]
    Extraction(#[from] ExtractError),

    /// Registry store failure.
    #[error("registry store error: {0}")]
    Store(String),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ControlError {
    /// Create a cluster error.
    #[must_use]
    pub fn cluster(op: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Cluster {
            op: op.into(),
            detail: detail.into(),
        }
    }

    /// Create a store error.
    #[must_use]
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Create an internal error.
    #[must_use]
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl From<skylift_core::InvalidAppName> for ControlError {
    fn from(e: skylift_core::InvalidAppName) -> Self {
        Self::Validation(e.to_string())
    }
}
