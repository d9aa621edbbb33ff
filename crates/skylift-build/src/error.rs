//! Error types for workspace and image operations.

use thiserror::Error;

/// Errors that can occur while managing workspaces or building images.
#[derive(Debug, Error)]
pub enum BuildError {
    // ─────────────────────────────────────────────────────────────────────────
    // Workspace errors
    // ─────────────────────────────────────────────────────────────────────────
    /// A workspace and history already exist for this application.
    #[error("workspace already exists for application {app}")]
    WorkspaceConflict {
        /// Application name.
        app: String,
    },

    /// The workspace has not been scaffolded yet.
    #[error("workspace not found for application {app}")]
    WorkspaceMissing {
        /// Application name.
        app: String,
    },

    /// A file path in an apply request escapes the workspace.
    #[error("refusing path outside workspace: {path}")]
    PathEscape {
        /// The offending relative path.
        path: String,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Template errors
    // ─────────────────────────────────────────────────────────────────────────
    /// The requested scaffold template is not in the catalog.
    #[error("unknown template: {name}")]
    UnknownTemplate {
        /// The requested template name.
        name: String,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Version control errors
    // ─────────────────────────────────────────────────────────────────────────
    /// A git invocation failed.
    #[error("git {op} failed: {stderr}")]
    Vcs {
        /// The git subcommand that failed.
        op: String,
        /// Captured stderr from the process.
        stderr: String,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Image errors
    // ─────────────────────────────────────────────────────────────────────────
    /// The container image build exited non-zero.
    #[error("image build failed for {tag} (exit code {exit_code})")]
    ImageBuild {
        /// The image tag being built.
        tag: String,
        /// Exit code of the builder process.
        exit_code: i32,
    },

    /// The container image push exited non-zero.
    #[error("image push failed for {tag} (exit code {exit_code})")]
    ImagePush {
        /// The image tag being pushed.
        tag: String,
        /// Exit code of the push process.
        exit_code: i32,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Internal errors
    // ─────────────────────────────────────────────────────────────────────────
    /// Filesystem operation failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type alias for build operations.
pub type BuildResult<T> = Result<T, BuildError>;
