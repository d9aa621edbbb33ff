//! Workspace synchronisation and image production for Skylift.
//!
//! This crate provides:
//! - Git-backed workspaces kept in lock-step with a published history
//! - A scaffold template catalog
//! - Container image build and push with line-streamed output
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐    ┌──────────────┐    ┌──────────────┐
//! │   Template   │───▶│  Workspace   │───▶│    Image     │
//! │   Catalog    │    │  (git-backed)│    │  build/push  │
//! └──────────────┘    └──────────────┘    └──────────────┘
//! ```
//!
//! The workspace is the single mutable checkout of an application's source;
//! every mutation is committed and published, and every build first syncs
//! the checkout to the latest published revision so "what gets built" always
//! matches "what was last intentionally committed".

mod config;
pub mod error;
pub mod git;
pub mod image;
pub mod template;
pub mod workspace;

pub use config::BuildConfig;
pub use error::{BuildError, BuildResult};
pub use git::GitCli;
pub use image::{image_tag, DockerCli, ImageBuilder, ImageCall, MockImageBuilder};
pub use template::TemplateCatalog;
pub use workspace::WorkspaceManager;
