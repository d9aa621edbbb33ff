//! Deployment pipeline and environment lifecycle engine for Skylift.
//!
//! This crate turns a named application into a running, promotable service:
//! it scaffolds source into a git-backed workspace, builds and pushes a
//! container image, deploys to a preview environment, and promotes (or
//! rolls back) that image to production.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐    ┌──────────────┐    ┌──────────────┐
//! │   Platform   │───▶│   Pipeline   │───▶│   Cluster    │
//! │   (facade)   │    │    Runner    │    │   Control    │
//! └──────────────┘    └──────────────┘    └──────────────┘
//!        │                                       ▲
//!        ▼                                       │
//! ┌──────────────┐    ┌──────────────┐           │
//! │   Registry   │    │  Lifecycle   │───────────┘
//! │    Store     │◀───│  Controller  │
//! └──────────────┘    └──────────────┘
//! ```
//!
//! The HTTP layer consuming the [`Platform`] facade is out of scope; long
//! operations hand it an ordered [`skylift_core::EventStream`] terminated by
//! exactly one `done` or `error` event.

pub mod cluster;
pub mod codegen;
mod config;
pub mod env;
pub mod error;
pub mod lifecycle;
pub mod pipeline;
pub mod registry;
pub mod service;
pub mod types;

pub use cluster::{ClusterControl, KubectlCli, MockCluster};
pub use codegen::{extract_files, CodeGenerator, DisabledGenerator, ExtractError, MockGenerator};
pub use config::{ClusterConfig, ControlConfig, RegistryConfig};
pub use env::EnvironmentCheck;
pub use error::{ControlError, ControlResult};
pub use lifecycle::LifecycleController;
pub use pipeline::{PipelineError, PipelineRunner};
pub use registry::{AppStore, JsonStore, MemoryStore};
pub use service::Platform;
pub use types::{app_url, AppRecord, AppStatus, PodStatus, StatusReport};
