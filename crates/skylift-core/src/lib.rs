//! Shared types and event streaming for the Skylift platform.
//!
//! This crate provides the vocabulary used across Skylift services:
//!
//! - **Types**: validated application names, sortable build versions,
//!   template kinds and environments
//! - **Events**: the ordered event stream bridging blocking external
//!   processes to asynchronous observers
//! - **Processes**: line-streamed subprocess execution feeding those
//!   event streams

pub mod event;
pub mod process;
pub mod types;

pub use event::{EventStream, LineSink, PipelineEvent};
pub use process::{stream_lines, ProcessError};
pub use types::{AppName, BuildVersion, Environment, InvalidAppName, TemplateKind};
