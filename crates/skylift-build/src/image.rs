//! Container image build and push.
//!
//! The pipeline depends on the image toolchain only through the
//! [`ImageBuilder`] trait; the concrete implementation shells out to a
//! docker-compatible CLI and relays its output line by line while the
//! process runs.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use skylift_core::process::stream_lines;
use skylift_core::{AppName, BuildVersion, LineSink};
use tokio::process::Command;
use tracing::instrument;

use crate::error::{BuildError, BuildResult};

/// Full image tag for one build of an application.
#[must_use]
pub fn image_tag(registry_host: &str, app: &AppName, version: &BuildVersion) -> String {
    format!("{registry_host}/{app}:{version}")
}

/// Builds and pushes container images, streaming tool output as it is
/// produced.
#[async_trait]
pub trait ImageBuilder: Send + Sync {
    /// Build the image for `app` from `context`, tagged `tag`.
    ///
    /// A non-zero exit surfaces as [`BuildError::ImageBuild`]; push must not
    /// be attempted after a failed build.
    async fn build(
        &self,
        app: &AppName,
        context: &Path,
        tag: &str,
        sink: &LineSink,
    ) -> BuildResult<()>;

    /// Push a previously built tag to the registry.
    async fn push(&self, tag: &str, sink: &LineSink) -> BuildResult<()>;
}

/// Image builder shelling out to a docker-compatible CLI.
#[derive(Debug, Clone)]
pub struct DockerCli {
    program: String,
}

impl DockerCli {
    /// Create a builder using the `docker` binary.
    #[must_use]
    pub fn new() -> Self {
        Self {
            program: "docker".to_owned(),
        }
    }

    /// Use a different docker-compatible binary (podman, nerdctl).
    #[must_use]
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImageBuilder for DockerCli {
    #[instrument(skip(self, context, sink), fields(app = %app, tag = %tag))]
    async fn build(
        &self,
        app: &AppName,
        context: &Path,
        tag: &str,
        sink: &LineSink,
    ) -> BuildResult<()> {
        let mut cmd = Command::new(&self.program);
        cmd.arg("build")
            .arg("--build-arg")
            .arg(format!("APP_NAME={app}"))
            .arg("-t")
            .arg(tag)
            .arg(context);

        let status = stream_lines(cmd, sink)
            .await
            .map_err(|e| BuildError::Internal(e.to_string()))?;
        if status.success() {
            Ok(())
        } else {
            Err(BuildError::ImageBuild {
                tag: tag.to_owned(),
                exit_code: status.code().unwrap_or(-1),
            })
        }
    }

    #[instrument(skip(self, sink), fields(tag = %tag))]
    async fn push(&self, tag: &str, sink: &LineSink) -> BuildResult<()> {
        let mut cmd = Command::new(&self.program);
        cmd.arg("push").arg(tag);

        let status = stream_lines(cmd, sink)
            .await
            .map_err(|e| BuildError::Internal(e.to_string()))?;
        if status.success() {
            Ok(())
        } else {
            Err(BuildError::ImagePush {
                tag: tag.to_owned(),
                exit_code: status.code().unwrap_or(-1),
            })
        }
    }
}

/// Recorded invocation on a [`MockImageBuilder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageCall {
    /// A build for the given tag.
    Build {
        /// The requested image tag.
        tag: String,
    },
    /// A push for the given tag.
    Push {
        /// The requested image tag.
        tag: String,
    },
}

/// Scriptable in-process image builder for tests.
#[derive(Debug, Default)]
pub struct MockImageBuilder {
    fail_build: bool,
    fail_push: bool,
    calls: Mutex<Vec<ImageCall>>,
}

impl MockImageBuilder {
    /// Create a mock where every operation succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make builds exit non-zero.
    #[must_use]
    pub fn with_build_failure(mut self) -> Self {
        self.fail_build = true;
        self
    }

    /// Make pushes exit non-zero.
    #[must_use]
    pub fn with_push_failure(mut self) -> Self {
        self.fail_push = true;
        self
    }

    /// Invocations observed so far.
    pub fn calls(&self) -> Vec<ImageCall> {
        self.calls.lock().expect("mock lock poisoned").clone()
    }
}

#[async_trait]
impl ImageBuilder for MockImageBuilder {
    async fn build(
        &self,
        _app: &AppName,
        _context: &Path,
        tag: &str,
        sink: &LineSink,
    ) -> BuildResult<()> {
        self.calls
            .lock()
            .expect("mock lock poisoned")
            .push(ImageCall::Build {
                tag: tag.to_owned(),
            });

        sink.line(format!("Step 1/1 : building {tag}"));
        if self.fail_build {
            sink.line("error: build step failed");
            return Err(BuildError::ImageBuild {
                tag: tag.to_owned(),
                exit_code: 1,
            });
        }
        sink.line(format!("Successfully tagged {tag}"));
        Ok(())
    }

    async fn push(&self, tag: &str, sink: &LineSink) -> BuildResult<()> {
        self.calls
            .lock()
            .expect("mock lock poisoned")
            .push(ImageCall::Push {
                tag: tag.to_owned(),
            });

        if self.fail_push {
            sink.line("error: denied");
            return Err(BuildError::ImagePush {
                tag: tag.to_owned(),
                exit_code: 1,
            });
        }
        sink.line(format!("{tag}: pushed"));
        Ok(())
    }
}
