//! Build pipeline state machine.
//!
//! One invocation drives `Syncing → Building → Pushing → Deploying` for the
//! preview environment, streaming tool output as it is produced. Each phase
//! failure names the phase and aborts the invocation. Nothing here touches
//! the registry; the caller records the preview version only after the
//! whole pipeline succeeded.

use std::sync::Arc;
use std::time::Duration;

use skylift_core::{AppName, BuildVersion, Environment, LineSink};
use skylift_build::{image_tag, BuildError, ImageBuilder, WorkspaceManager};
use thiserror::Error;
use tracing::{info, instrument};

use crate::cluster::ClusterControl;

/// A pipeline phase failure, naming the phase.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Workspace synchronisation failed.
    #[error("sync failed: {0}")]
    Sync(#[source] BuildError),

    /// The image build failed; push and deploy were not attempted.
    #[error("build failed: {0}")]
    Build(#[source] BuildError),

    /// The image push failed; the image remains local and undeployable.
    #[error("push failed: {0}")]
    Push(#[source] BuildError),

    /// The preview deployment did not become ready.
    #[error("rollout failed: {detail}")]
    Rollout {
        /// What the orchestrator reported.
        detail: String,
    },
}

/// Drives the build→push→deploy sequence for the preview environment.
pub struct PipelineRunner {
    workspaces: Arc<WorkspaceManager>,
    images: Arc<dyn ImageBuilder>,
    cluster: Arc<dyn ClusterControl>,
    registry_host: String,
    rollout_timeout: Duration,
}

impl PipelineRunner {
    /// Create a runner over the given collaborators.
    pub fn new(
        workspaces: Arc<WorkspaceManager>,
        images: Arc<dyn ImageBuilder>,
        cluster: Arc<dyn ClusterControl>,
        registry_host: impl Into<String>,
        rollout_timeout: Duration,
    ) -> Self {
        Self {
            workspaces,
            images,
            cluster,
            registry_host: registry_host.into(),
            rollout_timeout,
        }
    }

    /// Run one full pipeline invocation, returning the pushed image tag.
    ///
    /// No intermediate state is persisted between invocations; a retry
    /// repeats the whole pipeline.
    #[instrument(skip(self, sink), fields(app = %app, version = %version))]
    pub async fn run(
        &self,
        app: &AppName,
        version: &BuildVersion,
        sink: &LineSink,
    ) -> Result<String, PipelineError> {
        sink.line(format!("=== Syncing workspace for {app} ==="));
        self.workspaces.sync(app).await.map_err(PipelineError::Sync)?;

        let tag = image_tag(&self.registry_host, app, version);
        let context = self.workspaces.workspace_path(app);

        sink.line(format!("=== Building {tag} ==="));
        self.images
            .build(app, &context, &tag, sink)
            .await
            .map_err(PipelineError::Build)?;

        sink.line(format!("=== Pushing {tag} ==="));
        self.images
            .push(&tag, sink)
            .await
            .map_err(PipelineError::Push)?;

        sink.line("=== Deploying to preview ===".to_owned());
        self.cluster
            .deploy(app, Environment::Preview, &tag)
            .await
            .map_err(|e| PipelineError::Rollout {
                detail: e.to_string(),
            })?;

        let ready = self
            .cluster
            .rollout_status(app, Environment::Preview, self.rollout_timeout)
            .await
            .map_err(|e| PipelineError::Rollout {
                detail: e.to_string(),
            })?;
        if !ready {
            return Err(PipelineError::Rollout {
                detail: format!(
                    "preview rollout not ready within {}s",
                    self.rollout_timeout.as_secs()
                ),
            });
        }

        info!(tag = %tag, "pipeline succeeded");
        Ok(tag)
    }
}

impl std::fmt::Debug for PipelineRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineRunner")
            .field("registry_host", &self.registry_host)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::MockCluster;
    use skylift_build::{BuildConfig, ImageCall, MockImageBuilder};
    use skylift_core::TemplateKind;

    fn git_available() -> bool {
        std::process::Command::new("git")
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    struct Fixture {
        _root: tempfile::TempDir,
        workspaces: Arc<WorkspaceManager>,
        app: AppName,
    }

    async fn fixture() -> Fixture {
        let root = tempfile::tempdir().expect("tempdir");
        let templates = root.path().join("templates");
        std::fs::create_dir_all(templates.join("simple-api")).expect("mkdir");
        std::fs::write(templates.join("simple-api/Dockerfile"), "FROM scratch\n")
            .expect("write");

        let config = BuildConfig {
            git_base: root.path().join("apps"),
            templates_dir: templates,
            registry_host: "localhost:5050".to_owned(),
        };
        std::fs::create_dir_all(&config.git_base).expect("mkdir");

        let workspaces = Arc::new(WorkspaceManager::new(&config));
        let app = AppName::parse("demo").expect("valid name");

        workspaces.initialize(&app).await.expect("initialize");
        workspaces
            .scaffold(&app, TemplateKind::SimpleApi)
            .await
            .expect("scaffold");

        Fixture {
            _root: root,
            workspaces,
            app,
        }
    }

    fn runner(
        fx: &Fixture,
        images: Arc<MockImageBuilder>,
        cluster: Arc<MockCluster>,
    ) -> PipelineRunner {
        PipelineRunner::new(
            Arc::clone(&fx.workspaces),
            images,
            cluster,
            "localhost:5050",
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn successful_run_deploys_preview() {
        if !git_available() {
            return;
        }
        let fx = fixture().await;
        let images = Arc::new(MockImageBuilder::new());
        let cluster = Arc::new(MockCluster::new());
        let runner = runner(&fx, Arc::clone(&images), Arc::clone(&cluster));

        let version = BuildVersion::new("20260101.000000");
        let app = fx.app.clone();
        let stream = skylift_core::event::spawn({
            move |sink| async move {
                let tag = runner.run(&app, &version, &sink).await.map_err(|e| e.to_string())?;
                Ok::<_, String>(serde_json::json!({ "tag": tag }))
            }
        });

        let events = stream.collect().await;
        assert!(matches!(
            events.last(),
            Some(skylift_core::PipelineEvent::Done { payload })
                if payload["tag"] == "localhost:5050/demo:20260101.000000"
        ));

        assert_eq!(
            cluster.current_image(&fx.app, Environment::Preview).as_deref(),
            Some("localhost:5050/demo:20260101.000000")
        );
        assert_eq!(
            images.calls(),
            vec![
                ImageCall::Build {
                    tag: "localhost:5050/demo:20260101.000000".to_owned()
                },
                ImageCall::Push {
                    tag: "localhost:5050/demo:20260101.000000".to_owned()
                },
            ]
        );
    }

    #[tokio::test]
    async fn failed_build_never_pushes_or_deploys() {
        if !git_available() {
            return;
        }
        let fx = fixture().await;
        let images = Arc::new(MockImageBuilder::new().with_build_failure());
        let cluster = Arc::new(MockCluster::new());
        let runner = runner(&fx, Arc::clone(&images), Arc::clone(&cluster));

        let result = {
            let stream = skylift_core::event::spawn({
                let app = fx.app.clone();
                move |sink| async move {
                    runner
                        .run(&app, &BuildVersion::new("20260101.000000"), &sink)
                        .await
                        .map_err(|e| e.to_string())?;
                    Ok::<_, String>(serde_json::Value::Null)
                }
            });
            stream.collect().await
        };

        assert!(matches!(
            result.last(),
            Some(skylift_core::PipelineEvent::Error { message }) if message.contains("build failed")
        ));
        assert_eq!(images.calls().len(), 1, "push must not be attempted");
        assert!(cluster.image_history(&fx.app, Environment::Preview).is_empty());
    }

    #[tokio::test]
    async fn failed_push_does_not_deploy() {
        if !git_available() {
            return;
        }
        let fx = fixture().await;
        let images = Arc::new(MockImageBuilder::new().with_push_failure());
        let cluster = Arc::new(MockCluster::new());
        let runner = runner(&fx, images, Arc::clone(&cluster));

        let mut stream = skylift_core::event::spawn({
            let app = fx.app.clone();
            move |sink| async move {
                runner
                    .run(&app, &BuildVersion::new("20260101.000000"), &sink)
                    .await
                    .map_err(|e| e.to_string())?;
                Ok::<_, String>(serde_json::Value::Null)
            }
        });

        let mut saw_error = false;
        while let Some(event) = stream.recv().await {
            if let skylift_core::PipelineEvent::Error { message } = event {
                assert!(message.contains("push failed"));
                saw_error = true;
            }
        }
        assert!(saw_error);
        assert!(cluster.image_history(&fx.app, Environment::Preview).is_empty());
    }

    #[tokio::test]
    async fn unready_rollout_is_a_rollout_error() {
        if !git_available() {
            return;
        }
        let fx = fixture().await;
        let images = Arc::new(MockImageBuilder::new());
        let cluster = Arc::new(MockCluster::new());
        cluster.queue_rollout_result(false);
        let runner = runner(&fx, images, Arc::clone(&cluster));

        let sink_events = skylift_core::event::spawn({
            let app = fx.app.clone();
            move |sink| async move {
                runner
                    .run(&app, &BuildVersion::new("20260101.000000"), &sink)
                    .await
                    .map_err(|e| e.to_string())?;
                Ok::<_, String>(serde_json::Value::Null)
            }
        })
        .collect()
        .await;

        assert!(matches!(
            sink_events.last(),
            Some(skylift_core::PipelineEvent::Error { message }) if message.contains("rollout")
        ));
    }
}
