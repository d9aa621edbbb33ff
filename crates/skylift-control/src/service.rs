//! The platform service facade.
//!
//! [`Platform`] exposes the operations the HTTP layer consumes: create,
//! generate, build, publish, rollback, status, logs and teardown. Long
//! operations return an [`EventStream`]; everything else returns a
//! synchronous result.
//!
//! Pipeline operations (build, publish, rollback, teardown) are serialised
//! per application through a per-name gate, so a concurrent build and
//! publish cannot race on one registry entry. Operations for different
//! applications proceed concurrently.

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;
use skylift_build::{BuildError, ImageBuilder, WorkspaceManager};
use skylift_core::{event, AppName, BuildVersion, Environment, EventStream, TemplateKind};
use tokio::sync::Mutex;
use tracing::{info, instrument};

use crate::cluster::ClusterControl;
use crate::codegen::{extract_files, CodeGenerator};
use crate::config::ControlConfig;
use crate::error::{ControlError, ControlResult};
use crate::lifecycle::LifecycleController;
use crate::pipeline::PipelineRunner;
use crate::registry::AppStore;
use crate::types::{AppRecord, AppStatus, StatusReport};

/// The deployment platform engine.
pub struct Platform {
    config: ControlConfig,
    store: Arc<dyn AppStore>,
    cluster: Arc<dyn ClusterControl>,
    generator: Arc<dyn CodeGenerator>,
    workspaces: Arc<WorkspaceManager>,
    pipeline: Arc<PipelineRunner>,
    lifecycle: Arc<LifecycleController>,
    gates: DashMap<AppName, Arc<Mutex<()>>>,
}

impl Platform {
    /// Wire the platform from configuration and collaborators.
    pub fn new(
        config: ControlConfig,
        store: Arc<dyn AppStore>,
        cluster: Arc<dyn ClusterControl>,
        images: Arc<dyn ImageBuilder>,
        generator: Arc<dyn CodeGenerator>,
    ) -> Self {
        let workspaces = Arc::new(WorkspaceManager::new(&config.build));
        let pipeline = Arc::new(PipelineRunner::new(
            Arc::clone(&workspaces),
            images,
            Arc::clone(&cluster),
            config.build.registry_host.clone(),
            config.cluster.rollout_timeout(),
        ));
        let lifecycle = Arc::new(LifecycleController::new(
            Arc::clone(&store),
            Arc::clone(&cluster),
            config.build.registry_host.clone(),
            config.cluster.rollout_timeout(),
        ));

        Self {
            config,
            store,
            cluster,
            generator,
            workspaces,
            pipeline,
            lifecycle,
            gates: DashMap::new(),
        }
    }

    /// The per-application gate serialising pipeline operations.
    fn gate_handle(&self, app: &AppName) -> Arc<Mutex<()>> {
        let entry = self.gates.entry(app.clone()).or_default();
        Arc::clone(entry.value())
    }

    /// Template kinds available for new applications.
    #[must_use]
    pub fn templates(&self) -> Vec<TemplateKind> {
        self.workspaces.catalog().available()
    }

    /// Create an application: namespace, history, scaffolded workspace and
    /// registry entry.
    #[instrument(skip(self, description))]
    pub async fn create_app(
        &self,
        name: &str,
        template: &str,
        description: &str,
    ) -> ControlResult<AppRecord> {
        let name = AppName::parse(name)?;
        let template = TemplateKind::parse(template)
            .ok_or_else(|| ControlError::Validation(format!("unknown template: {template}")))?;

        if self.store.get(&name).await.is_ok() {
            return Err(ControlError::Conflict(name.to_string()));
        }

        self.cluster.create_namespace(&name).await?;
        self.cluster
            .create_env_configmap(
                &name,
                &BTreeMap::from([("APP_NAME".to_owned(), name.to_string())]),
            )
            .await?;

        self.workspaces.initialize(&name).await.map_err(|e| match e {
            BuildError::WorkspaceConflict { app } => ControlError::Conflict(app),
            other => other.into(),
        })?;
        self.workspaces.scaffold(&name, template).await?;

        let record = AppRecord::new(
            name.clone(),
            template,
            description,
            self.workspaces.history_path(&name),
            &self.config.cluster.server_ip,
        );
        self.store.insert(&record).await?;

        info!(app = %name, template = %template, "application created");
        Ok(record)
    }

    /// Generate code for an application from a free-text instruction.
    ///
    /// The stream relays generator chunks; on completion the extracted file
    /// set is committed to the workspace and the terminal event lists the
    /// written paths.
    pub async fn generate(&self, name: &AppName, instruction: &str) -> ControlResult<EventStream> {
        let record = self.store.get(name).await?;
        let existing = self.workspaces.snapshot(name).await?;

        let generator = Arc::clone(&self.generator);
        let workspaces = Arc::clone(&self.workspaces);
        let app = name.clone();
        let template = record.template;
        let instruction = instruction.to_owned();

        Ok(event::spawn(move |sink| async move {
            let text = generator
                .generate(&app, template, &instruction, &existing, &sink)
                .await
                .map_err(|e| e.to_string())?;

            let files = extract_files(&text).map_err(|e| e.to_string())?;
            let committed = workspaces
                .apply_files(&app, &files)
                .await
                .map_err(|e| e.to_string())?;

            Ok::<_, String>(serde_json::json!({
                "files": files.keys().cloned().collect::<Vec<String>>(),
                "committed": committed,
            }))
        }))
    }

    /// Build the application and deploy it to preview.
    ///
    /// Stamps a fresh version, runs the pipeline on its own task and
    /// returns the event stream immediately. The registry's preview version
    /// advances only after the whole pipeline succeeded.
    pub async fn build(&self, name: &AppName) -> ControlResult<EventStream> {
        let record = self.store.get(name).await?;
        let version = BuildVersion::stamp();

        let gate = self.gate_handle(name);
        let pipeline = Arc::clone(&self.pipeline);
        let store = Arc::clone(&self.store);
        let app = name.clone();
        let preview_url = record.preview_url;

        Ok(event::spawn(move |sink| async move {
            let _guard = gate.lock_owned().await;

            let tag = pipeline
                .run(&app, &version, &sink)
                .await
                .map_err(|e| e.to_string())?;

            store
                .update(&app, {
                    let version = version.clone();
                    Box::new(move |rec| {
                        rec.preview_version = Some(version);
                        rec.status = AppStatus::BuiltPreview;
                    })
                })
                .await
                .map_err(|e| e.to_string())?;

            Ok::<_, String>(serde_json::json!({
                "version": version.as_str(),
                "tag": tag,
                "preview_url": preview_url,
            }))
        }))
    }

    /// Promote the current preview build to production.
    pub async fn publish(&self, name: &AppName) -> ControlResult<AppRecord> {
        let _guard = self.gate_handle(name).lock_owned().await;
        self.lifecycle.promote(name).await
    }

    /// Roll production back to the version before the last promotion.
    pub async fn rollback(&self, name: &AppName) -> ControlResult<AppRecord> {
        let _guard = self.gate_handle(name).lock_owned().await;
        self.lifecycle.rollback(name).await
    }

    /// The registry entry merged with live pod status.
    pub async fn status(&self, name: &AppName) -> ControlResult<StatusReport> {
        let record = self.store.get(name).await?;
        let preview = self.cluster.pod_status(name, Environment::Preview).await?;
        let prod = self.cluster.pod_status(name, Environment::Prod).await?;
        Ok(StatusReport {
            record,
            preview,
            prod,
        })
    }

    /// Stream pod logs for one environment.
    pub async fn logs(&self, name: &AppName, env: Environment) -> ControlResult<EventStream> {
        self.store.get(name).await?;

        let cluster = Arc::clone(&self.cluster);
        let app = name.clone();

        Ok(event::spawn(move |sink| async move {
            cluster
                .stream_logs(&app, env, &sink)
                .await
                .map_err(|e| e.to_string())?;
            Ok::<_, String>(serde_json::Value::Null)
        }))
    }

    /// Every registry entry, ordered by name.
    pub async fn list_apps(&self) -> ControlResult<Vec<AppRecord>> {
        self.store.list().await
    }

    /// The application's current workspace file set.
    pub async fn workspace_files(
        &self,
        name: &AppName,
    ) -> ControlResult<BTreeMap<String, String>> {
        self.store.get(name).await?;
        Ok(self.workspaces.snapshot(name).await?)
    }

    /// Remove the application entirely: cluster resources, workspace,
    /// history and registry entry.
    #[instrument(skip(self), fields(app = %name))]
    pub async fn teardown(&self, name: &AppName) -> ControlResult<()> {
        self.store.get(name).await?;
        let _guard = self.gate_handle(name).lock_owned().await;

        self.cluster.delete_namespace(name).await?;
        self.workspaces.destroy(name).await?;
        self.store.remove(name).await?;
        self.gates.remove(name);

        info!("application torn down");
        Ok(())
    }
}

impl std::fmt::Debug for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Platform").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::MockCluster;
    use crate::codegen::MockGenerator;
    use crate::registry::MemoryStore;
    use skylift_build::MockImageBuilder;
    use skylift_core::PipelineEvent;

    fn platform_with(generator: MockGenerator) -> (Platform, tempfile::TempDir) {
        let root = tempfile::tempdir().expect("tempdir");
        let mut config = ControlConfig::default();
        config.build.git_base = root.path().join("apps");
        config.build.templates_dir = root.path().join("templates");
        config.registry.file = root.path().join("registry.json");

        let platform = Platform::new(
            config,
            Arc::new(MemoryStore::new()),
            Arc::new(MockCluster::new()),
            Arc::new(MockImageBuilder::new()),
            Arc::new(generator),
        );
        (platform, root)
    }

    fn platform() -> (Platform, tempfile::TempDir) {
        platform_with(MockGenerator::new("no files here"))
    }

    #[tokio::test]
    async fn create_app_rejects_bad_names_and_templates() {
        let (platform, _root) = platform();

        let result = platform.create_app("bad/name", "simple-api", "").await;
        assert!(matches!(result, Err(ControlError::Validation(_))));

        let result = platform.create_app("demo", "mystery", "").await;
        assert!(matches!(result, Err(ControlError::Validation(_))));
    }

    #[tokio::test]
    async fn operations_on_unknown_app_are_not_found() {
        let (platform, _root) = platform();
        let name = AppName::parse("ghost").expect("valid name");

        assert!(matches!(
            platform.build(&name).await,
            Err(ControlError::NotFound(_))
        ));
        assert!(matches!(
            platform.publish(&name).await,
            Err(ControlError::NotFound(_))
        ));
        assert!(matches!(
            platform.status(&name).await,
            Err(ControlError::NotFound(_))
        ));
        assert!(matches!(
            platform.teardown(&name).await,
            Err(ControlError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn generate_without_file_blocks_errors_on_stream() {
        let (platform, _root) = platform_with(MockGenerator::new("I have nothing for you"));
        let name = AppName::parse("demo").expect("valid name");

        // Seed the registry directly; generation does not need a workspace
        // to reach the extraction failure.
        let record = AppRecord::new(
            name.clone(),
            TemplateKind::SimpleApi,
            "",
            "/tmp/demo.git",
            "127.0.0.1",
        );
        platform.store.insert(&record).await.expect("insert");

        let stream = platform.generate(&name, "add a route").await.expect("stream");
        let events = stream.collect().await;

        assert!(matches!(
            events.last(),
            Some(PipelineEvent::Error { message }) if message.contains("no file blocks")
        ));
    }

    #[tokio::test]
    async fn logs_stream_relays_pod_output() {
        let root = tempfile::tempdir().expect("tempdir");
        let mut config = ControlConfig::default();
        config.build.git_base = root.path().join("apps");
        config.build.templates_dir = root.path().join("templates");

        let platform = Platform::new(
            config,
            Arc::new(MemoryStore::new()),
            Arc::new(MockCluster::with_log_lines(vec![
                "starting".to_owned(),
                "listening on :8080".to_owned(),
            ])),
            Arc::new(MockImageBuilder::new()),
            Arc::new(MockGenerator::new("")),
        );

        let name = AppName::parse("demo").expect("valid name");
        let record = AppRecord::new(
            name.clone(),
            TemplateKind::SimpleApi,
            "",
            "/tmp/demo.git",
            "127.0.0.1",
        );
        platform.store.insert(&record).await.expect("insert");

        let events = platform
            .logs(&name, Environment::Preview)
            .await
            .expect("stream")
            .collect()
            .await;

        assert_eq!(
            events,
            vec![
                PipelineEvent::Log {
                    line: "starting".to_owned()
                },
                PipelineEvent::Log {
                    line: "listening on :8080".to_owned()
                },
                PipelineEvent::Done {
                    payload: serde_json::Value::Null
                },
            ]
        );
    }
}
