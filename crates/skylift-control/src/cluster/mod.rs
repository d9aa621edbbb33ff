//! Cluster control plane abstraction.
//!
//! The platform depends on the orchestrator only through the
//! [`ClusterControl`] trait. The primary implementation shells out to
//! `kubectl`; a scriptable in-process implementation backs the tests.

mod kubectl;
pub mod manifest;

pub use kubectl::KubectlCli;

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use skylift_core::{AppName, Environment, LineSink};

use crate::error::{ControlError, ControlResult};
use crate::types::PodStatus;

/// Narrow contract over the cluster orchestrator.
#[async_trait]
pub trait ClusterControl: Send + Sync {
    /// Create the application's namespace with quota, network policy and
    /// platform access.
    async fn create_namespace(&self, app: &AppName) -> ControlResult<()>;

    /// Delete the application's namespace and everything in it.
    /// Idempotent: an absent namespace is not an error.
    async fn delete_namespace(&self, app: &AppName) -> ControlResult<()>;

    /// Create or update the application's environment config map.
    async fn create_env_configmap(
        &self,
        app: &AppName,
        vars: &BTreeMap<String, String>,
    ) -> ControlResult<()>;

    /// Apply the full deployment manifest for one environment with the
    /// given image. Creates the deployment when absent, updates otherwise.
    async fn deploy(&self, app: &AppName, env: Environment, image: &str) -> ControlResult<()>;

    /// Update only the container image of an existing deployment.
    async fn set_image(&self, app: &AppName, env: Environment, image: &str) -> ControlResult<()>;

    /// Wait for rollout readiness up to `timeout`.
    ///
    /// Returns `Ok(false)` on timeout or a failed rollout; `Err` only when
    /// the orchestrator could not be asked at all.
    async fn rollout_status(
        &self,
        app: &AppName,
        env: Environment,
        timeout: Duration,
    ) -> ControlResult<bool>;

    /// Revert a deployment to its immediately preceding revision using the
    /// orchestrator's native history.
    async fn rollout_undo(&self, app: &AppName, env: Environment) -> ControlResult<()>;

    /// Live pod state for one environment.
    async fn pod_status(&self, app: &AppName, env: Environment) -> ControlResult<PodStatus>;

    /// Stream pod logs into `sink` until the log stream ends or the
    /// consumer goes away.
    async fn stream_logs(
        &self,
        app: &AppName,
        env: Environment,
        sink: &LineSink,
    ) -> ControlResult<()>;
}

#[derive(Debug, Default)]
struct MockClusterState {
    namespaces: BTreeSet<String>,
    /// Applied image history per app/environment, newest last.
    images: HashMap<(String, Environment), Vec<String>>,
    /// Scripted results for upcoming rollout waits; `true` when exhausted.
    rollout_results: VecDeque<bool>,
    undo_calls: Vec<(String, Environment)>,
    configmaps: Vec<String>,
}

/// Scriptable in-process cluster for tests.
///
/// Tracks the applied image history per deployment so tests can assert on
/// what production actually ran, including after reverts. `rollout_undo`
/// pops the newest applied image, restoring the previous one, mirroring a
/// one-step revision undo.
#[derive(Debug, Default)]
pub struct MockCluster {
    state: Mutex<MockClusterState>,
    log_lines: Vec<String>,
}

impl MockCluster {
    /// Create a cluster where every operation succeeds and every rollout
    /// becomes ready.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a cluster whose log streams replay the given lines.
    #[must_use]
    pub fn with_log_lines(lines: Vec<String>) -> Self {
        Self {
            state: Mutex::default(),
            log_lines: lines,
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MockClusterState> {
        self.state.lock().expect("mock lock poisoned")
    }

    /// Script the outcome of the next rollout wait (FIFO).
    pub fn queue_rollout_result(&self, ready: bool) {
        self.state().rollout_results.push_back(ready);
    }

    /// The image a deployment currently runs, if any.
    #[must_use]
    pub fn current_image(&self, app: &AppName, env: Environment) -> Option<String> {
        self.state()
            .images
            .get(&(app.to_string(), env))
            .and_then(|history| history.last().cloned())
    }

    /// Every image ever applied to a deployment, oldest first.
    #[must_use]
    pub fn image_history(&self, app: &AppName, env: Environment) -> Vec<String> {
        self.state()
            .images
            .get(&(app.to_string(), env))
            .cloned()
            .unwrap_or_default()
    }

    /// Number of native undo operations issued against a deployment.
    #[must_use]
    pub fn undo_count(&self, app: &AppName, env: Environment) -> usize {
        let key = (app.to_string(), env);
        self.state()
            .undo_calls
            .iter()
            .filter(|call| **call == key)
            .count()
    }

    /// Whether the application's namespace exists.
    #[must_use]
    pub fn has_namespace(&self, app: &AppName) -> bool {
        self.state().namespaces.contains(app.as_str())
    }
}

#[async_trait]
impl ClusterControl for MockCluster {
    async fn create_namespace(&self, app: &AppName) -> ControlResult<()> {
        self.state().namespaces.insert(app.to_string());
        Ok(())
    }

    async fn delete_namespace(&self, app: &AppName) -> ControlResult<()> {
        let mut state = self.state();
        state.namespaces.remove(app.as_str());
        state.images.retain(|(name, _), _| name != app.as_str());
        Ok(())
    }

    async fn create_env_configmap(
        &self,
        app: &AppName,
        _vars: &BTreeMap<String, String>,
    ) -> ControlResult<()> {
        self.state().configmaps.push(format!("{app}-env"));
        Ok(())
    }

    async fn deploy(&self, app: &AppName, env: Environment, image: &str) -> ControlResult<()> {
        self.state()
            .images
            .entry((app.to_string(), env))
            .or_default()
            .push(image.to_owned());
        Ok(())
    }

    async fn set_image(&self, app: &AppName, env: Environment, image: &str) -> ControlResult<()> {
        let mut state = self.state();
        let history = state
            .images
            .get_mut(&(app.to_string(), env))
            .ok_or_else(|| {
                ControlError::cluster("set image", format!("no deployment for {app}-{env}"))
            })?;
        history.push(image.to_owned());
        Ok(())
    }

    async fn rollout_status(
        &self,
        _app: &AppName,
        _env: Environment,
        _timeout: Duration,
    ) -> ControlResult<bool> {
        Ok(self.state().rollout_results.pop_front().unwrap_or(true))
    }

    async fn rollout_undo(&self, app: &AppName, env: Environment) -> ControlResult<()> {
        let mut state = self.state();
        state.undo_calls.push((app.to_string(), env));
        if let Some(history) = state.images.get_mut(&(app.to_string(), env)) {
            history.pop();
        }
        Ok(())
    }

    async fn pod_status(&self, app: &AppName, env: Environment) -> ControlResult<PodStatus> {
        let running = self
            .state()
            .images
            .get(&(app.to_string(), env))
            .is_some_and(|history| !history.is_empty());

        if running {
            Ok(PodStatus {
                phase: "Running".to_owned(),
                restarts: 0,
                ready: true,
            })
        } else {
            Ok(PodStatus::pending())
        }
    }

    async fn stream_logs(
        &self,
        _app: &AppName,
        _env: Environment,
        sink: &LineSink,
    ) -> ControlResult<()> {
        for line in &self.log_lines {
            if !sink.line(line.clone()) {
                break;
            }
        }
        Ok(())
    }
}
