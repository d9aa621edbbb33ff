//! Cluster control via the `kubectl` command line.

use std::collections::BTreeMap;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use skylift_core::{stream_lines, AppName, Environment, LineSink};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, instrument};

use crate::error::{ControlError, ControlResult};
use crate::types::PodStatus;

use super::{manifest, ClusterControl};

fn namespace_of(app: &AppName) -> String {
    format!("app-{app}")
}

fn deployment_of(app: &AppName, env: Environment) -> String {
    format!("deployment/{app}-{env}")
}

/// Cluster control shelling out to `kubectl`.
#[derive(Debug, Clone)]
pub struct KubectlCli {
    server_ip: String,
}

impl KubectlCli {
    /// Create a wrapper exposing applications on `server_ip`.
    pub fn new(server_ip: impl Into<String>) -> Self {
        Self {
            server_ip: server_ip.into(),
        }
    }

    /// Run kubectl, optionally feeding `input` to stdin.
    ///
    /// Returns the process output without checking the exit status.
    async fn run_unchecked(
        &self,
        args: &[&str],
        input: Option<&str>,
    ) -> ControlResult<std::process::Output> {
        let mut cmd = Command::new("kubectl");
        cmd.args(args)
            .stdin(if input.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        debug!(args = ?args, "running kubectl");

        let mut child = cmd
            .spawn()
            .map_err(|e| ControlError::cluster(args.join(" "), e.to_string()))?;

        if let Some(input) = input {
            let mut stdin = child
                .stdin
                .take()
                .ok_or_else(|| ControlError::internal("kubectl stdin not piped"))?;
            stdin
                .write_all(input.as_bytes())
                .await
                .map_err(|e| ControlError::cluster(args.join(" "), e.to_string()))?;
            drop(stdin);
        }

        child
            .wait_with_output()
            .await
            .map_err(|e| ControlError::cluster(args.join(" "), e.to_string()))
    }

    /// Run kubectl and treat a non-zero exit as an error.
    async fn run(&self, args: &[&str], input: Option<&str>) -> ControlResult<String> {
        let output = self.run_unchecked(args, input).await?;
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            Err(ControlError::cluster(
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            ))
        }
    }
}

#[async_trait]
impl ClusterControl for KubectlCli {
    #[instrument(skip(self), fields(app = %app))]
    async fn create_namespace(&self, app: &AppName) -> ControlResult<()> {
        let yaml = manifest::namespace(app);
        self.run(&["apply", "-f", "-"], Some(&yaml)).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(app = %app))]
    async fn delete_namespace(&self, app: &AppName) -> ControlResult<()> {
        let ns = namespace_of(app);
        self.run(
            &["delete", "namespace", &ns, "--ignore-not-found=true"],
            None,
        )
        .await?;
        Ok(())
    }

    async fn create_env_configmap(
        &self,
        app: &AppName,
        vars: &BTreeMap<String, String>,
    ) -> ControlResult<()> {
        let ns = namespace_of(app);
        let configmap = format!("{app}-env");
        let literals: Vec<String> = vars
            .iter()
            .map(|(k, v)| format!("--from-literal={k}={v}"))
            .collect();

        // Render client-side, then apply, so repeated creation updates
        // rather than conflicts.
        let mut args = vec![
            "create",
            "configmap",
            configmap.as_str(),
            "-n",
            ns.as_str(),
            "--save-config",
            "--dry-run=client",
            "-o",
            "yaml",
        ];
        args.extend(literals.iter().map(String::as_str));

        let yaml = self.run(&args, None).await?;
        self.run(&["apply", "-f", "-"], Some(&yaml)).await?;
        Ok(())
    }

    #[instrument(skip(self, image), fields(app = %app, env = %env))]
    async fn deploy(&self, app: &AppName, env: Environment, image: &str) -> ControlResult<()> {
        let yaml = manifest::deployment(app, env, image, &self.server_ip);
        self.run(&["apply", "-f", "-"], Some(&yaml)).await?;
        Ok(())
    }

    #[instrument(skip(self, image), fields(app = %app, env = %env))]
    async fn set_image(&self, app: &AppName, env: Environment, image: &str) -> ControlResult<()> {
        let ns = namespace_of(app);
        let deployment = deployment_of(app, env);
        let assignment = format!("app={image}");
        self.run(
            &["set", "image", &deployment, &assignment, "-n", &ns],
            None,
        )
        .await?;
        Ok(())
    }

    async fn rollout_status(
        &self,
        app: &AppName,
        env: Environment,
        timeout: Duration,
    ) -> ControlResult<bool> {
        let ns = namespace_of(app);
        let deployment = deployment_of(app, env);
        let timeout = format!("--timeout={}s", timeout.as_secs());

        let output = self
            .run_unchecked(&["rollout", "status", &deployment, "-n", &ns, &timeout], None)
            .await?;
        Ok(output.status.success())
    }

    #[instrument(skip(self), fields(app = %app, env = %env))]
    async fn rollout_undo(&self, app: &AppName, env: Environment) -> ControlResult<()> {
        let ns = namespace_of(app);
        let deployment = deployment_of(app, env);
        self.run(&["rollout", "undo", &deployment, "-n", &ns], None)
            .await?;
        Ok(())
    }

    async fn pod_status(&self, app: &AppName, env: Environment) -> ControlResult<PodStatus> {
        let ns = namespace_of(app);
        let selector = format!("app={app},env={env}");

        let output = self
            .run_unchecked(&["get", "pods", "-n", &ns, "-l", &selector, "-o", "json"], None)
            .await?;
        if !output.status.success() {
            return Ok(PodStatus::default());
        }

        let parsed: serde_json::Value = serde_json::from_slice(&output.stdout)
            .map_err(|e| ControlError::cluster("get pods", e.to_string()))?;
        Ok(parse_pod_status(&parsed))
    }

    async fn stream_logs(
        &self,
        app: &AppName,
        env: Environment,
        sink: &LineSink,
    ) -> ControlResult<()> {
        let ns = namespace_of(app);
        let selector = format!("app={app},env={env}");

        let mut cmd = Command::new("kubectl");
        cmd.args(["logs", "-f", "-n", &ns, "-l", &selector, "--tail=100"]);

        let status = stream_lines(cmd, sink)
            .await
            .map_err(|e| ControlError::cluster("logs", e.to_string()))?;
        if status.success() {
            Ok(())
        } else {
            Err(ControlError::cluster(
                "logs",
                format!("kubectl logs exited with {status}"),
            ))
        }
    }
}

/// Extract phase, restarts and readiness from a pod list.
fn parse_pod_status(pods: &serde_json::Value) -> PodStatus {
    let Some(pod) = pods["items"].as_array().and_then(|items| items.first()) else {
        return PodStatus::pending();
    };

    let phase = pod["status"]["phase"].as_str().unwrap_or("Unknown").to_owned();
    let containers = pod["status"]["containerStatuses"]
        .as_array()
        .cloned()
        .unwrap_or_default();

    let restarts = containers
        .iter()
        .map(|c| u32::try_from(c["restartCount"].as_u64().unwrap_or(0)).unwrap_or(u32::MAX))
        .sum();
    let ready = !containers.is_empty() && containers.iter().all(|c| c["ready"].as_bool() == Some(true));

    PodStatus {
        phase,
        restarts,
        ready,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_pod_status_empty_list_is_pending() {
        let status = parse_pod_status(&serde_json::json!({ "items": [] }));
        assert_eq!(status, PodStatus::pending());
    }

    #[test]
    fn parse_pod_status_sums_restarts() {
        let status = parse_pod_status(&serde_json::json!({
            "items": [{
                "status": {
                    "phase": "Running",
                    "containerStatuses": [
                        { "restartCount": 2, "ready": true },
                        { "restartCount": 1, "ready": true },
                    ],
                },
            }],
        }));

        assert_eq!(status.phase, "Running");
        assert_eq!(status.restarts, 3);
        assert!(status.ready);
    }

    #[test]
    fn parse_pod_status_not_ready_when_any_container_is_not() {
        let status = parse_pod_status(&serde_json::json!({
            "items": [{
                "status": {
                    "phase": "Running",
                    "containerStatuses": [
                        { "restartCount": 0, "ready": true },
                        { "restartCount": 0, "ready": false },
                    ],
                },
            }],
        }));

        assert!(!status.ready);
    }

    #[test]
    fn parse_pod_status_without_containers_is_not_ready() {
        let status = parse_pod_status(&serde_json::json!({
            "items": [{ "status": { "phase": "Pending" } }],
        }));

        assert_eq!(status.phase, "Pending");
        assert!(!status.ready);
    }
}
