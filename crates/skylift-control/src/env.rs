//! Environment validation for the platform service.
//!
//! Pre-flight checks ensure the external tools the platform shells out to
//! are present before it accepts work.

use std::process::Command;

use tracing::{debug, info, warn};

use crate::error::{ControlError, ControlResult};

/// Results of environment validation checks.
#[derive(Debug, Clone)]
pub struct EnvironmentCheck {
    /// Whether git is available.
    pub git: bool,
    /// Git version if available.
    pub git_version: Option<String>,

    /// Whether docker is available.
    pub docker: bool,
    /// Docker version if available.
    pub docker_version: Option<String>,

    /// Whether kubectl is available.
    pub kubectl: bool,
    /// Kubectl version if available.
    pub kubectl_version: Option<String>,
}

impl EnvironmentCheck {
    /// Run all environment checks.
    pub fn run() -> Self {
        info!("running environment validation checks");

        let git = check_command("git", &["--version"]);
        let docker = check_command("docker", &["--version"]);
        let kubectl = check_command("kubectl", &["version", "--client", "--output=yaml"]);

        let check = Self {
            git: git.0,
            git_version: git.1,
            docker: docker.0,
            docker_version: docker.1,
            kubectl: kubectl.0,
            kubectl_version: kubectl.1,
        };

        check.log_status();
        check
    }

    /// Whether every required tool is present.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        self.git && self.docker && self.kubectl
    }

    /// Validate the environment, returning an error naming what is missing.
    pub fn validate(&self) -> ControlResult<()> {
        let mut missing = Vec::new();
        if !self.git {
            missing.push("git");
        }
        if !self.docker {
            missing.push("docker");
        }
        if !self.kubectl {
            missing.push("kubectl");
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ControlError::Validation(format!(
                "missing required tools: {}",
                missing.join(", ")
            )))
        }
    }

    fn log_status(&self) {
        if self.git {
            info!(
                version = self.git_version.as_deref().unwrap_or("unknown"),
                "git: available"
            );
        } else {
            warn!("git: NOT AVAILABLE - workspace operations will fail");
        }

        if self.docker {
            info!(
                version = self.docker_version.as_deref().unwrap_or("unknown"),
                "docker: available"
            );
        } else {
            warn!("docker: NOT AVAILABLE - builds will fail");
        }

        if self.kubectl {
            info!(
                version = self.kubectl_version.as_deref().unwrap_or("unknown"),
                "kubectl: available"
            );
        } else {
            warn!("kubectl: NOT AVAILABLE - deployments will fail");
        }
    }
}

/// Check if a command is available and capture its version line.
fn check_command(name: &str, args: &[&str]) -> (bool, Option<String>) {
    match Command::new(name).args(args).output() {
        Ok(output) if output.status.success() => {
            let version = String::from_utf8_lossy(&output.stdout)
                .lines()
                .next()
                .map(|s| s.trim().to_owned());
            (true, version)
        }
        Ok(_) => {
            debug!(command = name, "command returned non-zero exit code");
            (false, None)
        }
        Err(e) => {
            debug!(command = name, error = %e, "command not found");
            (false, None)
        }
    }
}
