//! Thin wrapper over the `git` command line.
//!
//! Every workspace mutation goes through version control so the platform
//! gets an audit trail for free and partially-failed writes are recomputed
//! by the next diff. Each call maps a failed invocation to
//! [`BuildError::Vcs`] with the captured stderr.

use std::path::Path;
use std::process::Output;

use tokio::process::Command;
use tracing::debug;

use crate::error::{BuildError, BuildResult};

/// Commit identity used for all platform-authored commits.
const AUTHOR_NAME: &str = "Skylift";
const AUTHOR_EMAIL: &str = "skylift@local";

/// Async `git` invoker.
#[derive(Debug, Clone, Default)]
pub struct GitCli;

impl GitCli {
    /// Create a new invoker.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    async fn run(&self, dir: Option<&Path>, args: &[&str]) -> BuildResult<Output> {
        let mut cmd = Command::new("git");
        if let Some(dir) = dir {
            cmd.arg("-C").arg(dir);
        }
        cmd.args(args)
            .env("GIT_AUTHOR_NAME", AUTHOR_NAME)
            .env("GIT_AUTHOR_EMAIL", AUTHOR_EMAIL)
            .env("GIT_COMMITTER_NAME", AUTHOR_NAME)
            .env("GIT_COMMITTER_EMAIL", AUTHOR_EMAIL);

        debug!(args = ?args, "running git");

        let output = cmd.output().await.map_err(|e| BuildError::Vcs {
            op: args.first().copied().unwrap_or("git").to_owned(),
            stderr: e.to_string(),
        })?;

        if output.status.success() {
            Ok(output)
        } else {
            Err(BuildError::Vcs {
                op: args.join(" "),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            })
        }
    }

    /// Initialise a bare repository at `path`.
    pub async fn init_bare(&self, path: &Path) -> BuildResult<()> {
        let path = path.to_string_lossy();
        self.run(None, &["init", "--bare", path.as_ref()]).await?;
        Ok(())
    }

    /// Initialise `workspace` as a fresh clone pointing at `origin`.
    pub async fn init_workspace(&self, workspace: &Path, origin: &Path) -> BuildResult<()> {
        self.run(Some(workspace), &["init", "-b", "main"]).await?;
        let origin = origin.to_string_lossy();
        self.run(
            Some(workspace),
            &["remote", "add", "origin", origin.as_ref()],
        )
        .await?;
        Ok(())
    }

    /// Stage every change in the workspace.
    pub async fn add_all(&self, workspace: &Path) -> BuildResult<()> {
        self.run(Some(workspace), &["add", "-A"]).await?;
        Ok(())
    }

    /// Whether the index differs from the current revision.
    ///
    /// `git diff --cached --quiet` exits 1 when staged changes exist, 0 when
    /// the tree is unchanged; anything else is a real failure.
    pub async fn has_staged_changes(&self, workspace: &Path) -> BuildResult<bool> {
        let mut cmd = Command::new("git");
        cmd.arg("-C")
            .arg(workspace)
            .args(["diff", "--cached", "--quiet"]);

        let output = cmd.output().await.map_err(|e| BuildError::Vcs {
            op: "diff --cached".to_owned(),
            stderr: e.to_string(),
        })?;

        match output.status.code() {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => Err(BuildError::Vcs {
                op: "diff --cached".to_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            }),
        }
    }

    /// Commit the staged tree.
    pub async fn commit(&self, workspace: &Path, message: &str) -> BuildResult<()> {
        self.run(Some(workspace), &["commit", "-m", message]).await?;
        Ok(())
    }

    /// Publish the current branch, setting upstream tracking.
    pub async fn push(&self, workspace: &Path) -> BuildResult<()> {
        self.run(Some(workspace), &["push", "-u", "origin", "main"])
            .await?;
        Ok(())
    }

    /// Fetch the published history.
    pub async fn fetch(&self, workspace: &Path) -> BuildResult<()> {
        self.run(Some(workspace), &["fetch", "origin"]).await?;
        Ok(())
    }

    /// Discard all local state and match the latest published revision.
    pub async fn reset_to_published(&self, workspace: &Path) -> BuildResult<()> {
        self.run(Some(workspace), &["reset", "--hard", "origin/main"])
            .await?;
        Ok(())
    }
}
