//! Git-backed workspace synchronisation.
//!
//! Each application owns exactly one mutable checkout (the workspace) kept
//! in lock-step with a bare repository (the published history). All file
//! mutation flows through here; builds only ever see what was last
//! committed and published.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use skylift_core::{AppName, TemplateKind};
use tokio::task;
use tracing::{info, instrument, warn};

use crate::config::BuildConfig;
use crate::error::{BuildError, BuildResult};
use crate::git::GitCli;
use crate::template::TemplateCatalog;

/// Single-writer manager for application workspaces and their histories.
pub struct WorkspaceManager {
    git_base: PathBuf,
    catalog: TemplateCatalog,
    git: GitCli,
}

impl WorkspaceManager {
    /// Create a manager from configuration.
    #[must_use]
    pub fn new(config: &BuildConfig) -> Self {
        Self {
            git_base: config.git_base.clone(),
            catalog: TemplateCatalog::new(&config.templates_dir),
            git: GitCli::new(),
        }
    }

    /// Path of the application's mutable checkout.
    #[must_use]
    pub fn workspace_path(&self, app: &AppName) -> PathBuf {
        self.git_base.join(format!("{app}-workspace"))
    }

    /// Path of the application's bare published history.
    #[must_use]
    pub fn history_path(&self, app: &AppName) -> PathBuf {
        self.git_base.join(format!("{app}.git"))
    }

    /// The template catalog backing [`scaffold`](Self::scaffold).
    #[must_use]
    pub const fn catalog(&self) -> &TemplateCatalog {
        &self.catalog
    }

    /// Create a fresh published history root for the application.
    #[instrument(skip(self), fields(app = %app))]
    pub async fn initialize(&self, app: &AppName) -> BuildResult<()> {
        let history = self.history_path(app);
        if history.exists() {
            return Err(BuildError::WorkspaceConflict {
                app: app.to_string(),
            });
        }

        tokio::fs::create_dir_all(&history).await?;
        self.git.init_bare(&history).await?;

        info!(path = %history.display(), "history initialised");
        Ok(())
    }

    /// Populate the workspace from a template and publish it as revision one.
    ///
    /// An existing workspace directory is replaced; the published history is
    /// the durable record, the checkout is always reconstructible from it.
    #[instrument(skip(self), fields(app = %app, template = %kind))]
    pub async fn scaffold(&self, app: &AppName, kind: TemplateKind) -> BuildResult<()> {
        let workspace = self.workspace_path(app);
        let history = self.history_path(app);

        if workspace.exists() {
            warn!(path = %workspace.display(), "replacing existing workspace");
            tokio::fs::remove_dir_all(&workspace).await?;
        }
        tokio::fs::create_dir_all(&workspace).await?;

        self.git.init_workspace(&workspace, &history).await?;
        self.catalog.materialise(kind, &workspace).await?;

        self.git.add_all(&workspace).await?;
        self.git
            .commit(&workspace, &format!("Scaffold {kind} for {app}"))
            .await?;
        self.git.push(&workspace).await?;

        info!("workspace scaffolded and published");
        Ok(())
    }

    /// Write the given files into the workspace and publish a commit if the
    /// resulting tree differs from the current revision.
    ///
    /// Returns whether a commit was made. Calling twice with identical
    /// content commits at most once.
    #[instrument(skip(self, files), fields(app = %app, files = files.len()))]
    pub async fn apply_files(
        &self,
        app: &AppName,
        files: &BTreeMap<String, String>,
    ) -> BuildResult<bool> {
        let workspace = self.workspace_path(app);
        if !workspace.exists() {
            return Err(BuildError::WorkspaceMissing {
                app: app.to_string(),
            });
        }

        for (path, content) in files {
            let relative = validate_relative(path)?;
            let target = workspace.join(relative);
            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&target, content).await?;
        }

        self.git.add_all(&workspace).await?;

        if !self.git.has_staged_changes(&workspace).await? {
            info!("tree unchanged, skipping commit");
            return Ok(false);
        }

        self.git.commit(&workspace, "Update generated sources").await?;
        self.git.push(&workspace).await?;

        info!("files committed and published");
        Ok(true)
    }

    /// Bring the workspace to the exact state of the latest published
    /// revision, discarding any local-only modifications.
    ///
    /// Recreates the checkout from the published history when the workspace
    /// directory is missing.
    #[instrument(skip(self), fields(app = %app))]
    pub async fn sync(&self, app: &AppName) -> BuildResult<()> {
        let workspace = self.workspace_path(app);
        let history = self.history_path(app);

        if !workspace.exists() {
            warn!(path = %workspace.display(), "workspace missing, recreating from history");
            tokio::fs::create_dir_all(&workspace).await?;
            self.git.init_workspace(&workspace, &history).await?;
        }

        self.git.fetch(&workspace).await?;
        self.git.reset_to_published(&workspace).await?;

        Ok(())
    }

    /// Every tracked file's path and content as of the current workspace
    /// state, version-control metadata excluded.
    ///
    /// Returns an empty map for an application that was never scaffolded.
    pub async fn snapshot(&self, app: &AppName) -> BuildResult<BTreeMap<String, String>> {
        let workspace = self.workspace_path(app);
        if !workspace.exists() {
            return Ok(BTreeMap::new());
        }

        task::spawn_blocking(move || {
            let mut files = BTreeMap::new();
            collect_files(&workspace, &workspace, &mut files)?;
            Ok(files)
        })
        .await
        .map_err(|e| BuildError::Internal(format!("snapshot task failed: {e}")))?
    }

    /// Remove the workspace and the published history permanently.
    ///
    /// Idempotent: already-absent paths are not an error.
    #[instrument(skip(self), fields(app = %app))]
    pub async fn destroy(&self, app: &AppName) -> BuildResult<()> {
        for path in [self.workspace_path(app), self.history_path(app)] {
            match tokio::fs::remove_dir_all(&path).await {
                Ok(()) => info!(path = %path.display(), "removed"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for WorkspaceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkspaceManager")
            .field("git_base", &self.git_base)
            .finish_non_exhaustive()
    }
}

/// Reject paths that could land outside the workspace.
fn validate_relative(path: &str) -> BuildResult<&Path> {
    let relative = Path::new(path);
    let escapes = relative.is_absolute()
        || relative
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)));

    if escapes {
        return Err(BuildError::PathEscape {
            path: path.to_owned(),
        });
    }
    Ok(relative)
}

/// Recursively collect tracked files, skipping version-control metadata.
fn collect_files(
    root: &Path,
    dir: &Path,
    files: &mut BTreeMap<String, String>,
) -> BuildResult<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();

        if entry.file_type()?.is_dir() {
            if entry.file_name() == ".git" {
                continue;
            }
            collect_files(root, &path, files)?;
        } else {
            let relative = path
                .strip_prefix(root)
                .map_err(|e| BuildError::Internal(format!("path outside workspace: {e}")))?
                .to_string_lossy()
                .into_owned();
            let bytes = std::fs::read(&path)?;
            files.insert(relative, String::from_utf8_lossy(&bytes).into_owned());
        }
    }
    Ok(())
}
