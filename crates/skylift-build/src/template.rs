//! Scaffold template catalog.
//!
//! Templates live on disk as one directory per [`TemplateKind`], copied
//! wholesale into a fresh workspace when an application is created.

use std::path::{Path, PathBuf};

use skylift_core::TemplateKind;
use tokio::task;
use tracing::instrument;

use crate::error::{BuildError, BuildResult};

/// On-disk catalog of scaffold templates.
#[derive(Debug, Clone)]
pub struct TemplateCatalog {
    dir: PathBuf,
}

impl TemplateCatalog {
    /// Create a catalog rooted at `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Template kinds that are actually present in the catalog.
    #[must_use]
    pub fn available(&self) -> Vec<TemplateKind> {
        TemplateKind::ALL
            .into_iter()
            .filter(|kind| self.dir.join(kind.as_str()).is_dir())
            .collect()
    }

    /// Copy the template's file set into `dest`.
    ///
    /// Fails with [`BuildError::UnknownTemplate`] when the catalog has no
    /// directory for the kind.
    #[instrument(skip(self, dest), fields(template = %kind))]
    pub async fn materialise(&self, kind: TemplateKind, dest: &Path) -> BuildResult<()> {
        let source = self.dir.join(kind.as_str());
        if !source.is_dir() {
            return Err(BuildError::UnknownTemplate {
                name: kind.as_str().to_owned(),
            });
        }

        let dest = dest.to_path_buf();
        task::spawn_blocking(move || copy_tree(&source, &dest))
            .await
            .map_err(|e| BuildError::Internal(format!("template copy task failed: {e}")))?
    }
}

/// Recursively copy a directory tree.
fn copy_tree(src: &Path, dest: &Path) -> BuildResult<()> {
    std::fs::create_dir_all(dest)?;

    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let target = dest.join(entry.file_name());

        if entry.file_type()?.is_dir() {
            copy_tree(&entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), &target)?;
        }
    }

    Ok(())
}
