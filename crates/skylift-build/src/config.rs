//! Configuration for workspace and image operations.

use std::path::PathBuf;

use serde::Deserialize;

/// Build-side configuration: where histories live, where templates come
/// from, and which registry images are tagged for.
#[derive(Debug, Clone, Deserialize)]
pub struct BuildConfig {
    /// Base directory holding bare histories and workspaces.
    #[serde(default = "default_git_base")]
    pub git_base: PathBuf,

    /// Directory containing one subdirectory per scaffold template.
    #[serde(default = "default_templates_dir")]
    pub templates_dir: PathBuf,

    /// Host of the image registry images are pushed to.
    #[serde(default = "default_registry_host")]
    pub registry_host: String,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            git_base: default_git_base(),
            templates_dir: default_templates_dir(),
            registry_host: default_registry_host(),
        }
    }
}

fn default_git_base() -> PathBuf {
    PathBuf::from("/var/lib/skylift/apps")
}

fn default_templates_dir() -> PathBuf {
    PathBuf::from("/var/lib/skylift/templates")
}

fn default_registry_host() -> String {
    "localhost:5050".to_owned()
}
