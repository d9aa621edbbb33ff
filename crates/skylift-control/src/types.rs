//! Registry record and status types for the control plane.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use skylift_core::{AppName, BuildVersion, Environment, TemplateKind};

/// Lifecycle position of an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AppStatus {
    /// Scaffolded, never built.
    Created,
    /// Latest build is running in preview.
    BuiltPreview,
    /// Promoted to production; re-entered on every promotion.
    Published,
}

impl std::fmt::Display for AppStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::BuiltPreview => write!(f, "built-preview"),
            Self::Published => write!(f, "published"),
        }
    }
}

/// Public URL of an application in one environment.
#[must_use]
pub fn app_url(app: &AppName, env: Environment, server_ip: &str) -> String {
    format!("http://{app}{}.{server_ip}.nip.io/", env.host_suffix())
}

/// Durable registry record, one per application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppRecord {
    /// Unique, immutable application name.
    #[serde(rename = "app_name")]
    pub name: AppName,

    /// Scaffold template the application started from.
    pub template: TemplateKind,

    /// Free-text description.
    pub description: String,

    /// Path of the published version-control history.
    pub git_repo: std::path::PathBuf,

    /// Version currently deployed to preview, if any.
    pub preview_version: Option<BuildVersion>,

    /// Version currently deployed to production, if any.
    ///
    /// Non-null exactly when `status` is [`AppStatus::Published`].
    pub prod_version: Option<BuildVersion>,

    /// Production version superseded by the last successful promotion.
    ///
    /// Set only by a promotion; cleared once consumed by a rollback or
    /// overwritten by the next promotion.
    pub rollback_version: Option<BuildVersion>,

    /// Computed preview URL.
    pub preview_url: String,

    /// Computed production URL.
    pub prod_url: String,

    /// When the application was created.
    pub created_at: DateTime<Utc>,

    /// Lifecycle position.
    pub status: AppStatus,
}

impl AppRecord {
    /// Create the record for a freshly scaffolded application.
    #[must_use]
    pub fn new(
        name: AppName,
        template: TemplateKind,
        description: impl Into<String>,
        git_repo: impl Into<std::path::PathBuf>,
        server_ip: &str,
    ) -> Self {
        let preview_url = app_url(&name, Environment::Preview, server_ip);
        let prod_url = app_url(&name, Environment::Prod, server_ip);
        Self {
            name,
            template,
            description: description.into(),
            git_repo: git_repo.into(),
            preview_version: None,
            prod_version: None,
            rollback_version: None,
            preview_url,
            prod_url,
            created_at: Utc::now(),
            status: AppStatus::Created,
        }
    }
}

/// Live pod state for one environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodStatus {
    /// Pod phase as reported by the orchestrator.
    pub phase: String,
    /// Total container restarts.
    pub restarts: u32,
    /// Whether all containers report ready.
    pub ready: bool,
}

impl PodStatus {
    /// Status for an environment with no pods scheduled yet.
    #[must_use]
    pub fn pending() -> Self {
        Self {
            phase: "Pending".to_owned(),
            restarts: 0,
            ready: false,
        }
    }
}

impl Default for PodStatus {
    fn default() -> Self {
        Self {
            phase: "Unknown".to_owned(),
            restarts: 0,
            ready: false,
        }
    }
}

/// Registry entry merged with live pod status, returned by status queries.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    /// The registry record.
    pub record: AppRecord,
    /// Live preview pod state.
    pub preview: PodStatus,
    /// Live production pod state.
    pub prod: PodStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> AppRecord {
        AppRecord::new(
            AppName::parse("demo").expect("valid name"),
            TemplateKind::SimpleApi,
            "a demo app",
            "/var/lib/skylift/apps/demo.git",
            "192.168.1.10",
        )
    }

    #[test]
    fn new_record_computes_urls() {
        let record = record();
        assert_eq!(record.preview_url, "http://demo-preview.192.168.1.10.nip.io/");
        assert_eq!(record.prod_url, "http://demo.192.168.1.10.nip.io/");
        assert_eq!(record.status, AppStatus::Created);
        assert!(record.preview_version.is_none());
        assert!(record.prod_version.is_none());
    }

    #[test]
    fn record_serialises_registry_keys() {
        let value = serde_json::to_value(record()).expect("serialise");
        assert_eq!(value["app_name"], "demo");
        assert_eq!(value["template"], "simple-api");
        assert_eq!(value["status"], "created");
        assert!(value["preview_version"].is_null());
    }

    #[test]
    fn status_round_trips() {
        for status in [AppStatus::Created, AppStatus::BuiltPreview, AppStatus::Published] {
            let json = serde_json::to_string(&status).expect("serialise");
            let back: AppStatus = serde_json::from_str(&json).expect("deserialise");
            assert_eq!(back, status);
        }
    }
}
