//! Core identifier and lifecycle types shared across the platform.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum length of an application name.
///
/// Names become DNS labels in preview/production hostnames, so the DNS
/// label limit applies.
pub const MAX_APP_NAME_LEN: usize = 63;

/// Reasons an application name can be rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidAppName {
    /// The name was empty after normalisation.
    #[error("application name is empty")]
    Empty,

    /// The name exceeds the DNS label limit.
    #[error("application name exceeds {MAX_APP_NAME_LEN} characters")]
    TooLong,

    /// The name contains a character outside `[a-z0-9-]`.
    #[error("application name contains invalid character {0:?}")]
    InvalidCharacter(char),

    /// The name does not start with an alphanumeric character.
    #[error("application name must start with a letter or digit")]
    InvalidStart,
}

/// Validated application name.
///
/// Names are normalised on parse: surrounding whitespace is trimmed, the
/// name is lowercased and interior spaces become dashes. The result must be
/// a valid DNS label since it is used directly in environment hostnames.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AppName(String);

impl AppName {
    /// Normalise and validate a raw name.
    pub fn parse(raw: &str) -> Result<Self, InvalidAppName> {
        let name: String = raw.trim().to_lowercase().replace(' ', "-");

        if name.is_empty() {
            return Err(InvalidAppName::Empty);
        }
        if name.len() > MAX_APP_NAME_LEN {
            return Err(InvalidAppName::TooLong);
        }
        if let Some(c) = name.chars().find(|c| !c.is_ascii_alphanumeric() && *c != '-') {
            return Err(InvalidAppName::InvalidCharacter(c));
        }
        if !name.chars().next().is_some_and(|c| c.is_ascii_alphanumeric()) {
            return Err(InvalidAppName::InvalidStart);
        }

        Ok(Self(name))
    }

    /// Return the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AppName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for AppName {
    type Error = InvalidAppName;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<AppName> for String {
    fn from(name: AppName) -> Self {
        name.0
    }
}

/// Sortable build identifier stamped at build start.
///
/// The textual layout (`YYYYMMDD.HHMMSS`, UTC) makes lexicographic order
/// equal temporal order, so the newest build of an application is always
/// the greatest version string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BuildVersion(String);

impl BuildVersion {
    /// Wrap an already-formatted version string.
    #[must_use]
    pub fn new(version: impl Into<String>) -> Self {
        Self(version.into())
    }

    /// Stamp a version from the current UTC wall clock.
    #[must_use]
    pub fn stamp() -> Self {
        Self(chrono::Utc::now().format("%Y%m%d.%H%M%S").to_string())
    }

    /// Return the version as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BuildVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for BuildVersion {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for BuildVersion {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Scaffold template an application starts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TemplateKind {
    /// Static file server.
    StaticSite,
    /// Minimal HTTP API.
    SimpleApi,
    /// Inbound webhook receiver.
    Webhook,
    /// Periodically executed job.
    ScheduledJob,
}

impl TemplateKind {
    /// All known template kinds.
    pub const ALL: [Self; 4] = [
        Self::StaticSite,
        Self::SimpleApi,
        Self::Webhook,
        Self::ScheduledJob,
    ];

    /// The template's directory name in the template catalog.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StaticSite => "static-site",
            Self::SimpleApi => "simple-api",
            Self::Webhook => "webhook",
            Self::ScheduledJob => "scheduled-job",
        }
    }

    /// Parse a template kind from its directory name.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == raw)
    }
}

impl fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Deployable target for an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    /// Untested candidate environment.
    Preview,
    /// Promoted, user-facing environment.
    Prod,
}

impl Environment {
    /// The environment's name as used in deployment labels.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Preview => "preview",
            Self::Prod => "prod",
        }
    }

    /// Hostname suffix appended to the application name.
    #[must_use]
    pub const fn host_suffix(self) -> &'static str {
        match self {
            Self::Preview => "-preview",
            Self::Prod => "",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_name_normalises() {
        let name = AppName::parse("  My Cool App ").expect("valid name");
        assert_eq!(name.as_str(), "my-cool-app");
    }

    #[test]
    fn app_name_rejects_bad_input() {
        assert_eq!(AppName::parse("   "), Err(InvalidAppName::Empty));
        assert_eq!(
            AppName::parse("app/one"),
            Err(InvalidAppName::InvalidCharacter('/'))
        );
        assert_eq!(AppName::parse("-app"), Err(InvalidAppName::InvalidStart));
        assert!(AppName::parse(&"a".repeat(64)).is_err());
        assert!(AppName::parse(&"a".repeat(63)).is_ok());
    }

    #[test]
    fn build_version_sorts_chronologically() {
        let older = BuildVersion::new("20260101.000000");
        let newer = BuildVersion::new("20260101.010000");
        assert!(older < newer);
    }

    #[test]
    fn build_version_stamp_layout() {
        let version = BuildVersion::stamp();
        let s = version.as_str();
        assert_eq!(s.len(), 15);
        assert_eq!(&s[8..9], ".");
        assert!(s[..8].chars().all(|c| c.is_ascii_digit()));
        assert!(s[9..].chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn template_kind_round_trips() {
        for kind in TemplateKind::ALL {
            assert_eq!(TemplateKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(TemplateKind::parse("mystery"), None);
    }

    #[test]
    fn environment_host_suffix() {
        assert_eq!(Environment::Preview.host_suffix(), "-preview");
        assert_eq!(Environment::Prod.host_suffix(), "");
    }
}
