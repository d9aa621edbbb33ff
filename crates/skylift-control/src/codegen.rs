//! Code generation integration.
//!
//! The concrete model client is an external collaborator; the platform owns
//! only the [`CodeGenerator`] seam and the extraction of a named-file set
//! from the generated text. Extraction is strict: output without a single
//! well-formed file block is an explicit error, never a silent empty set.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use skylift_core::{AppName, LineSink, TemplateKind};
use thiserror::Error;

use crate::error::ControlResult;

/// Errors from generated-file extraction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    /// The text contained no well-formed file block.
    #[error("no file blocks found in generated output")]
    NoFiles,

    /// A file block names a path outside the workspace.
    #[error("generated file has unsafe path: {0}")]
    UnsafePath(String),
}

fn file_block_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?s)<file name="([^"]+)">\n(.*?)\n</file>"#).expect("valid pattern")
    })
}

/// Recover the named-file set from generated text.
///
/// Files are delimited as `<file name="...">` ... `</file>` blocks. Paths
/// must be relative and free of parent-directory components.
pub fn extract_files(text: &str) -> Result<BTreeMap<String, String>, ExtractError> {
    let mut files = BTreeMap::new();

    for captures in file_block_pattern().captures_iter(text) {
        let name = &captures[1];
        if name.starts_with('/') || name.split('/').any(|part| part == "..") {
            return Err(ExtractError::UnsafePath(name.to_owned()));
        }
        files.insert(name.to_owned(), captures[2].to_owned());
    }

    if files.is_empty() {
        return Err(ExtractError::NoFiles);
    }
    Ok(files)
}

/// Streams generated text for an application change request.
///
/// Implementations relay chunks through the sink as they arrive and return
/// the accumulated text; the caller extracts the file set from it.
#[async_trait]
pub trait CodeGenerator: Send + Sync {
    /// Generate code for `app` from a free-text instruction, given the
    /// current workspace file set.
    async fn generate(
        &self,
        app: &AppName,
        template: TemplateKind,
        instruction: &str,
        existing: &BTreeMap<String, String>,
        sink: &LineSink,
    ) -> ControlResult<String>;
}

/// Generator for deployments without a model client configured.
///
/// Every request fails with a clear error instead of silently producing
/// nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledGenerator;

#[async_trait]
impl CodeGenerator for DisabledGenerator {
    async fn generate(
        &self,
        _app: &AppName,
        _template: TemplateKind,
        _instruction: &str,
        _existing: &BTreeMap<String, String>,
        _sink: &LineSink,
    ) -> ControlResult<String> {
        Err(crate::error::ControlError::Generation(
            "no code generation backend configured".to_owned(),
        ))
    }
}

/// Generator replaying a fixed response, for tests.
#[derive(Debug, Clone)]
pub struct MockGenerator {
    response: String,
}

impl MockGenerator {
    /// Create a generator that always produces `response`.
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
        }
    }
}

#[async_trait]
impl CodeGenerator for MockGenerator {
    async fn generate(
        &self,
        _app: &AppName,
        _template: TemplateKind,
        _instruction: &str,
        _existing: &BTreeMap<String, String>,
        sink: &LineSink,
    ) -> ControlResult<String> {
        for chunk in self.response.split_inclusive('\n') {
            if !sink.line(chunk.trim_end_matches('\n')) {
                break;
            }
        }
        Ok(self.response.clone())
    }
}
