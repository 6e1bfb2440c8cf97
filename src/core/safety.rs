//! Input limits applied before a brief is admitted.
//!
//! Guards the pipeline entry points (file ingest and direct text) with:
//! - Upload size
//! - Brief length bounds
//! - Denylist patterns (to avoid feeding secrets to the service)

use std::path::Path;

use glob::Pattern;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::documents::{MAX_BRIEF_CHARS, MIN_BRIEF_CHARS};

/// Limits for brief input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputLimits {
    /// Maximum upload size in bytes (default: 10MB)
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,

    /// Minimum brief length in characters, after trimming
    #[serde(default = "default_min_brief_chars")]
    pub min_brief_chars: usize,

    /// Maximum brief length in characters, after trimming
    #[serde(default = "default_max_brief_chars")]
    pub max_brief_chars: usize,

    /// Glob patterns to reject (files matching these won't be read)
    #[serde(default = "default_denylist")]
    pub denylist_patterns: Vec<String>,
}

fn default_max_upload_bytes() -> u64 {
    10 * 1024 * 1024
} // 10MB
fn default_min_brief_chars() -> usize {
    MIN_BRIEF_CHARS
}
fn default_max_brief_chars() -> usize {
    MAX_BRIEF_CHARS
}

fn default_denylist() -> Vec<String> {
    vec![
        "**/.env*".to_string(),
        "**/secrets*".to_string(),
        "**/*credential*".to_string(),
        "**/*.pem".to_string(),
        "**/*.key".to_string(),
    ]
}

impl Default for InputLimits {
    fn default() -> Self {
        Self {
            max_upload_bytes: default_max_upload_bytes(),
            min_brief_chars: default_min_brief_chars(),
            max_brief_chars: default_max_brief_chars(),
            denylist_patterns: default_denylist(),
        }
    }
}

impl InputLimits {
    /// Check if a path matches any denylist pattern
    pub fn is_denylisted(&self, path: &str) -> bool {
        self.denylist_patterns
            .iter()
            .filter_map(|p| Pattern::new(p).ok())
            .any(|pattern| pattern.matches(path))
    }

    /// Reject oversized uploads before reading them
    pub fn check_upload_size(&self, size: u64) -> Result<(), InputViolation> {
        if size > self.max_upload_bytes {
            return Err(InputViolation::UploadTooLarge {
                actual: size,
                limit: self.max_upload_bytes,
            });
        }
        Ok(())
    }

    /// Validate brief text against length limits and its source against the denylist
    pub fn validate_input(
        &self,
        input: &str,
        source_path: Option<&Path>,
    ) -> Result<(), InputViolation> {
        self.check_upload_size(input.len() as u64)?;

        if let Some(path) = source_path {
            let path_str = path.to_string_lossy();
            if self.is_denylisted(&path_str) {
                return Err(InputViolation::DenylistMatch {
                    path: path_str.to_string(),
                });
            }
        }

        let chars = input.trim().chars().count();
        if chars < self.min_brief_chars {
            return Err(InputViolation::TooShort {
                actual: chars,
                limit: self.min_brief_chars,
            });
        }
        if chars > self.max_brief_chars {
            return Err(InputViolation::TooLong {
                actual: chars,
                limit: self.max_brief_chars,
            });
        }

        Ok(())
    }
}

/// Input rejected at the entry point
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputViolation {
    #[error("File too large: {actual} bytes > {limit} bytes")]
    UploadTooLarge { actual: u64, limit: u64 },

    #[error("Brief too short: {actual} characters < {limit}")]
    TooShort { actual: usize, limit: usize },

    #[error("Brief too long: {actual} characters > {limit}")]
    TooLong { actual: usize, limit: usize },

    #[error("Path matches denylist pattern: {path}")]
    DenylistMatch { path: String },

    #[error("Unsupported file type '{extension}'. Supported: .txt, .md, .markdown")]
    UnsupportedFormat { extension: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits() {
        let limits = InputLimits::default();
        assert_eq!(limits.max_upload_bytes, 10 * 1024 * 1024);
        assert_eq!(limits.min_brief_chars, 10);
        assert_eq!(limits.max_brief_chars, 50_000);
    }

    #[test]
    fn test_denylist_matching() {
        let limits = InputLimits::default();

        assert!(limits.is_denylisted(".env"));
        assert!(limits.is_denylisted("config/secrets.txt"));
        assert!(limits.is_denylisted("keys/server.key"));

        assert!(!limits.is_denylisted("briefs/summer.md"));
        assert!(!limits.is_denylisted("brief.txt"));
    }

    #[test]
    fn test_length_bounds() {
        let limits = InputLimits::default();

        assert!(limits.validate_input("A real campaign brief", None).is_ok());
        assert!(matches!(
            limits.validate_input("   short   ", None),
            Err(InputViolation::TooShort { actual: 5, .. })
        ));
        assert!(matches!(
            limits.validate_input(&"x".repeat(50_001), None),
            Err(InputViolation::TooLong { .. })
        ));
    }

    #[test]
    fn test_upload_size() {
        let limits = InputLimits {
            max_upload_bytes: 100,
            ..Default::default()
        };

        assert!(limits.check_upload_size(100).is_ok());
        assert!(matches!(
            limits.validate_input(&"x".repeat(200), None),
            Err(InputViolation::UploadTooLarge { actual: 200, limit: 100 })
        ));
    }

    #[test]
    fn test_denylisted_source_rejected() {
        let limits = InputLimits::default();
        let result = limits.validate_input("A real campaign brief", Some(Path::new("secrets.md")));
        assert!(matches!(result, Err(InputViolation::DenylistMatch { .. })));
    }
}
