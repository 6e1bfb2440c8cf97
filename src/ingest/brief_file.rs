use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::core::{InputLimits, InputViolation};
use crate::domain::run::hash_input;

/// File extensions accepted as briefs (lowercase, without dot)
pub const SUPPORTED_EXTENSIONS: [&str; 3] = ["txt", "md", "markdown"];

const PDF_MAGIC: &[u8] = b"%PDF-";

/// Brief text and the name of the file it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BriefSource {
    pub text: String,
    pub source_name: String,
}

/// Read a brief file, enforcing extension, denylist, size and length limits
pub async fn read_brief(path: &Path, limits: &InputLimits) -> Result<BriefSource> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    if !SUPPORTED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(InputViolation::UnsupportedFormat {
            extension: format!(".{}", extension),
        }
        .into());
    }

    let path_str = path.to_string_lossy();
    if limits.is_denylisted(&path_str) {
        return Err(InputViolation::DenylistMatch {
            path: path_str.to_string(),
        }
        .into());
    }

    let metadata = tokio::fs::metadata(path)
        .await
        .with_context(|| format!("Failed to read brief file: {}", path.display()))?;
    limits.check_upload_size(metadata.len())?;

    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read brief file: {}", path.display()))?;

    if bytes.starts_with(PDF_MAGIC) {
        anyhow::bail!(
            "{} is a PDF; convert it to .txt or .md first",
            path.display()
        );
    }

    let text = String::from_utf8(bytes)
        .with_context(|| format!("Brief file is not valid UTF-8: {}", path.display()))?;
    let text = text.trim().to_string();

    limits.validate_input(&text, Some(path))?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let source_name = sanitize_source_name(&file_name);

    debug!(original = %file_name, sanitized = %source_name, "Resolved brief source name");
    info!(source = %source_name, bytes = text.len(), digest = %hash_input(&text), "Brief loaded");

    Ok(BriefSource { text, source_name })
}

/// Map a file name onto `[A-Za-z0-9_.-]`, replacing anything else with `_`
pub fn sanitize_source_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .take(255)
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    match cleaned.as_str() {
        "" | "." | ".." => "brief".to_string(),
        _ => cleaned,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const BRIEF: &str = "Launch the Summer Glow sunscreen line to women aged 25-40.";

    #[tokio::test]
    async fn test_reads_markdown_brief() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Summer Brief.md");
        std::fs::write(&path, format!("\n\n{}\n", BRIEF)).unwrap();

        let source = read_brief(&path, &InputLimits::default()).await.unwrap();
        assert_eq!(source.text, BRIEF);
        assert_eq!(source.source_name, "Summer_Brief.md");
    }

    #[tokio::test]
    async fn test_rejects_unsupported_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("brief.docx");
        std::fs::write(&path, BRIEF).unwrap();

        let err = read_brief(&path, &InputLimits::default()).await.unwrap_err();
        assert!(err.to_string().contains("Unsupported file type '.docx'"));
    }

    #[tokio::test]
    async fn test_rejects_pdf_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("brief.txt");
        std::fs::write(&path, b"%PDF-1.7 binary").unwrap();

        let err = read_brief(&path, &InputLimits::default()).await.unwrap_err();
        assert!(err.to_string().contains("is a PDF"));
    }

    #[tokio::test]
    async fn test_rejects_oversized_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("brief.txt");
        std::fs::write(&path, "x".repeat(4096)).unwrap();

        let limits = InputLimits {
            max_upload_bytes: 1024,
            ..Default::default()
        };
        let err = read_brief(&path, &limits).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<InputViolation>(),
            Some(InputViolation::UploadTooLarge { actual: 4096, limit: 1024 })
        ));
    }

    #[tokio::test]
    async fn test_rejects_denylisted_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("secrets.md");
        std::fs::write(&path, BRIEF).unwrap();

        let err = read_brief(&path, &InputLimits::default()).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<InputViolation>(),
            Some(InputViolation::DenylistMatch { .. })
        ));
    }

    #[tokio::test]
    async fn test_rejects_short_brief() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("brief.txt");
        std::fs::write(&path, "  hi  ").unwrap();

        let err = read_brief(&path, &InputLimits::default()).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<InputViolation>(),
            Some(InputViolation::TooShort { .. })
        ));
    }

    #[test]
    fn test_sanitize_source_name() {
        assert_eq!(sanitize_source_name("brief-v2.txt"), "brief-v2.txt");
        assert_eq!(sanitize_source_name("Q3 plan (final).md"), "Q3_plan__final_.md");
        assert_eq!(sanitize_source_name(".."), "brief");
        assert_eq!(sanitize_source_name(""), "brief");
    }
}
