//! Input Limit Integration Tests
//!
//! Tests for entry-point limits on brief text and brief files.

use std::path::Path;

use agencyflow::core::{InputLimits, InputViolation};
use agencyflow::ingest::read_brief;
use tempfile::TempDir;

#[test]
fn test_max_upload_bytes() {
    let limits = InputLimits {
        max_upload_bytes: 100,
        ..Default::default()
    };

    // Input within limits
    assert!(limits.validate_input(&"x".repeat(50), None).is_ok());

    // Input at exact limit
    assert!(limits.validate_input(&"x".repeat(100), None).is_ok());

    // Input exceeding limit
    match limits.validate_input(&"x".repeat(200), None) {
        Err(InputViolation::UploadTooLarge { actual, limit }) => {
            assert_eq!(actual, 200);
            assert_eq!(limit, 100);
        }
        other => panic!("Expected UploadTooLarge violation, got {:?}", other),
    }
}

#[test]
fn test_brief_length_counts_characters_not_bytes() {
    let limits = InputLimits::default();

    // 10 multi-byte characters meet the minimum
    assert!(limits.validate_input(&"é".repeat(10), None).is_ok());
    assert!(matches!(
        limits.validate_input(&"é".repeat(9), None),
        Err(InputViolation::TooShort { actual: 9, limit: 10 })
    ));
}

#[test]
fn test_denylist_patterns() {
    let limits = InputLimits::default();

    for path in [
        ".env",
        ".env.production",
        "config/secrets.md",
        "aws_credentials.txt",
        "tls/server.pem",
    ] {
        assert!(limits.is_denylisted(path), "{} should be denylisted", path);
    }
    for path in ["brief.md", "clients/lumen/summer.txt"] {
        assert!(!limits.is_denylisted(path), "{} should be allowed", path);
    }

    let result =
        limits.validate_input("A perfectly normal brief", Some(Path::new("notes/.env.local")));
    assert!(matches!(result, Err(InputViolation::DenylistMatch { .. })));
}

#[test]
fn test_custom_denylist() {
    let limits = InputLimits {
        denylist_patterns: vec!["**/drafts/**".to_string()],
        ..Default::default()
    };

    assert!(limits.is_denylisted("briefs/drafts/summer.md"));
    assert!(!limits.is_denylisted(".env"));
}

#[tokio::test]
async fn test_read_brief_applies_limits() {
    let dir = TempDir::new().unwrap();
    let limits = InputLimits {
        max_brief_chars: 20,
        ..Default::default()
    };

    let ok = dir.path().join("short.txt");
    std::fs::write(&ok, "A twelve-char brief").unwrap();
    let source = read_brief(&ok, &limits).await.unwrap();
    assert_eq!(source.source_name, "short.txt");

    let long = dir.path().join("long.txt");
    std::fs::write(&long, "x".repeat(21)).unwrap();
    let err = read_brief(&long, &limits).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<InputViolation>(),
        Some(InputViolation::TooLong { actual: 21, limit: 20 })
    ));
}
