//! Brief ingestion.
//!
//! Turns a file on disk into brief text plus a source name the pipeline
//! accepts. Plain text and Markdown are supported; everything passes the
//! [`InputLimits`](crate::core::InputLimits) checks before it is read in full.

pub mod brief_file;

pub use brief_file::{read_brief, sanitize_source_name, BriefSource, SUPPORTED_EXTENSIONS};
