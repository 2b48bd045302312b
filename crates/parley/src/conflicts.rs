//! Unresolved-merge detection on backing content.
//!
//! After a session ends without the manager asking for it (the user closed
//! the panes), the manager checks whether the merged file still carries
//! conflict markers before offering to reopen it.

use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

use crate::sessions::DiffedUris;

/// Inspects backing content for lingering unresolved-merge indicators.
#[async_trait]
pub trait ConflictInspector: Send + Sync {
    async fn has_unresolved_conflicts(&self, uris: &DiffedUris) -> Result<bool>;
}

/// Scans the merged file for git conflict markers at line starts.
///
/// A tuple without a merged location, or a merged file that cannot be read,
/// reports no conflicts; the check is advisory.
#[derive(Default)]
pub struct MarkerScanner;

impl MarkerScanner {
    pub fn new() -> Self {
        Self
    }

    fn contains_markers(text: &str) -> bool {
        text.lines().any(|line| {
            line.starts_with("<<<<<<<") || line.starts_with("=======") || line.starts_with(">>>>>>>")
        })
    }
}

#[async_trait]
impl ConflictInspector for MarkerScanner {
    async fn has_unresolved_conflicts(&self, uris: &DiffedUris) -> Result<bool> {
        let Some(merged) = uris.merged.as_ref() else {
            return Ok(false);
        };
        match tokio::fs::read_to_string(merged.as_str()).await {
            Ok(text) => Ok(Self::contains_markers(&text)),
            Err(err) => {
                debug!("could not scan {} for conflict markers: {}", merged, err);
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sessions::ContentUri;
    use std::io::Write;

    fn tuple_with_merged(path: &str) -> DiffedUris {
        DiffedUris {
            base: ContentUri::new("base"),
            local: ContentUri::new("local"),
            remote: ContentUri::new("remote"),
            merged: Some(ContentUri::new(path)),
            backup: None,
        }
    }

    #[test]
    fn test_marker_detection() {
        assert!(MarkerScanner::contains_markers(
            "a\n<<<<<<< HEAD\nours\n=======\ntheirs\n>>>>>>> branch\n"
        ));
        assert!(!MarkerScanner::contains_markers("plain text\nno markers\n"));
        // Markers must sit at line starts.
        assert!(!MarkerScanner::contains_markers("see <<<<<<< inline"));
    }

    #[tokio::test]
    async fn test_scans_merged_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "<<<<<<< HEAD").unwrap();
        writeln!(file, ">>>>>>> other").unwrap();

        let scanner = MarkerScanner::new();
        let uris = tuple_with_merged(file.path().to_str().unwrap());
        assert!(scanner.has_unresolved_conflicts(&uris).await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_file_reports_clean() {
        let scanner = MarkerScanner::new();
        let uris = tuple_with_merged("/nonexistent/merged.txt");
        assert!(!scanner.has_unresolved_conflicts(&uris).await.unwrap());
    }

    #[tokio::test]
    async fn test_no_merged_location_reports_clean() {
        let scanner = MarkerScanner::new();
        let mut uris = tuple_with_merged("unused");
        uris.merged = None;
        assert!(!scanner.has_unresolved_conflicts(&uris).await.unwrap());
    }
}
