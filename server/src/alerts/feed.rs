use std::path::Path;

use thiserror::Error;

use crate::alerts::model::Alert;

/// A failed feed read. The watcher logs these and retries on the next
/// tick; they are never fatal to the process.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("failed to read alert feed: {0}")]
    Io(#[from] std::io::Error),
    #[error("alert feed is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Read the entire alert feed (a JSON array of alert records).
///
/// The whole file must parse as a JSON array; individual records that do
/// not deserialize, or that carry no alert_id, are logged and skipped so
/// one bad entry cannot poison the rest of the feed.
pub fn read_feed(path: &Path) -> Result<Vec<Alert>, FeedError> {
    let raw = std::fs::read_to_string(path)?;
    let entries: Vec<serde_json::Value> = serde_json::from_str(&raw)?;

    let mut alerts = Vec::with_capacity(entries.len());
    for entry in entries {
        match serde_json::from_value::<Alert>(entry) {
            Ok(alert) if !alert.alert_id.is_empty() => alerts.push(alert),
            Ok(_) => tracing::debug!("Skipping feed entry without alert_id"),
            Err(e) => tracing::warn!(error = %e, "Skipping malformed feed entry"),
        }
    }
    Ok(alerts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_feed(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn reads_well_formed_feed() {
        let file = write_feed(
            r#"[{"alert_id": "a1", "severity": "high", "timestamp": 1700000000}]"#,
        );
        let alerts = read_feed(file.path()).unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_id, "a1");
    }

    #[test]
    fn skips_entries_without_alert_id() {
        let file = write_feed(r#"[{"severity": "low"}, {"alert_id": "a2"}]"#);
        let alerts = read_feed(file.path()).unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_id, "a2");
    }

    #[test]
    fn invalid_json_is_a_parse_error() {
        let file = write_feed("not json at all");
        assert!(matches!(read_feed(file.path()), Err(FeedError::Parse(_))));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = read_feed(Path::new("/nonexistent/alerts.json")).unwrap_err();
        assert!(matches!(err, FeedError::Io(_)));
    }
}
