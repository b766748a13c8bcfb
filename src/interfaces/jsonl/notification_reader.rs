use crate::error::{LedgerError, Result};
use serde_json::Value;
use std::io::BufRead;

/// Reads notification payloads from a JSON-lines source.
///
/// One opaque JSON document per line; blank lines are skipped. A malformed
/// line yields an error item without aborting the stream, so one bad
/// delivery cannot block the rest of a batch.
pub struct NotificationReader<R: BufRead> {
    source: R,
}

impl<R: BufRead> NotificationReader<R> {
    /// Creates a new `NotificationReader` from any `BufRead` source
    /// (e.g. a file or stdin lock).
    pub fn new(source: R) -> Self {
        Self { source }
    }

    /// Returns an iterator that lazily reads and parses payloads.
    pub fn notifications(self) -> impl Iterator<Item = Result<Value>> {
        self.source
            .lines()
            .filter(|line| match line {
                Ok(s) => !s.trim().is_empty(),
                Err(_) => true,
            })
            .map(|line| {
                let line = line.map_err(LedgerError::from)?;
                serde_json::from_str(&line).map_err(LedgerError::from)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_reader_valid_stream() {
        let data = "{\"out_order_no\":\"A1\"}\n\n{\"out_order_no\":\"A2\",\"event_type\":\"verify_success\"}\n";
        let reader = NotificationReader::new(data.as_bytes());
        let results: Vec<Result<Value>> = reader.notifications().collect();

        assert_eq!(results.len(), 2);
        let first = results[0].as_ref().unwrap();
        assert_eq!(first, &json!({ "out_order_no": "A1" }));
    }

    #[test]
    fn test_reader_malformed_line_does_not_abort() {
        let data = "not json\n{\"out_order_no\":\"A1\"}\n";
        let reader = NotificationReader::new(data.as_bytes());
        let results: Vec<Result<Value>> = reader.notifications().collect();

        assert_eq!(results.len(), 2);
        assert!(results[0].is_err());
        assert!(results[1].is_ok());
    }
}
