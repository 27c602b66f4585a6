//! Line-delimited JSON writer for Singer messages

use super::Message;
use crate::error::Result;
use crate::etl::Loader;

use std::io::Write;

/// Writes one JSON message per line, typically to stdout.
///
/// # Example
/// ```no_run
/// use tap_gorgias::etl::Loader;
/// use tap_gorgias::singer::{SingerWriter, SyncState};
/// use serde_json::json;
///
/// # fn example() -> tap_gorgias::Result<()> {
/// let mut writer = SingerWriter::new(std::io::stdout());
/// writer.load("tickets", vec![json!({"id": 1})])?;
/// writer.checkpoint(&SyncState::new())?;
/// # Ok(())
/// # }
/// ```
pub struct SingerWriter<W: Write> {
    out: W,
    records: usize,
}

impl<W: Write> SingerWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out, records: 0 }
    }

    /// Number of RECORD messages written so far
    pub fn records_written(&self) -> usize {
        self.records
    }

    pub fn flush(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Loader for SingerWriter<W> {
    fn write(&mut self, message: Message) -> Result<()> {
        if matches!(message, Message::Record { .. }) {
            self.records += 1;
        }
        serde_json::to_writer(&mut self.out, &message)?;
        self.out.write_all(b"\n")?;
        // STATE is a checkpoint, it has to reach the consumer now
        if matches!(message, Message::State { .. }) {
            self.out.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::singer::SyncState;
    use serde_json::json;

    #[test]
    fn test_one_message_per_line() {
        let mut writer = SingerWriter::new(Vec::new());
        let count = writer
            .load("tickets", vec![json!({"id": 1}), json!({"id": 2})])
            .unwrap();
        writer.checkpoint(&SyncState::new()).unwrap();
        assert_eq!(count, 2);
        assert_eq!(writer.records_written(), 2);

        let output = String::from_utf8(writer.into_inner()).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 3);

        let first: Message = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.stream(), Some("tickets"));
        let last: Message = serde_json::from_str(lines[2]).unwrap();
        assert_eq!(last, Message::State { value: json!({"bookmarks": {}}) });
    }
}
