//! JSON-lines event transport
//!
//! Writes one JSON object per event, each on its own line, and flushes after
//! every event so a reader on the other end of a pipe sees it immediately.

use async_trait::async_trait;
use cedar_application::{EventSink, TransportError};
use cedar_domain::EventEnvelope;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

pub struct JsonlEventSink {
    writer: Mutex<Box<dyn Write + Send>>,
}

impl JsonlEventSink {
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn stdout() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }

    /// Append to `path`, creating parent directories as needed.
    pub fn file(path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file: File = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::new(Box::new(BufWriter::new(file))))
    }
}

#[async_trait]
impl EventSink for JsonlEventSink {
    async fn send(&self, envelope: &EventEnvelope) -> Result<(), TransportError> {
        let line = serde_json::to_string(envelope)?;
        let mut writer = self.writer.lock().map_err(|_| TransportError::Closed)?;
        writeln!(writer, "{}", line)?;
        writer.flush()?;
        Ok(())
    }
}
