//! Newline-delimited frame transport (stdin/stdout for the daemon).

use crate::gateway::{Outbound, TransportError};
use std::io::Write;
use std::sync::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;

/// Writes each frame as one line to a blocking writer.
pub struct LineOutbound<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> LineOutbound<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<W: Write + Send> Outbound for LineOutbound<W> {
    fn post(&self, frame: &str) -> Result<(), TransportError> {
        let mut writer = self.writer.lock().map_err(|_| TransportError::Closed)?;
        writeln!(writer, "{frame}")?;
        writer.flush()?;
        Ok(())
    }
}

/// Read non-empty lines from `reader` into a channel until EOF or a read error.
pub fn spawn_line_reader<R>(reader: R) -> mpsc::Receiver<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(16);
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    if tx.send(line).await.is_err() {
                        break;
                    }
                }
                Ok(None) => {
                    tracing::debug!("inbound stream reached EOF");
                    break;
                }
                Err(err) => {
                    tracing::warn!(error = %err, "inbound stream read failed");
                    break;
                }
            }
        }
    });
    rx
}
