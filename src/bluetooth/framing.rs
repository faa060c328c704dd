// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Newline framing over the SPP byte stream.

use chrono::{DateTime, Local};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::{broadcast, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::adapter::{BoxedReader, BoxedWriter};
use crate::events::{ConnectionEvent, EventSink};

/// One complete line received from the peripheral.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Line content without the terminator.
    pub text: String,
    /// Local time the final byte arrived.
    pub received_at: DateTime<Local>,
}

impl Message {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            received_at: Local::now(),
        }
    }
}

/// Accumulates raw reads and splits them into lines.
pub struct LineFramer {
    buffer: Vec<u8>,
    max_line_len: usize,
    discarding: bool,
}

impl LineFramer {
    /// Create a framer that drops lines longer than `max_line_len` bytes.
    pub fn new(max_line_len: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(max_line_len.min(4096)),
            max_line_len,
            discarding: false,
        }
    }

    /// Feed one raw read.
    ///
    /// Returns every line completed by these bytes. A trailing partial line
    /// stays buffered for the next call.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();

        for &byte in bytes {
            if byte == b'\n' {
                if self.discarding {
                    self.discarding = false;
                    continue;
                }
                if self.buffer.last() == Some(&b'\r') {
                    self.buffer.pop();
                }
                if !self.buffer.is_empty() {
                    lines.push(String::from_utf8_lossy(&self.buffer).into_owned());
                }
                self.buffer.clear();
            } else if self.discarding {
                continue;
            } else if self.over_limit(byte) {
                warn!(
                    "Line exceeds {} bytes, discarding until next newline",
                    self.max_line_len
                );
                self.buffer.clear();
                self.discarding = true;
            } else {
                self.buffer.push(byte);
            }
        }

        lines
    }

    /// Bytes of the partial line currently buffered.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// One `\r` past the limit is allowed so a full-length CRLF line
    /// survives.
    fn over_limit(&self, byte: u8) -> bool {
        let len = self.buffer.len();
        len > self.max_line_len || (len == self.max_line_len && byte != b'\r')
    }
}

/// Why a [`FrameReader`] stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReaderExit {
    /// Stopped on request; nothing to report.
    Cancelled,
    /// The stream ended or failed.
    Lost(String),
}

/// Background reader turning the inbound stream into [`Message`]s.
pub struct FrameReader {
    reader: BoxedReader,
    framer: LineFramer,
    chunk_size: usize,
    closing: Arc<AtomicBool>,
    messages: broadcast::Sender<Message>,
    sink: EventSink,
}

impl FrameReader {
    /// `closing` is the owning link's teardown flag. Once it is set, no
    /// further lines are published.
    pub fn new(
        reader: BoxedReader,
        framer: LineFramer,
        chunk_size: usize,
        closing: Arc<AtomicBool>,
        messages: broadcast::Sender<Message>,
        sink: EventSink,
    ) -> Self {
        Self {
            reader,
            framer,
            chunk_size: chunk_size.max(1),
            closing,
            messages,
            sink,
        }
    }

    /// Read until cancelled or the stream fails. The read half is dropped
    /// on return.
    pub async fn run(mut self, cancel: CancellationToken) -> ReaderExit {
        info!("Frame reader started");
        let mut chunk = vec![0u8; self.chunk_size];

        let exit = loop {
            let read = tokio::select! {
                biased;
                _ = cancel.cancelled() => break ReaderExit::Cancelled,
                read = self.reader.read(&mut chunk) => read,
            };

            match read {
                Ok(0) => {
                    info!("Connection closed by remote");
                    break ReaderExit::Lost("end of stream".to_string());
                }
                Ok(n) => {
                    for line in self.framer.push(&chunk[..n]) {
                        if self.closing.load(Ordering::Acquire) {
                            break;
                        }
                        self.publish(line);
                    }
                    if self.closing.load(Ordering::Acquire) {
                        break ReaderExit::Cancelled;
                    }
                }
                Err(e) => {
                    warn!("Read error: {}", e);
                    break ReaderExit::Lost(e.to_string());
                }
            }
        };

        if self.framer.pending() > 0 {
            debug!("Dropping {} bytes of unterminated input", self.framer.pending());
        }
        info!("Frame reader stopped: {:?}", exit);
        exit
    }

    fn publish(&self, line: String) {
        debug!("Received: {}", line);
        let message = Message::new(line);
        // No subscribers is fine; the event sink still sees the line.
        let _ = self.messages.send(message.clone());
        self.sink.emit(ConnectionEvent::MessageReceived(message));
    }
}

/// Serialized line writer over the outbound stream.
#[derive(Clone)]
pub struct FrameWriter {
    writer: Arc<Mutex<BoxedWriter>>,
}

impl FrameWriter {
    pub fn new(writer: BoxedWriter) -> Self {
        Self {
            writer: Arc::new(Mutex::new(writer)),
        }
    }

    /// Write `text` followed by a single `\n`. Concurrent callers are
    /// queued, so lines never interleave.
    pub async fn write_line(&self, text: &str) -> io::Result<()> {
        let mut frame = Vec::with_capacity(text.len() + 1);
        frame.extend_from_slice(text.as_bytes());
        frame.push(b'\n');

        let mut writer = self.writer.lock().await;
        writer.write_all(&frame).await?;
        writer.flush().await
    }

    /// Shut the outbound direction down.
    pub async fn close(&self) -> io::Result<()> {
        let mut writer = self.writer.lock().await;
        writer.shutdown().await
    }
}
