//! Incremental line splitting for `text/event-stream` bodies.
//!
//! Network chunks do not align with SSE line boundaries, so both the provider
//! clients and the streaming client adapter accumulate bytes here and drain
//! complete lines as they arrive.

use memchr::memchr;

/// Byte accumulator that yields complete, trimmed lines.
#[derive(Default)]
pub struct SseLineBuffer {
    buffer: Vec<u8>,
}

impl SseLineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Drain the next complete line, if one is buffered. Lines that are not
    /// valid UTF-8 are dropped.
    pub fn next_line(&mut self) -> Option<String> {
        while let Some(newline_pos) = memchr(b'\n', &self.buffer) {
            let line = std::str::from_utf8(&self.buffer[..newline_pos])
                .map(|s| s.trim().to_string());
            self.buffer.drain(..=newline_pos);
            match line {
                Ok(line) => return Some(line),
                Err(err) => {
                    tracing::warn!("Invalid UTF-8 in event stream: {err}");
                    continue;
                }
            }
        }
        None
    }
}

/// Strip the `data:` field prefix from an SSE line. Both `data: x` and
/// `data:x` appear in the wild.
pub fn extract_data_payload(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim_start)
}
