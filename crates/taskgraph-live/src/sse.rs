//! Server-sent events decoding
//!
//! Incremental `text/event-stream` parser. Bytes arrive in arbitrary chunks;
//! [`SseDecoder::push`] buffers partial lines and returns every frame that
//! a blank line completed. Only `event:` and `data:` fields matter here;
//! `id:`, `retry:` and `:` comment lines are skipped.

use serde_json::Value;
use taskgraph_types::{CanvasEvent, EventDecodeError};

/// One dispatched SSE frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    /// `event:` field, if the server named the event
    pub event: Option<String>,
    /// `data:` lines joined with `\n`
    pub data: String,
}

impl SseFrame {
    /// Decode into a canvas event.
    ///
    /// Named frames carry the payload in `data`; unnamed frames carry a full
    /// `{"type", "data"}` envelope.
    pub fn into_event(self) -> Result<CanvasEvent, EventDecodeError> {
        match self.event {
            Some(name) => {
                let data = if self.data.trim().is_empty() {
                    Value::Null
                } else {
                    serde_json::from_str(&self.data).map_err(|source| {
                        EventDecodeError::InvalidPayload {
                            event_type: name.clone(),
                            source,
                        }
                    })?
                };
                CanvasEvent::from_wire(&name, data)
            }
            None => CanvasEvent::from_envelope(&self.data),
        }
    }
}

#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk; returns the frames it completed, in order
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buffer.extend_from_slice(chunk);
        let mut frames = Vec::new();
        while let Some(end) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=end).collect();
            let line = String::from_utf8_lossy(&line[..line.len() - 1]);
            let line = line.strip_suffix('\r').unwrap_or(&line);
            if let Some(frame) = self.line(line) {
                frames.push(frame);
            }
        }
        frames
    }

    fn line(&mut self, line: &str) -> Option<SseFrame> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseFrame { event, data })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_frame_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"event: task.sta").is_empty());
        assert!(decoder.push(b"rted\ndata: {\"task_id\"").is_empty());
        let frames = decoder.push(b": \"t1\"}\n\n");
        assert_eq!(
            frames,
            vec![SseFrame {
                event: Some("task.started".into()),
                data: r#"{"task_id": "t1"}"#.into(),
            }]
        );
        let event = frames.into_iter().next().unwrap().into_event().unwrap();
        assert_eq!(event.task_id(), Some("t1"));
    }

    #[test]
    fn test_crlf_comments_and_multiline_data() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push(b": keepalive\r\nid: 7\r\ndata: a\r\ndata: b\r\n\r\n");
        assert_eq!(
            frames,
            vec![SseFrame {
                event: None,
                data: "a\nb".into(),
            }]
        );
    }

    #[test]
    fn test_blank_line_without_data_dispatches_nothing() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"event: ping\n\n").is_empty());
        // The name does not leak into the next frame
        let frames = decoder.push(b"data: {\"type\":\"initial\",\"data\":{}}\n\n");
        assert_eq!(frames[0].event, None);
    }

    #[test]
    fn test_unnamed_frame_is_an_envelope() {
        let frame = SseFrame {
            event: None,
            data: r#"{"type":"task.failed","data":{"task_id":"t1","error":"boom"}}"#.into(),
        };
        let event = frame.into_event().unwrap();
        assert_eq!(event.event_type(), CanvasEvent::TASK_FAILED);
    }

    #[test]
    fn test_named_frame_with_bad_json() {
        let frame = SseFrame {
            event: Some("task.created".into()),
            data: "{not json".into(),
        };
        assert!(matches!(
            frame.into_event(),
            Err(EventDecodeError::InvalidPayload { ref event_type, .. }) if event_type == "task.created"
        ));
    }
}
