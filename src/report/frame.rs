//! Server-Sent-Events decoding for the report endpoint.
//!
//! The body arrives as arbitrary byte chunks. `SseDecoder` keeps the bytes of
//! an unfinished line (which may end inside a multi-byte UTF-8 sequence) and
//! the data lines of an unfinished event across `push` calls, and yields one
//! payload per completed unnamed event. Events with an `event:` name other
//! than `message` are dropped, as an `onmessage` listener would never see them.

use serde::Deserialize;

pub const DONE_MARKER: &str = "[DONE]";

const DEFAULT_EVENT: &str = "message";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Token(String),
    Done,
}

#[derive(Deserialize)]
struct TokenRecord {
    token: String,
}

impl Frame {
    /// `None` for payloads that are neither the marker nor a token record;
    /// those are dropped without affecting the stream.
    pub fn parse(payload: &str) -> Option<Frame> {
        if payload == DONE_MARKER {
            return Some(Frame::Done);
        }
        serde_json::from_str::<TokenRecord>(payload)
            .ok()
            .map(|r| Frame::Token(r.token))
    }
}

#[derive(Debug, Default)]
pub struct SseDecoder {
    line: Vec<u8>,
    data: String,
    event: String,
    after_cr: bool,
    started: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume one chunk and return the payloads of every event it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut out = Vec::new();
        for &b in chunk {
            if self.after_cr {
                self.after_cr = false;
                if b == b'\n' {
                    continue;
                }
            }
            match b {
                b'\r' => {
                    self.after_cr = true;
                    self.end_line(&mut out);
                }
                b'\n' => self.end_line(&mut out),
                _ => self.line.push(b),
            }
        }
        out
    }

    /// True while an unterminated line or undispatched data is buffered.
    pub fn has_pending(&self) -> bool {
        !self.line.is_empty() || !self.data.is_empty()
    }

    fn is_message(&self) -> bool {
        self.event.is_empty() || self.event == DEFAULT_EVENT
    }

    fn end_line(&mut self, out: &mut Vec<String>) {
        let bytes = std::mem::take(&mut self.line);
        let text = String::from_utf8_lossy(&bytes);
        let mut line: &str = &text;
        if !self.started {
            self.started = true;
            line = line.strip_prefix('\u{feff}').unwrap_or(line);
        }

        if line.is_empty() {
            self.dispatch(out);
            return;
        }
        if line.starts_with(':') {
            return;
        }

        let (field, value) = match line.find(':') {
            Some(idx) => {
                let value = &line[idx + 1..];
                (&line[..idx], value.strip_prefix(' ').unwrap_or(value))
            }
            None => (line, ""),
        };
        // id/retry carry nothing the report stream uses
        match field {
            "data" => {
                self.data.push_str(value);
                self.data.push('\n');
            }
            "event" => self.event = value.to_string(),
            _ => {}
        }
    }

    fn dispatch(&mut self, out: &mut Vec<String>) {
        let named = !self.is_message();
        self.event.clear();
        if self.data.is_empty() {
            return;
        }
        let mut payload = std::mem::take(&mut self.data);
        if named {
            return;
        }
        if payload.ends_with('\n') {
            payload.pop();
        }
        out.push(payload);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_payloads() {
        assert_eq!(Frame::parse("[DONE]"), Some(Frame::Done));
        assert_eq!(
            Frame::parse(r#"{"token":"Oil"}"#),
            Some(Frame::Token("Oil".to_string()))
        );
        assert_eq!(Frame::parse("keep-alive"), None);
        assert_eq!(Frame::parse(r#"{"other":1}"#), None);
        assert_eq!(Frame::parse(r#"{"token":5}"#), None);
        assert_eq!(Frame::parse(" [DONE]"), None);
    }

    #[test]
    fn test_decodes_events() {
        let mut d = SseDecoder::new();
        let out = d.push(b"data:{\"token\":\"Oil\"}\n\ndata: [DONE]\n\n");
        assert_eq!(out, vec![r#"{"token":"Oil"}"#.to_string(), "[DONE]".to_string()]);
        assert!(!d.has_pending());
    }

    #[test]
    fn test_split_anywhere_decodes_the_same() {
        let body = "data: {\"token\":\"原油\"}\r\n\r\n: ping\r\ndata: {\"token\":\" prices\"}\n\ndata: [DONE]\r\r";
        let mut whole = SseDecoder::new();
        let expected = whole.push(body.as_bytes());
        assert_eq!(expected.len(), 3);

        let mut bytewise = SseDecoder::new();
        let mut got = Vec::new();
        for b in body.as_bytes() {
            got.extend(bytewise.push(std::slice::from_ref(b)));
        }
        assert_eq!(got, expected);
        assert_eq!(got[0], r#"{"token":"原油"}"#);
    }

    #[test]
    fn test_multi_line_data_is_joined() {
        let mut d = SseDecoder::new();
        let out = d.push(b"data: a\ndata: b\n\n");
        assert_eq!(out, vec!["a\nb".to_string()]);
    }

    #[test]
    fn test_comments_and_other_fields_ignored() {
        let mut d = SseDecoder::new();
        let out = d.push(b": comment\nevent: token\nid: 3\nretry: 1000\n\n");
        assert!(out.is_empty());
        let out = d.push(b"event: message\ndata: x\nid\n\n");
        assert_eq!(out, vec!["x".to_string()]);
    }

    #[test]
    fn test_named_events_dropped() {
        let mut d = SseDecoder::new();
        let out = d.push(b"event: progress\ndata: {\"token\":\"hidden\"}\n\ndata: {\"token\":\"shown\"}\n\n");
        assert_eq!(out, vec![r#"{"token":"shown"}"#.to_string()]);
        assert!(!d.has_pending());
    }

    #[test]
    fn test_partial_event_stays_buffered() {
        let mut d = SseDecoder::new();
        assert!(d.push(b"data: [DO").is_empty());
        assert!(d.has_pending());
        assert!(d.push(b"NE]\n").is_empty());
        assert_eq!(d.push(b"\n"), vec!["[DONE]".to_string()]);
    }

    #[test]
    fn test_leading_bom_stripped() {
        let mut d = SseDecoder::new();
        let out = d.push(b"\xEF\xBB\xBFdata: x\n\n");
        assert_eq!(out, vec!["x".to_string()]);
    }
}
