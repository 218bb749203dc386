//! The tagged-message wire protocol and its streaming parser (§4.3, §9).
//!
//! Workers emit paired tags with JSON bodies on stdout:
//! `<<NAME>>\n{json}\n<</NAME>>`. Per the "dynamic message parsing"
//! re-architecture note in §9, this is implemented as a tagged variant
//! with one arm per message type, parsed by a state machine that tracks
//! open-tag state line by line — never by a regex over the full buffer,
//! since workers may emit arbitrary text between tags. This directly
//! replaces the teacher's `signals/parser.rs`, which used
//! `Regex::captures_iter` over the whole output.

use crate::errors::DispatchError;
use serde::{Deserialize, Serialize};

const RECOGNISED_TAGS: &[&str] = &["STATUS", "COMPLETE", "BLOCKED", "PERMISSION_REQUEST"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusBody {
    pub message: String,
    #[serde(default)]
    pub progress: Option<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteBody {
    pub files_modified: Vec<String>,
    pub summary: String,
    #[serde(default)]
    pub deviations: Vec<String>,
    #[serde(default)]
    pub deferred: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlockedKind {
    GenericBlock,
    CheckpointHumanVerify,
    CheckpointDecision,
    CheckpointHumanAction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockedBody {
    pub kind: BlockedKind,
    pub reason: String,
    #[serde(default)]
    pub options: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionRequestBody {
    pub path: String,
    pub reason: String,
}

/// One parsed message, emitted by the streaming parser as soon as its
/// closing tag is seen.
#[derive(Debug, Clone)]
pub enum WorkerMessage {
    Status(StatusBody),
    Complete(CompleteBody),
    Blocked(BlockedBody),
    PermissionRequest(PermissionRequestBody),
}

#[derive(Debug)]
enum ParserState {
    Idle,
    InsideTag { name: String, body_lines: Vec<String> },
}

/// Streaming state machine: feed it stdout line by line via `feed_line`.
/// Text outside tags is ignored (workers may emit arbitrary prose between
/// tags). At end of stream call `finish` to detect unbalanced tags.
pub struct StreamingTagParser {
    state: ParserState,
}

impl StreamingTagParser {
    pub fn new() -> Self {
        Self {
            state: ParserState::Idle,
        }
    }

    /// Feed one line of stdout. Returns `Ok(Some(msg))` when a tag just
    /// closed and parsed successfully, `Ok(None)` otherwise.
    pub fn feed_line(&mut self, line: &str) -> Result<Option<WorkerMessage>, DispatchError> {
        match &mut self.state {
            ParserState::Idle => {
                if let Some(name) = opening_tag(line) {
                    self.state = ParserState::InsideTag {
                        name,
                        body_lines: Vec::new(),
                    };
                }
                Ok(None)
            }
            ParserState::InsideTag { name, body_lines } => {
                if let Some(closed_name) = closing_tag(line) {
                    if closed_name != *name {
                        // A different close tag appeared while one was
                        // open; treat as unbalanced.
                        return Err(DispatchError::UnbalancedTag { tag: name.clone() });
                    }
                    let body = body_lines.join("\n");
                    let tag_name = name.clone();
                    self.state = ParserState::Idle;
                    return parse_body(&tag_name, &body).map(Some);
                }
                body_lines.push(line.to_string());
                Ok(None)
            }
        }
    }

    /// Call once the stream has ended. An open tag at this point is a
    /// parse error (unbalanced tags at end-of-stream).
    pub fn finish(&self) -> Result<(), DispatchError> {
        if let ParserState::InsideTag { name, .. } = &self.state {
            return Err(DispatchError::UnbalancedTag { tag: name.clone() });
        }
        Ok(())
    }
}

impl Default for StreamingTagParser {
    fn default() -> Self {
        Self::new()
    }
}

fn opening_tag(line: &str) -> Option<String> {
    let trimmed = line.trim();
    let inner = trimmed.strip_prefix("<<")?.strip_suffix(">>")?;
    if inner.starts_with('/') {
        return None;
    }
    RECOGNISED_TAGS
        .iter()
        .find(|&&t| t == inner)
        .map(|s| s.to_string())
}

fn closing_tag(line: &str) -> Option<String> {
    let trimmed = line.trim();
    let inner = trimmed.strip_prefix("<</")?.strip_suffix(">>")?;
    RECOGNISED_TAGS
        .iter()
        .find(|&&t| t == inner)
        .map(|s| s.to_string())
}

fn parse_body(tag: &str, body: &str) -> Result<WorkerMessage, DispatchError> {
    if body.contains(">>") {
        return Err(DispatchError::UnescapedClosingSequence {
            tag: tag.to_string(),
        });
    }
    let wrap = |e: serde_json::Error| DispatchError::MalformedBody {
        tag: tag.to_string(),
        source: e,
    };
    match tag {
        "STATUS" => serde_json::from_str(body).map(WorkerMessage::Status).map_err(wrap),
        "COMPLETE" => serde_json::from_str(body)
            .map(WorkerMessage::Complete)
            .map_err(wrap),
        "BLOCKED" => serde_json::from_str(body).map(WorkerMessage::Blocked).map_err(wrap),
        "PERMISSION_REQUEST" => serde_json::from_str(body)
            .map(WorkerMessage::PermissionRequest)
            .map_err(wrap),
        other => Err(DispatchError::UnbalancedTag {
            tag: other.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_all(parser: &mut StreamingTagParser, text: &str) -> Vec<WorkerMessage> {
        let mut out = Vec::new();
        for line in text.lines() {
            if let Some(msg) = parser.feed_line(line).unwrap() {
                out.push(msg);
            }
        }
        out
    }

    #[test]
    fn parses_complete_tag_across_multiple_lines() {
        let mut parser = StreamingTagParser::new();
        let text = "some prose first\n<<COMPLETE>>\n{\"files_modified\":[\"a.rs\"],\"summary\":\"done\"}\n<</COMPLETE>>\ntrailing prose";
        let msgs = feed_all(&mut parser, text);
        parser.finish().unwrap();
        assert_eq!(msgs.len(), 1);
        match &msgs[0] {
            WorkerMessage::Complete(c) => {
                assert_eq!(c.files_modified, vec!["a.rs".to_string()]);
                assert_eq!(c.summary, "done");
            }
            _ => panic!("expected Complete"),
        }
    }

    #[test]
    fn arbitrary_text_between_tags_is_ignored() {
        let mut parser = StreamingTagParser::new();
        let text = "I am thinking about >> this << weird text\n<<STATUS>>\n{\"message\":\"working\"}\n<</STATUS>>";
        let msgs = feed_all(&mut parser, text);
        assert_eq!(msgs.len(), 1);
        assert!(matches!(msgs[0], WorkerMessage::Status(_)));
    }

    #[test]
    fn multiple_status_tags_permitted() {
        let mut parser = StreamingTagParser::new();
        let text = "<<STATUS>>\n{\"message\":\"a\"}\n<</STATUS>>\n<<STATUS>>\n{\"message\":\"b\"}\n<</STATUS>>\n<<COMPLETE>>\n{\"files_modified\":[],\"summary\":\"ok\"}\n<</COMPLETE>>";
        let msgs = feed_all(&mut parser, text);
        assert_eq!(msgs.len(), 3);
    }

    #[test]
    fn unbalanced_tag_at_end_of_stream_is_an_error() {
        let mut parser = StreamingTagParser::new();
        feed_all(&mut parser, "<<STATUS>>\n{\"message\":\"a\"}");
        assert!(parser.finish().is_err());
    }

    #[test]
    fn malformed_json_body_is_an_error() {
        let mut parser = StreamingTagParser::new();
        let result = {
            let mut last = Ok(None);
            for line in "<<COMPLETE>>\nnot json\n<</COMPLETE>>".lines() {
                last = parser.feed_line(line);
                if last.is_err() {
                    break;
                }
            }
            last
        };
        assert!(result.is_err());
    }

    #[test]
    fn blocked_tag_carries_kind_discriminant() {
        let mut parser = StreamingTagParser::new();
        let text = "<<BLOCKED>>\n{\"kind\":\"checkpoint-human-action\",\"reason\":\"needs auth\"}\n<</BLOCKED>>";
        let msgs = feed_all(&mut parser, text);
        match &msgs[0] {
            WorkerMessage::Blocked(b) => assert_eq!(b.kind, BlockedKind::CheckpointHumanAction),
            _ => panic!("expected Blocked"),
        }
    }

    #[test]
    fn body_containing_unescaped_closing_sequence_is_rejected() {
        let mut parser = StreamingTagParser::new();
        let text = "<<STATUS>>\n{\"message\":\"done >> moving on\"}\n<</STATUS>>";
        let mut result = Ok(None);
        for line in text.lines() {
            result = parser.feed_line(line);
            if result.is_err() {
                break;
            }
        }
        assert!(matches!(
            result,
            Err(DispatchError::UnescapedClosingSequence { .. })
        ));
    }

    #[test]
    fn permission_request_parses_path_and_reason() {
        let mut parser = StreamingTagParser::new();
        let text = "<<PERMISSION_REQUEST>>\n{\"path\":\"src/auth/util.rs\",\"reason\":\"need shared helper\"}\n<</PERMISSION_REQUEST>>";
        let msgs = feed_all(&mut parser, text);
        match &msgs[0] {
            WorkerMessage::PermissionRequest(p) => {
                assert_eq!(p.path, "src/auth/util.rs");
            }
            _ => panic!("expected PermissionRequest"),
        }
    }
}
