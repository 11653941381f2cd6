use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Connected,
    Content,
    Heartbeat,
}

/// A content change travelling from the change observer to the subscribers of
/// a token. `connected` and `heartbeat` frames are produced by the stream
/// itself and never go through fan-out.
///
/// Shared between recipients behind an `Arc`, so the content is never copied
/// per session.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateEvent {
    pub token: String,
    pub content: String,
    /// Session that authored the write, excluded from fan-out
    pub origin: Option<String>,
}

impl UpdateEvent {
    pub fn content(token: &str, content: String, origin: Option<String>) -> Arc<Self> {
        Arc::new(Self {
            token: token.to_string(),
            content,
            origin,
        })
    }
}

/// One message on the live update stream, sent as `data: <json>\n\n`
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Frame {
    Connected { session: String },
    Content { content: String },
    Heartbeat { at: String },
}

impl Frame {
    pub fn connected(session: &str) -> Self {
        Frame::Connected {
            session: session.to_string(),
        }
    }

    pub fn heartbeat() -> Self {
        Frame::Heartbeat {
            at: Utc::now().to_rfc3339(),
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Frame::Connected { .. } => EventKind::Connected,
            Frame::Content { .. } => EventKind::Content,
            Frame::Heartbeat { .. } => EventKind::Heartbeat,
        }
    }
}

impl From<&UpdateEvent> for Frame {
    fn from(event: &UpdateEvent) -> Self {
        Frame::Content {
            content: event.content.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_are_tagged_by_kind() {
        let json = serde_json::to_value(Frame::connected("s1")).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "connected", "session": "s1"}));

        let json = serde_json::to_value(Frame::Content { content: "hello".into() }).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "content", "content": "hello"}));

        let json = serde_json::to_value(Frame::heartbeat()).unwrap();
        assert_eq!(json["kind"], "heartbeat");
        assert!(json["at"].is_string());
    }

    #[test]
    fn content_event_becomes_content_frame() {
        let event = UpdateEvent::content("abc", "hello".into(), Some("s2".into()));
        let frame = Frame::from(event.as_ref());
        assert_eq!(frame, Frame::Content { content: "hello".into() });
        assert_eq!(frame.kind(), EventKind::Content);
        assert_eq!(Frame::connected("s1").kind(), EventKind::Connected);
    }
}
