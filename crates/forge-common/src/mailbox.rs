//! MailboxMessage: orchestrator-worker coordination for long-lived
//! workers. Optional in the default short-lived-subprocess dispatch
//! model, but part of the data model for adapters that support it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MailboxMessageType {
    TaskAssignment,
    Heartbeat,
    Broadcast,
    Completion,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailboxMessage {
    pub id: String,
    pub sender: String,
    /// Either a specific worker ID or the literal "all".
    pub addressee: String,
    pub message_type: MailboxMessageType,
    pub timestamp: DateTime<Utc>,
    pub payload: Value,
    #[serde(default)]
    pub read: bool,
}

impl MailboxMessage {
    pub fn new(
        sender: impl Into<String>,
        addressee: impl Into<String>,
        message_type: MailboxMessageType,
        payload: Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            sender: sender.into(),
            addressee: addressee.into(),
            message_type,
            timestamp: Utc::now(),
            payload,
            read: false,
        }
    }

    pub fn is_broadcast(&self) -> bool {
        self.addressee == "all"
    }

    pub fn mark_read(&mut self) {
        self.read = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broadcast_addressee_detected() {
        let m = MailboxMessage::new("orchestrator", "all", MailboxMessageType::Broadcast, Value::Null);
        assert!(m.is_broadcast());
    }

    #[test]
    fn mark_read_flips_flag() {
        let mut m = MailboxMessage::new(
            "orchestrator",
            "worker-1",
            MailboxMessageType::Heartbeat,
            Value::Null,
        );
        assert!(!m.read);
        m.mark_read();
        assert!(m.read);
    }
}
