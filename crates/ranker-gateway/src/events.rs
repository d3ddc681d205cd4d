//! Wire models: inbound commands and outbound events.
//!
//! Both directions are closed, tagged variant sets so the boundary can
//! validate schemas up front and handle every case exhaustively. Envelopes
//! serialize as `{"type": …, "payload": …}` with snake_case tags.

use ranker_engine::{ErrorKind, NominationId, ParticipantId, Poll};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Participant action submitted over an established connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ClientCommand {
    Nominate { text: String },
    RemoveNomination { id: NominationId },
    StartVote,
    SubmitRankings { rankings: Vec<NominationId> },
    RemoveParticipant { id: ParticipantId },
    CancelPoll,
    ClosePoll,
}

/// Event pushed to subscribed connections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Full canonical poll state; sent on subscribe and after every
    /// successful mutation.
    PollSnapshot(Box<Poll>),
    /// Lightweight notice emitted once per new participant join.
    JoinNotification(JoinNotification),
    /// Failure report, sent only to the connection whose action failed.
    ActionError(ActionError),
}

impl ServerEvent {
    pub fn snapshot(poll: Poll) -> Self {
        ServerEvent::PollSnapshot(Box::new(poll))
    }
}

/// Transient "X joined" notice, distinct from the full snapshot so UI layers
/// need not diff state to render it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinNotification {
    pub participant_id: ParticipantId,
    pub display_name: String,
    pub poll_id: String,
    pub topic: String,
}

/// Error report with a unique instance id so clients can dismiss each one
/// independently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionError {
    pub id: String,
    pub kind: ErrorKind,
    pub message: String,
}

impl ActionError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            message: message.into(),
        }
    }
}
