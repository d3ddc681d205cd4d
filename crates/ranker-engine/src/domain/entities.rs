//! Core poll entities and the lifecycle phase machine.
//!
//! All snapshot types serialize with camelCase field names, matching the
//! wire shape consumed by poll clients.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Six-character join code identifying one poll.
pub type PollId = String;

/// Stable participant identity, derived from the verified access token.
pub type ParticipantId = String;

/// Server-generated nomination identifier, unique within its poll.
pub type NominationId = String;

/// Candidate option proposed by a participant during the nominating phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Nomination {
    pub id: NominationId,
    pub author_id: ParticipantId,
    pub text: String,
}

/// Poll lifecycle phase.
///
/// `Nominating → Voting → Closed`; `Cancelled` is reachable from any
/// non-terminal phase. No phase is ever revisited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Nominating,
    Voting,
    Closed,
    Cancelled,
}

impl Phase {
    /// Terminal phases accept no further mutation.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Closed | Phase::Cancelled)
    }
}

/// One scored entry of the final tally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedResult {
    pub nomination_id: NominationId,
    pub nomination_text: String,
    pub score: u64,
}

/// Full canonical state of one poll.
///
/// A snapshot of this struct is sufficient to reconstruct any client-side
/// view with no prior history. Maps are `BTreeMap` so that iteration order
/// (and therefore serialized output) is deterministic for identical state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Poll {
    pub id: PollId,
    pub topic: String,
    pub admin_id: ParticipantId,
    pub votes_per_voter: usize,
    pub phase: Phase,
    /// Roster: participant id → display name.
    pub participants: BTreeMap<ParticipantId, String>,
    pub nominations: BTreeMap<NominationId, Nomination>,
    /// Last submitted ranking per participant, most-preferred first.
    pub rankings: BTreeMap<ParticipantId, Vec<NominationId>>,
    /// Empty until the poll closes; then the computed tally, best first.
    pub results: Vec<RankedResult>,
}

impl Poll {
    /// Create a fresh poll in the `Nominating` phase with the creator
    /// already enrolled as admin.
    pub fn new(
        id: PollId,
        topic: String,
        votes_per_voter: usize,
        admin_id: ParticipantId,
        admin_name: String,
    ) -> Self {
        let mut participants = BTreeMap::new();
        participants.insert(admin_id.clone(), admin_name);
        Self {
            id,
            topic,
            admin_id,
            votes_per_voter,
            phase: Phase::Nominating,
            participants,
            nominations: BTreeMap::new(),
            rankings: BTreeMap::new(),
            results: Vec::new(),
        }
    }
}
