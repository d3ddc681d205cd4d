//! Authoritative in-memory poll state store.
//!
//! Owns the canonical [`Poll`] record for one poll. Every mutator is
//! all-or-nothing: it validates first and only then touches state, so a
//! failed call leaves the poll exactly as it was. The store itself is not
//! synchronized; the session coordinator serializes access behind a per-poll
//! mutex.

use std::collections::HashSet;

use tracing::debug;

use crate::domain::entities::{Nomination, NominationId, ParticipantId, Phase, Poll, PollId};
use crate::domain::errors::PollError;
use crate::domain::tally;
use crate::ids;

/// Default upper bound on nomination text length, in characters.
pub const DEFAULT_MAX_NOMINATION_LEN: usize = 100;

/// Mutable holder of one poll's canonical state.
#[derive(Debug)]
pub struct PollStore {
    poll: Poll,
    max_nomination_len: usize,
}

impl PollStore {
    /// Create the store for a new poll, enrolling the creator as admin.
    pub fn new(
        id: PollId,
        topic: String,
        votes_per_voter: usize,
        admin_id: ParticipantId,
        admin_name: String,
    ) -> Self {
        Self {
            poll: Poll::new(id, topic, votes_per_voter, admin_id, admin_name),
            max_nomination_len: DEFAULT_MAX_NOMINATION_LEN,
        }
    }

    /// Override the nomination text length bound.
    pub fn with_max_nomination_len(mut self, max_len: usize) -> Self {
        self.max_nomination_len = max_len;
        self
    }

    /// Atomic read of the full poll state.
    pub fn snapshot(&self) -> Poll {
        self.poll.clone()
    }

    pub fn poll_id(&self) -> &PollId {
        &self.poll.id
    }

    pub fn admin_id(&self) -> &ParticipantId {
        &self.poll.admin_id
    }

    pub fn phase(&self) -> Phase {
        self.poll.phase
    }

    pub fn is_participant(&self, id: &str) -> bool {
        self.poll.participants.contains_key(id)
    }

    /// Display name of an enrolled participant.
    pub fn participant_name(&self, id: &str) -> Option<&str> {
        self.poll.participants.get(id).map(String::as_str)
    }

    /// Enroll a participant, or update the display name of an existing one.
    ///
    /// Idempotent: a re-join with the same id never duplicates the roster
    /// entry.
    pub fn add_participant(&mut self, id: ParticipantId, name: String) {
        self.poll.participants.insert(id, name);
    }

    /// Remove a participant from the roster.
    ///
    /// The admin cannot be removed while other participants remain; tearing
    /// the poll down in that situation requires `cancel_poll`.
    pub fn remove_participant(&mut self, id: &str) -> Result<(), PollError> {
        if !self.poll.participants.contains_key(id) {
            return Err(PollError::NotFound(format!("participant {id}")));
        }
        if id == self.poll.admin_id && self.poll.participants.len() > 1 {
            return Err(PollError::InvalidOperation(
                "admin cannot leave while other participants remain".to_string(),
            ));
        }
        self.poll.participants.remove(id);
        self.poll.rankings.remove(id);
        Ok(())
    }

    /// Add a nomination authored by `author_id`, returning its generated id.
    pub fn add_nomination(
        &mut self,
        author_id: &str,
        text: &str,
    ) -> Result<NominationId, PollError> {
        if self.poll.phase != Phase::Nominating {
            return Err(PollError::Forbidden(
                "nominations are only accepted before voting starts".to_string(),
            ));
        }
        if !self.poll.participants.contains_key(author_id) {
            return Err(PollError::NotFound(format!("participant {author_id}")));
        }
        let text = text.trim();
        if text.is_empty() {
            return Err(PollError::InvalidArgument(
                "nomination text must not be empty".to_string(),
            ));
        }
        if text.chars().count() > self.max_nomination_len {
            return Err(PollError::InvalidArgument(format!(
                "nomination text exceeds {} characters",
                self.max_nomination_len
            )));
        }

        let mut id = ids::create_nomination_id();
        // Vanishingly unlikely, but ids must be unique within the poll.
        while self.poll.nominations.contains_key(&id) {
            id = ids::create_nomination_id();
        }
        self.poll.nominations.insert(
            id.clone(),
            Nomination {
                id: id.clone(),
                author_id: author_id.to_string(),
                text: text.to_string(),
            },
        );
        Ok(id)
    }

    /// Remove a nomination. Only the author or the admin may remove one, and
    /// only before voting starts.
    pub fn remove_nomination(
        &mut self,
        requester_id: &str,
        nomination_id: &str,
    ) -> Result<(), PollError> {
        if self.poll.phase != Phase::Nominating {
            return Err(PollError::Forbidden(
                "nominations are immutable once voting starts".to_string(),
            ));
        }
        let Some(nomination) = self.poll.nominations.get(nomination_id) else {
            return Err(PollError::NotFound(format!("nomination {nomination_id}")));
        };
        if requester_id != nomination.author_id && requester_id != self.poll.admin_id {
            return Err(PollError::Forbidden(
                "only the author or the admin may remove a nomination".to_string(),
            ));
        }
        self.poll.nominations.remove(nomination_id);
        Ok(())
    }

    /// Transition `Nominating → Voting`. Admin only; requires at least
    /// `votes_per_voter` nominations.
    pub fn start_vote(&mut self, requester_id: &str) -> Result<(), PollError> {
        self.require_admin(requester_id)?;
        if self.poll.phase != Phase::Nominating {
            return Err(PollError::Forbidden(format!(
                "cannot start voting from phase {:?}",
                self.poll.phase
            )));
        }
        let nomination_count = self.poll.nominations.len();
        if nomination_count < self.poll.votes_per_voter {
            return Err(PollError::PreconditionFailed(format!(
                "need at least {} nominations to start voting, have {}",
                self.poll.votes_per_voter, nomination_count
            )));
        }
        self.transition(Phase::Voting);
        Ok(())
    }

    /// Record a participant's ranking, replacing any prior submission.
    ///
    /// A rejected submission leaves the participant's existing ranking (if
    /// any) untouched.
    pub fn submit_ranking(
        &mut self,
        participant_id: &str,
        ordered_nomination_ids: Vec<NominationId>,
    ) -> Result<(), PollError> {
        if self.poll.phase != Phase::Voting {
            return Err(PollError::Forbidden(
                "rankings are only accepted while voting is open".to_string(),
            ));
        }
        if !self.poll.participants.contains_key(participant_id) {
            return Err(PollError::NotFound(format!("participant {participant_id}")));
        }
        if ordered_nomination_ids.len() > self.poll.nominations.len() {
            return Err(PollError::InvalidArgument(
                "ranking lists more entries than there are nominations".to_string(),
            ));
        }
        let mut seen = HashSet::with_capacity(ordered_nomination_ids.len());
        for id in &ordered_nomination_ids {
            if !self.poll.nominations.contains_key(id) {
                return Err(PollError::InvalidArgument(format!(
                    "ranking references unknown nomination {id}"
                )));
            }
            if !seen.insert(id) {
                return Err(PollError::InvalidArgument(format!(
                    "ranking contains duplicate nomination {id}"
                )));
            }
        }
        self.poll
            .rankings
            .insert(participant_id.to_string(), ordered_nomination_ids);
        Ok(())
    }

    /// Terminal transition to `Cancelled`, valid from any non-terminal phase.
    pub fn cancel_poll(&mut self, requester_id: &str) -> Result<(), PollError> {
        self.require_admin(requester_id)?;
        if self.poll.phase.is_terminal() {
            return Err(PollError::Forbidden(format!(
                "poll already in terminal phase {:?}",
                self.poll.phase
            )));
        }
        self.transition(Phase::Cancelled);
        Ok(())
    }

    /// Compute the tally and transition `Voting → Closed`.
    ///
    /// Results are written before the phase flips, so the first `Closed`
    /// snapshot already carries them. Re-tallying identical input would be
    /// idempotent, but the one-way phase machine makes a second close
    /// impossible anyway.
    pub fn close_poll(&mut self, requester_id: &str) -> Result<(), PollError> {
        self.require_admin(requester_id)?;
        if self.poll.phase != Phase::Voting {
            return Err(PollError::Forbidden(format!(
                "cannot close a poll from phase {:?}",
                self.poll.phase
            )));
        }
        self.poll.results = tally::compute_results(
            &self.poll.nominations,
            &self.poll.rankings,
            self.poll.votes_per_voter,
        );
        self.transition(Phase::Closed);
        Ok(())
    }

    fn require_admin(&self, requester_id: &str) -> Result<(), PollError> {
        if requester_id != self.poll.admin_id {
            return Err(PollError::Forbidden(
                "admin privileges required".to_string(),
            ));
        }
        Ok(())
    }

    fn transition(&mut self, next: Phase) {
        debug!(
            poll_id = %self.poll.id,
            from = ?self.poll.phase,
            to = ?next,
            "Poll phase transition"
        );
        self.poll.phase = next;
    }
}
