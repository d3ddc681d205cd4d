//! Poll session coordinator.
//!
//! Single authority per poll: the only component that calls store mutators.
//! A top-level registry maps poll id → session handle; each session owns its
//! store behind its own async mutex, so two different polls never contend on
//! the same lock. Every inbound action is applied under the poll's mutex and
//! the resulting snapshot is fanned out before the mutex is released, so
//! delivery order on every connection's queue matches commit order. Failures
//! are reported to the originating connection only.

use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::time::Instant;

use dashmap::DashMap;
use ranker_engine::{ids, Phase, Poll, PollError, PollStore};
use tokio::sync::{mpsc, Mutex};
use tracing::{info, warn};

use crate::auth::Authed;
use crate::config::PollsConfig;
use crate::events::{ActionError, ClientCommand, JoinNotification, ServerEvent};
use crate::rooms::{ConnectionId, RoomRegistry};

/// One poll's serialization domain: the store plus idle-tracking metadata.
struct PollSession {
    store: Mutex<PollStore>,
    last_activity: StdMutex<Instant>,
}

impl PollSession {
    fn new(store: PollStore) -> Self {
        Self {
            store: Mutex::new(store),
            last_activity: StdMutex::new(Instant::now()),
        }
    }

    fn touch(&self) {
        if let Ok(mut at) = self.last_activity.lock() {
            *at = Instant::now();
        }
    }

    fn idle_for(&self) -> std::time::Duration {
        self.last_activity
            .lock()
            .map(|at| at.elapsed())
            .unwrap_or_default()
    }
}

/// Orchestrator for all polls owned by this process.
pub struct Coordinator {
    sessions: DashMap<String, Arc<PollSession>>,
    rooms: Arc<RoomRegistry>,
    config: PollsConfig,
}

impl Coordinator {
    pub fn new(rooms: Arc<RoomRegistry>, config: PollsConfig) -> Self {
        Self {
            sessions: DashMap::new(),
            rooms,
            config,
        }
    }

    pub fn rooms(&self) -> Arc<RoomRegistry> {
        Arc::clone(&self.rooms)
    }

    /// Create a new poll with `admin_id` enrolled as admin, returning the
    /// initial snapshot.
    pub fn create_poll(
        &self,
        topic: String,
        votes_per_voter: usize,
        admin_id: String,
        admin_name: String,
    ) -> Poll {
        let mut poll_id = ids::create_poll_id();
        while self.sessions.contains_key(&poll_id) {
            poll_id = ids::create_poll_id();
        }
        let store = PollStore::new(
            poll_id.clone(),
            topic,
            votes_per_voter,
            admin_id,
            admin_name,
        )
        .with_max_nomination_len(self.config.max_nomination_len);
        let snapshot = store.snapshot();

        self.sessions
            .insert(poll_id.clone(), Arc::new(PollSession::new(store)));
        info!(poll_id, "Poll created");
        snapshot
    }

    /// Current phase of a poll, if it exists. Used by the join boundary.
    pub async fn poll_phase(&self, poll_id: &str) -> Option<Phase> {
        let session = self.session(poll_id)?;
        let phase = session.store.lock().await.phase();
        Some(phase)
    }

    /// Display name of an enrolled participant, if the poll exists and the
    /// participant is on its roster. Used by the credential-refresh boundary.
    pub async fn participant_name(
        &self,
        poll_id: &str,
        participant_id: &str,
    ) -> Option<String> {
        let session = self.session(poll_id)?;
        let store = session.store.lock().await;
        store.participant_name(participant_id).map(str::to_owned)
    }

    /// Number of polls currently owned by this coordinator.
    pub fn poll_count(&self) -> usize {
        self.sessions.len()
    }

    /// Attach a connection to its poll: enroll the participant (idempotent
    /// for reconnects), announce a new join to the room, and register the
    /// connection for fan-out with a catch-up snapshot.
    ///
    /// Enrolled participants may reconnect to a `Closed` poll to read the
    /// results; a cancelled poll and any first-time join after voting starts
    /// are rejected. Fan-out happens under the poll mutex: the existing room
    /// is notified first, then the new connection is subscribed, so the
    /// joiner sees its catch-up snapshot exactly once.
    pub async fn join(
        &self,
        authed: &Authed,
        connection_id: ConnectionId,
        sender: mpsc::Sender<String>,
    ) -> Result<(), ActionError> {
        let Some(session) = self.session(&authed.poll_id) else {
            return Err(ActionError::new(
                PollError::NotFound(format!("poll {}", authed.poll_id)).kind(),
                format!("poll {} not found", authed.poll_id),
            ));
        };
        session.touch();

        let mut store = session.store.lock().await;
        let phase = store.phase();
        let is_new = !store.is_participant(&authed.participant_id);
        if phase == Phase::Cancelled || (phase == Phase::Closed && is_new) {
            let err = PollError::Forbidden("poll has ended".to_string());
            return Err(ActionError::new(err.kind(), err.to_string()));
        }
        if is_new && phase != Phase::Nominating {
            let err = PollError::Forbidden(
                "new participants cannot join after voting starts".to_string(),
            );
            return Err(ActionError::new(err.kind(), err.to_string()));
        }
        if phase != Phase::Closed {
            // The roster of a closed poll is frozen.
            store.add_participant(
                authed.participant_id.clone(),
                authed.display_name.clone(),
            );
        }
        let snapshot = store.snapshot();

        if is_new {
            self.rooms.broadcast(
                &authed.poll_id,
                &ServerEvent::JoinNotification(JoinNotification {
                    participant_id: authed.participant_id.clone(),
                    display_name: authed.display_name.clone(),
                    poll_id: authed.poll_id.clone(),
                    topic: snapshot.topic.clone(),
                }),
            );
            // Existing subscribers see the updated roster; the joiner gets
            // the same state through the catch-up below.
            self.rooms
                .broadcast(&authed.poll_id, &ServerEvent::snapshot(snapshot.clone()));
        }
        self.rooms.subscribe(
            &authed.poll_id,
            connection_id,
            sender,
            &ServerEvent::snapshot(snapshot),
        );
        Ok(())
    }

    /// Detach a connection. In-flight actions that already hold the poll
    /// mutex still complete; the store does not know about transport state.
    pub fn disconnect(&self, poll_id: &str, connection_id: ConnectionId) {
        self.rooms.unsubscribe(poll_id, connection_id);
        if let Some(session) = self.session(poll_id) {
            session.touch();
        }
    }

    /// Apply one participant action. On success the new canonical snapshot
    /// is broadcast to the room; on failure an `action_error` goes to the
    /// originating connection only.
    ///
    /// The broadcast runs while the poll mutex is still held. Delivery is
    /// non-blocking `try_send`, so this costs nothing on the mutating path
    /// and guarantees snapshots hit every connection's queue in commit
    /// order; a snapshot broadcast after the lock dropped could overtake a
    /// newer one and leave clients on a stale view forever.
    pub async fn apply(&self, authed: &Authed, connection_id: ConnectionId, command: ClientCommand) {
        let Some(session) = self.session(&authed.poll_id) else {
            self.rooms.send_to(
                &authed.poll_id,
                connection_id,
                &ServerEvent::ActionError(ActionError::new(
                    PollError::NotFound(String::new()).kind(),
                    format!("poll {} not found", authed.poll_id),
                )),
            );
            return;
        };
        session.touch();

        let requester = authed.participant_id.as_str();
        let cancelled = matches!(command, ClientCommand::CancelPoll);

        let mut store = session.store.lock().await;
        let result = match &command {
            ClientCommand::Nominate { text } => {
                store.add_nomination(requester, text).map(|_| ())
            }
            ClientCommand::RemoveNomination { id } => store.remove_nomination(requester, id),
            ClientCommand::StartVote => store.start_vote(requester),
            ClientCommand::SubmitRankings { rankings } => {
                store.submit_ranking(requester, rankings.clone())
            }
            ClientCommand::RemoveParticipant { id } => {
                if requester != store.admin_id() {
                    Err(PollError::Forbidden(
                        "admin privileges required".to_string(),
                    ))
                } else {
                    store.remove_participant(id)
                }
            }
            ClientCommand::CancelPoll => store.cancel_poll(requester),
            ClientCommand::ClosePoll => store.close_poll(requester),
        };

        match result {
            Err(e) => {
                self.rooms.send_to(
                    &authed.poll_id,
                    connection_id,
                    &ServerEvent::ActionError(ActionError::new(e.kind(), e.to_string())),
                );
            }
            Ok(()) => {
                let snapshot = store.snapshot();
                self.rooms
                    .broadcast(&authed.poll_id, &ServerEvent::snapshot(snapshot));
                if cancelled {
                    self.teardown(&authed.poll_id, "cancelled by admin");
                }
            }
        }
    }

    /// Periodic housekeeping: tear down polls that are terminal with no
    /// listeners, or idle with zero connections longer than the configured
    /// timeout. Per-poll work only; one poll's teardown never blocks others.
    pub fn spawn_housekeeping(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let coordinator = Arc::clone(self);
        let interval = self.config.housekeeping_interval();
        let idle_timeout = self.config.idle_timeout();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                coordinator.sweep(idle_timeout);
            }
        })
    }

    fn sweep(&self, idle_timeout: std::time::Duration) {
        let mut expired = Vec::new();
        for entry in self.sessions.iter() {
            let poll_id = entry.key();
            if self.rooms.connection_count(poll_id) > 0 {
                continue;
            }
            // A session busy applying an action is not idle; skip it.
            let Ok(store) = entry.value().store.try_lock() else {
                continue;
            };
            if store.phase().is_terminal() || entry.value().idle_for() >= idle_timeout {
                expired.push(poll_id.clone());
            }
        }
        for poll_id in expired {
            self.teardown(&poll_id, "idle");
        }
    }

    fn teardown(&self, poll_id: &str, reason: &str) {
        if self.sessions.remove(poll_id).is_some() {
            self.rooms.drop_room(poll_id);
            info!(poll_id, reason, "Poll torn down");
        } else {
            warn!(poll_id, "Teardown requested for unknown poll");
        }
    }

    fn session(&self, poll_id: &str) -> Option<Arc<PollSession>> {
        self.sessions.get(poll_id).map(|s| Arc::clone(s.value()))
    }
}
