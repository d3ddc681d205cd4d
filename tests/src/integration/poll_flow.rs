//! # Poll Lifecycle Flows
//!
//! Tests that ranker-gateway's coordinator, room registry, and token
//! verifier work together against the ranker-engine store the way a real
//! client session does:
//!
//! 1. **Credential → Join**: a minted token is the only way into a room
//! 2. **Action → Broadcast**: every accepted action republishes the snapshot
//! 3. **Close → Results**: the final snapshot carries the computed tally

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use ranker_engine::{Phase, Poll};
    use ranker_gateway::auth::TokenVerifier;
    use ranker_gateway::config::PollsConfig;
    use ranker_gateway::{Authed, ClientCommand, ConnectionId, Coordinator, RoomRegistry};
    use serde_json::Value;
    use tokio::sync::mpsc;
    use uuid::Uuid;

    // =========================================================================
    // TEST FIXTURES
    // =========================================================================

    fn harness() -> (Arc<Coordinator>, TokenVerifier) {
        let rooms = Arc::new(RoomRegistry::new(64));
        let coordinator = Arc::new(Coordinator::new(rooms, PollsConfig::default()));
        let verifier = TokenVerifier::new(b"integration-secret", Duration::from_secs(3600));
        (coordinator, verifier)
    }

    /// Run the full client entry path: mint a token, verify it back into an
    /// identity, and attach a connection with that identity.
    async fn connect(
        coordinator: &Coordinator,
        verifier: &TokenVerifier,
        poll_id: &str,
        participant_id: &str,
        name: &str,
    ) -> (Authed, ConnectionId, mpsc::Receiver<String>) {
        let token = verifier.issue(poll_id, participant_id, name).unwrap();
        let authed = verifier.verify(&token).unwrap();
        let connection_id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(64);
        coordinator.join(&authed, connection_id, tx).await.unwrap();
        (authed, connection_id, rx)
    }

    fn drain(rx: &mut mpsc::Receiver<String>) -> Vec<Value> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(serde_json::from_str(&msg).unwrap());
        }
        out
    }

    /// Most recent full-state broadcast among the drained events.
    fn last_snapshot(events: &[Value]) -> &Value {
        events
            .iter()
            .rev()
            .find(|e| e["type"] == "poll_snapshot")
            .map(|e| &e["payload"])
            .expect("no snapshot in drained events")
    }

    fn nomination_id_for<'a>(snapshot: &'a Value, text: &str) -> &'a str {
        snapshot["nominations"]
            .as_object()
            .unwrap()
            .iter()
            .find(|(_, n)| n["text"] == text)
            .map(|(id, _)| id.as_str())
            .unwrap()
    }

    // =========================================================================
    // INTEGRATION TESTS: CREDENTIALED ENTRY
    // =========================================================================

    #[tokio::test]
    async fn test_token_gated_join_delivers_catch_up_snapshot() {
        let (coordinator, verifier) = harness();
        let poll = coordinator.create_poll("lunch".into(), 2, "alice".into(), "Alice".into());

        let (_, _, mut rx) = connect(&coordinator, &verifier, &poll.id, "alice", "Alice").await;

        let events = drain(&mut rx);
        let snapshot = last_snapshot(&events);
        assert_eq!(snapshot["topic"], "lunch");
        assert_eq!(snapshot["adminId"], "alice");
        assert_eq!(snapshot["participants"]["alice"], "Alice");

        // The payload round-trips into the canonical state type.
        let typed: Poll = serde_json::from_value(snapshot.clone()).unwrap();
        assert_eq!(typed.phase, Phase::Nominating);
        assert_eq!(typed.votes_per_voter, 2);
    }

    #[tokio::test]
    async fn test_tampered_credential_never_reaches_a_room() {
        let (_, verifier) = harness();
        let token = verifier.issue("ABC123", "alice", "Alice").unwrap();

        let other = TokenVerifier::new(b"some-other-secret", Duration::from_secs(3600));
        assert!(other.verify(&token).is_err());
    }

    // =========================================================================
    // INTEGRATION TESTS: FULL LIFECYCLE
    // =========================================================================

    #[tokio::test]
    async fn test_full_lifecycle_elects_a_winner() {
        let (c, verifier) = harness();
        let poll = c.create_poll("lunch".into(), 2, "alice".into(), "Alice".into());

        let (alice, aconn, mut arx) = connect(&c, &verifier, &poll.id, "alice", "Alice").await;
        let (bob, bconn, mut brx) = connect(&c, &verifier, &poll.id, "bob", "Bob").await;
        let (carol, cconn, mut crx) = connect(&c, &verifier, &poll.id, "carol", "Carol").await;

        for (who, conn, text) in [
            (&alice, aconn, "ramen"),
            (&bob, bconn, "tacos"),
            (&carol, cconn, "pizza"),
        ] {
            c.apply(who, conn, ClientCommand::Nominate { text: text.into() })
                .await;
        }
        c.apply(&alice, aconn, ClientCommand::StartVote).await;

        let events = drain(&mut brx);
        let snapshot = last_snapshot(&events);
        assert_eq!(snapshot["phase"], "voting");
        let ramen = nomination_id_for(snapshot, "ramen").to_string();
        let tacos = nomination_id_for(snapshot, "tacos").to_string();
        let pizza = nomination_id_for(snapshot, "pizza").to_string();

        // Two points for first place, one for second.
        // ramen = 2 + 2 + 1 = 5, tacos = 1 + 2 = 3, pizza = 1.
        for (who, conn, order) in [
            (&alice, aconn, vec![ramen.clone(), tacos.clone()]),
            (&bob, bconn, vec![ramen.clone(), pizza.clone()]),
            (&carol, cconn, vec![tacos.clone(), ramen.clone()]),
        ] {
            c.apply(who, conn, ClientCommand::SubmitRankings { rankings: order })
                .await;
        }
        c.apply(&alice, aconn, ClientCommand::ClosePoll).await;

        // Every subscriber sees the same closing snapshot.
        for rx in [&mut arx, &mut brx, &mut crx] {
            let events = drain(rx);
            let snapshot = last_snapshot(&events);
            assert_eq!(snapshot["phase"], "closed");
            let results = snapshot["results"].as_array().unwrap();
            assert_eq!(results.len(), 3);
            assert_eq!(results[0]["nominationText"], "ramen");
            assert_eq!(results[0]["score"], 5);
            assert_eq!(results[1]["nominationText"], "tacos");
            assert_eq!(results[1]["score"], 3);
            assert_eq!(results[2]["nominationText"], "pizza");
            assert_eq!(results[2]["score"], 1);
        }
    }

    #[tokio::test]
    async fn test_resubmitted_ranking_replaces_the_previous_one() {
        let (c, verifier) = harness();
        let poll = c.create_poll("lunch".into(), 2, "alice".into(), "Alice".into());
        let (alice, aconn, mut arx) = connect(&c, &verifier, &poll.id, "alice", "Alice").await;

        c.apply(&alice, aconn, ClientCommand::Nominate { text: "ramen".into() })
            .await;
        c.apply(&alice, aconn, ClientCommand::Nominate { text: "tacos".into() })
            .await;
        c.apply(&alice, aconn, ClientCommand::StartVote).await;

        let events = drain(&mut arx);
        let snapshot = last_snapshot(&events);
        let ramen = nomination_id_for(snapshot, "ramen").to_string();
        let tacos = nomination_id_for(snapshot, "tacos").to_string();

        c.apply(
            &alice,
            aconn,
            ClientCommand::SubmitRankings {
                rankings: vec![ramen.clone(), tacos.clone()],
            },
        )
        .await;
        c.apply(
            &alice,
            aconn,
            ClientCommand::SubmitRankings {
                rankings: vec![tacos.clone(), ramen.clone()],
            },
        )
        .await;
        c.apply(&alice, aconn, ClientCommand::ClosePoll).await;

        let events = drain(&mut arx);
        let snapshot = last_snapshot(&events);
        let results = snapshot["results"].as_array().unwrap();
        assert_eq!(results[0]["nominationText"], "tacos");
        assert_eq!(results[0]["score"], 2);
        assert_eq!(results[1]["nominationText"], "ramen");
        assert_eq!(results[1]["score"], 1);
    }

    // =========================================================================
    // INTEGRATION TESTS: ADMIN AUTHORITY
    // =========================================================================

    #[tokio::test]
    async fn test_removed_participant_loses_their_ranking() {
        let (c, verifier) = harness();
        let poll = c.create_poll("lunch".into(), 1, "alice".into(), "Alice".into());
        let (alice, aconn, mut arx) = connect(&c, &verifier, &poll.id, "alice", "Alice").await;
        let (bob, bconn, _brx) = connect(&c, &verifier, &poll.id, "bob", "Bob").await;

        c.apply(&alice, aconn, ClientCommand::Nominate { text: "ramen".into() })
            .await;
        c.apply(&alice, aconn, ClientCommand::Nominate { text: "tacos".into() })
            .await;
        c.apply(&alice, aconn, ClientCommand::StartVote).await;

        let events = drain(&mut arx);
        let snapshot = last_snapshot(&events);
        let ramen = nomination_id_for(snapshot, "ramen").to_string();
        let tacos = nomination_id_for(snapshot, "tacos").to_string();

        c.apply(
            &alice,
            aconn,
            ClientCommand::SubmitRankings {
                rankings: vec![ramen.clone()],
            },
        )
        .await;
        c.apply(
            &bob,
            bconn,
            ClientCommand::SubmitRankings {
                rankings: vec![tacos.clone()],
            },
        )
        .await;
        c.apply(
            &alice,
            aconn,
            ClientCommand::RemoveParticipant { id: "bob".into() },
        )
        .await;
        c.apply(&alice, aconn, ClientCommand::ClosePoll).await;

        let events = drain(&mut arx);
        let snapshot = last_snapshot(&events);
        assert!(snapshot["participants"].get("bob").is_none());
        // Bob's ranking left with him; only Alice's vote counts.
        let results = snapshot["results"].as_array().unwrap();
        let by_text: Vec<(&str, u64)> = results
            .iter()
            .map(|r| {
                (
                    r["nominationText"].as_str().unwrap(),
                    r["score"].as_u64().unwrap(),
                )
            })
            .collect();
        assert!(by_text.contains(&("ramen", 1)));
        assert!(by_text.contains(&("tacos", 0)));
    }

    #[tokio::test]
    async fn test_non_admin_eviction_attempt_rejected_without_side_effects() {
        let (c, verifier) = harness();
        let poll = c.create_poll("lunch".into(), 1, "alice".into(), "Alice".into());
        let (_alice, _aconn, mut arx) = connect(&c, &verifier, &poll.id, "alice", "Alice").await;
        let (bob, bconn, mut brx) = connect(&c, &verifier, &poll.id, "bob", "Bob").await;
        drain(&mut arx);
        drain(&mut brx);

        c.apply(
            &bob,
            bconn,
            ClientCommand::RemoveParticipant { id: "alice".into() },
        )
        .await;

        // The failure goes to Bob alone; Alice sees no traffic at all.
        let bob_events = drain(&mut brx);
        assert_eq!(bob_events.len(), 1);
        assert_eq!(bob_events[0]["type"], "action_error");
        assert_eq!(bob_events[0]["payload"]["kind"], "forbidden");
        assert!(drain(&mut arx).is_empty());

        // Both participants are still enrolled.
        c.apply(&bob, bconn, ClientCommand::Nominate { text: "x".into() })
            .await;
        let events = drain(&mut brx);
        let snapshot = last_snapshot(&events);
        assert_eq!(snapshot["participants"].as_object().unwrap().len(), 2);
    }
}
