//! # Concurrent Action Flows
//!
//! Tests that the per-poll mutex serializes simultaneous actions from many
//! connections without losing updates, and that one connection's failure
//! never leaks into another's event stream.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use futures::future::join_all;
    use ranker_gateway::config::PollsConfig;
    use ranker_gateway::{Authed, ClientCommand, ConnectionId, Coordinator, RoomRegistry};
    use serde_json::Value;
    use tokio::sync::mpsc;
    use uuid::Uuid;

    // =========================================================================
    // TEST FIXTURES
    // =========================================================================

    fn coordinator() -> Arc<Coordinator> {
        let rooms = Arc::new(RoomRegistry::new(256));
        Arc::new(Coordinator::new(rooms, PollsConfig::default()))
    }

    fn authed(poll_id: &str, participant_id: &str, name: &str) -> Authed {
        Authed {
            participant_id: participant_id.to_string(),
            display_name: name.to_string(),
            poll_id: poll_id.to_string(),
            expires_at: usize::MAX,
        }
    }

    async fn connect(
        c: &Coordinator,
        who: &Authed,
    ) -> (ConnectionId, mpsc::Receiver<String>) {
        let conn = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(256);
        c.join(who, conn, tx).await.unwrap();
        (conn, rx)
    }

    fn drain(rx: &mut mpsc::Receiver<String>) -> Vec<Value> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(serde_json::from_str(&msg).unwrap());
        }
        out
    }

    /// Reconnect an enrolled participant and read the catch-up snapshot.
    /// Taken under the poll mutex, so it is a consistent view of everything
    /// applied before the reconnect.
    async fn settled_snapshot(c: &Coordinator, who: &Authed) -> Value {
        let (_, mut rx) = connect(c, who).await;
        let first = rx.recv().await.unwrap();
        let event: Value = serde_json::from_str(&first).unwrap();
        assert_eq!(event["type"], "poll_snapshot");
        event["payload"].clone()
    }

    // =========================================================================
    // INTEGRATION TESTS: NO LOST UPDATES
    // =========================================================================

    #[tokio::test(flavor = "multi_thread")]
    async fn test_concurrent_nominations_none_lost() {
        let c = coordinator();
        let poll = c.create_poll("lunch".into(), 2, "p0".into(), "Admin".into());

        let mut members = Vec::new();
        for i in 0..10 {
            let who = authed(&poll.id, &format!("p{i}"), &format!("User {i}"));
            let (conn, _rx) = connect(&c, &who).await;
            members.push((who, conn));
        }

        let mut tasks = Vec::new();
        for (who, conn) in &members {
            for j in 0..2 {
                let c = Arc::clone(&c);
                let who = who.clone();
                let conn = *conn;
                let text = format!("idea from {} #{j}", who.participant_id);
                tasks.push(tokio::spawn(async move {
                    c.apply(&who, conn, ClientCommand::Nominate { text }).await;
                }));
            }
        }
        join_all(tasks).await;

        let snapshot = settled_snapshot(&c, &members[0].0).await;
        assert_eq!(snapshot["nominations"].as_object().unwrap().len(), 20);
        assert_eq!(snapshot["participants"].as_object().unwrap().len(), 10);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_concurrent_rankings_all_recorded() {
        let c = coordinator();
        let poll = c.create_poll("lunch".into(), 2, "p0".into(), "Admin".into());

        let mut members = Vec::new();
        for i in 0..10 {
            let who = authed(&poll.id, &format!("p{i}"), &format!("User {i}"));
            let (conn, _rx) = connect(&c, &who).await;
            members.push((who, conn));
        }

        let (admin, aconn) = (members[0].0.clone(), members[0].1);
        c.apply(&admin, aconn, ClientCommand::Nominate { text: "ramen".into() })
            .await;
        c.apply(&admin, aconn, ClientCommand::Nominate { text: "tacos".into() })
            .await;
        c.apply(&admin, aconn, ClientCommand::StartVote).await;

        let snapshot = settled_snapshot(&c, &admin).await;
        let mut ids: Vec<String> = snapshot["nominations"]
            .as_object()
            .unwrap()
            .keys()
            .cloned()
            .collect();
        ids.sort();

        let tasks: Vec<_> = members
            .iter()
            .enumerate()
            .map(|(i, (who, conn))| {
                let c = Arc::clone(&c);
                let who = who.clone();
                let conn = *conn;
                let rankings = if i % 2 == 0 {
                    ids.clone()
                } else {
                    ids.iter().rev().cloned().collect()
                };
                tokio::spawn(async move {
                    c.apply(&who, conn, ClientCommand::SubmitRankings { rankings })
                        .await;
                })
            })
            .collect();
        join_all(tasks).await;

        let snapshot = settled_snapshot(&c, &admin).await;
        assert_eq!(snapshot["rankings"].as_object().unwrap().len(), 10);
    }

    // =========================================================================
    // INTEGRATION TESTS: BROADCAST ORDER MATCHES COMMIT ORDER
    // =========================================================================

    #[tokio::test(flavor = "multi_thread")]
    async fn test_closing_snapshot_is_last_on_every_queue() {
        // Rankings race the close. A ranking either commits before the close
        // (its snapshot is broadcast earlier) or fails afterwards (no
        // broadcast at all), so the final poll_snapshot every connection
        // drains must be the closed one carrying results.
        let c = coordinator();
        let poll = c.create_poll("lunch".into(), 1, "p0".into(), "Admin".into());

        let mut members = Vec::new();
        for i in 0..8 {
            let who = authed(&poll.id, &format!("p{i}"), &format!("User {i}"));
            let (conn, rx) = connect(&c, &who).await;
            members.push((who, conn, rx));
        }

        let (admin, aconn) = (members[0].0.clone(), members[0].1);
        c.apply(&admin, aconn, ClientCommand::Nominate { text: "ramen".into() })
            .await;
        c.apply(&admin, aconn, ClientCommand::StartVote).await;

        let snapshot = settled_snapshot(&c, &admin).await;
        let ids: Vec<String> = snapshot["nominations"]
            .as_object()
            .unwrap()
            .keys()
            .cloned()
            .collect();

        let mut tasks = Vec::new();
        for (who, conn, _) in members.iter().skip(1) {
            let c = Arc::clone(&c);
            let who = who.clone();
            let conn = *conn;
            let rankings = ids.clone();
            tasks.push(tokio::spawn(async move {
                c.apply(&who, conn, ClientCommand::SubmitRankings { rankings })
                    .await;
            }));
        }
        {
            let c = Arc::clone(&c);
            let admin = admin.clone();
            tasks.push(tokio::spawn(async move {
                c.apply(&admin, aconn, ClientCommand::ClosePoll).await;
            }));
        }
        join_all(tasks).await;

        for (_, _, rx) in members.iter_mut() {
            let snapshots: Vec<Value> = drain(rx)
                .into_iter()
                .filter(|e| e["type"] == "poll_snapshot")
                .collect();
            let last = snapshots.last().unwrap();
            assert_eq!(last["payload"]["phase"], "closed");
            assert!(!last["payload"]["results"].as_array().unwrap().is_empty());
        }
    }

    // =========================================================================
    // INTEGRATION TESTS: FAILURE ISOLATION UNDER CONTENTION
    // =========================================================================

    #[tokio::test(flavor = "multi_thread")]
    async fn test_start_vote_storm_only_admin_succeeds() {
        let c = coordinator();
        let poll = c.create_poll("lunch".into(), 1, "p0".into(), "Admin".into());

        let mut members = Vec::new();
        for i in 0..5 {
            let who = authed(&poll.id, &format!("p{i}"), &format!("User {i}"));
            let (conn, rx) = connect(&c, &who).await;
            members.push((who, conn, rx));
        }

        let (admin, aconn) = (members[0].0.clone(), members[0].1);
        c.apply(&admin, aconn, ClientCommand::Nominate { text: "ramen".into() })
            .await;

        let tasks: Vec<_> = members
            .iter()
            .map(|(who, conn, _)| {
                let c = Arc::clone(&c);
                let who = who.clone();
                let conn = *conn;
                tokio::spawn(async move {
                    c.apply(&who, conn, ClientCommand::StartVote).await;
                })
            })
            .collect();
        join_all(tasks).await;

        let snapshot = settled_snapshot(&c, &admin).await;
        assert_eq!(snapshot["phase"], "voting");

        // Exactly one rejection per non-admin, none for the admin.
        for (i, (_, _, rx)) in members.iter_mut().enumerate() {
            let errors: Vec<Value> = drain(rx)
                .into_iter()
                .filter(|e| e["type"] == "action_error")
                .collect();
            if i == 0 {
                assert!(errors.is_empty());
            } else {
                assert_eq!(errors.len(), 1);
                assert_eq!(errors[0]["payload"]["kind"], "forbidden");
            }
        }
    }
}
