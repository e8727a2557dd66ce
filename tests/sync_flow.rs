//! Two clients editing the same board through a local relay server.
//!
//! The relay forwards each client's board updates to every other client and
//! announces joins, which is all the realtime backend does.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

use boardsync::config::RealtimeConfig;
use boardsync::gateway::InMemoryGateway;
use boardsync::model::{Board, BoardId, Column, ColumnId, Task, TaskId, UserId, Visibility};
use boardsync::realtime::{Identity, RealtimeChannel};
use boardsync::session::BoardSession;
use boardsync::store::BoardStore;

const WAIT: Duration = Duration::from_secs(3);

/// Rewrite a client frame into what the relay pushes to the other clients.
fn relay_frame(frame: &Value) -> Option<Value> {
    let data = &frame["data"];
    match frame["event"].as_str()? {
        "joinBoard" => Some(json!({
            "event": "userActive",
            "data": {"userId": data["userId"], "userName": data["userName"]},
        })),
        "boardContentUpdate" => Some(json!({
            "event": "boardContentUpdated",
            "data": {
                "boardId": data["boardId"],
                "content": data["content"],
                "lastModified": data["lastModified"],
            },
        })),
        _ => None,
    }
}

async fn start_relay() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    let (hub, _) = broadcast::channel::<(usize, String)>(64);

    tokio::spawn(async move {
        let mut next_id = 0;
        while let Ok((stream, _)) = listener.accept().await {
            let id = next_id;
            next_id += 1;
            let hub = hub.clone();
            // Subscribe before the handshake completes so nothing is missed.
            let mut peers = hub.subscribe();
            tokio::spawn(async move {
                let Ok(ws) = accept_async(stream).await else {
                    return;
                };
                let (mut sink, mut stream) = ws.split();
                loop {
                    tokio::select! {
                        incoming = stream.next() => match incoming {
                            Some(Ok(Message::Text(text))) => {
                                let Ok(frame) = serde_json::from_str::<Value>(text.as_str()) else {
                                    continue;
                                };
                                if let Some(out) = relay_frame(&frame) {
                                    let _ = hub.send((id, out.to_string()));
                                }
                            }
                            Some(Ok(_)) => {}
                            _ => break,
                        },
                        relayed = peers.recv() => match relayed {
                            Ok((from, text)) if from != id => {
                                if sink.send(Message::Text(text.into())).await.is_err() {
                                    break;
                                }
                            }
                            Ok(_) => {}
                            Err(_) => break,
                        },
                    }
                }
            });
        }
    });

    url
}

fn seeded_gateway() -> InMemoryGateway {
    let gateway = InMemoryGateway::new();
    let column = |id: &str, position, tasks| Column {
        id: ColumnId::from(id),
        board_id: BoardId::from("b1"),
        title: id.to_uppercase(),
        position,
        tasks,
    };
    gateway.seed_board(
        Board {
            id: BoardId::from("b1"),
            title: "Roadmap".into(),
            description: None,
            visibility: Visibility::Workspace,
        },
        vec![
            column(
                "c1",
                0,
                vec![Task::new(TaskId::from("t1"), ColumnId::from("c1"), "Write docs", 0)],
            ),
            column("c2", 1, vec![]),
        ],
    );
    gateway
}

async fn open_client(gateway: &InMemoryGateway, url: &str, user: &str) -> BoardSession {
    let store = BoardStore::new(Arc::new(gateway.clone()));
    let channel = RealtimeChannel::new(
        RealtimeConfig {
            url: url.to_string(),
            ..RealtimeConfig::default()
        },
        Identity {
            user_id: Some(UserId::from(user)),
            user_name: Some(user.to_string()),
        },
    );
    let session = BoardSession::open(store, Some(channel), &BoardId::from("b1"))
        .await
        .unwrap();
    assert!(session.is_synced());
    session
}

async fn eventually(what: &str, check: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + WAIT;
    while !check() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {what}"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

fn column_ids(session: &BoardSession) -> Vec<String> {
    session
        .store()
        .snapshot()
        .unwrap()
        .columns
        .iter()
        .map(|c| c.id.to_string())
        .collect()
}

#[tokio::test]
async fn column_reorder_reaches_the_other_client() {
    let url = start_relay().await;
    let gateway = seeded_gateway();
    let alice = open_client(&gateway, &url, "alice").await;
    let bob = open_client(&gateway, &url, "bob").await;

    alice
        .store()
        .move_column(&ColumnId::from("c2"), 0)
        .unwrap()
        .await
        .unwrap();
    assert_eq!(column_ids(&alice), vec!["c2", "c1"]);

    eventually("bob to see the new column order", || {
        column_ids(&bob) == vec!["c2", "c1"]
    })
    .await;
    // Applied in place, no extra fetch.
    assert_eq!(gateway.count("fetch_columns"), 2);

    alice.close().await;
    bob.close().await;
}

#[tokio::test]
async fn created_task_and_presence_reach_the_other_client() {
    let url = start_relay().await;
    let gateway = seeded_gateway();
    let alice = open_client(&gateway, &url, "alice").await;
    let bob = open_client(&gateway, &url, "bob").await;

    let channel = alice.channel().unwrap().clone();
    eventually("alice to see bob join", || {
        channel
            .presence()
            .iter()
            .any(|entry| entry.user_id == UserId::from("bob"))
    })
    .await;

    let task = bob
        .store()
        .add_task(&ColumnId::from("c2"), "Review docs")
        .await
        .unwrap();

    eventually("alice to see bob's task", || {
        alice.store().task(&task.id).is_some()
    })
    .await;
    let seen = alice.store().task(&task.id).unwrap();
    assert_eq!(seen.title, "Review docs");
    assert_eq!(seen.column_id, ColumnId::from("c2"));

    alice.close().await;
    bob.close().await;
}
