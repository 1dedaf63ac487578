//! Client and server talking over a loopback QUIC connection

mod common;

use std::time::Duration;

use roomchat::{ChatConfig, ChatError};

use common::{connect, start_server};

fn limited(max_connections: usize) -> ChatConfig {
    ChatConfig {
        max_connections,
        ..ChatConfig::default()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn chat_round_trip() {
    let (server, addr) = start_server(limited(16)).await;

    // The default room exists before anyone joins it
    let alice = connect(addr, "alice").await.unwrap();
    let rooms = alice.list_rooms().await.unwrap();
    assert_eq!(rooms.len(), 1);
    assert_eq!(rooms[0].room_name, "general");

    assert!(alice.send_message("general", "hi").await.unwrap());
    let messages = alice.receive_messages("general", 0).await.unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].username, "alice");
    assert_eq!(messages[0].text, "hi");

    let bob = connect(addr, "bob").await.unwrap();
    let joined = bob.join_room("tech").await.unwrap();
    assert!(joined.success);
    assert_eq!(joined.user_count, 1);
    assert_eq!(joined.message, "joined room tech");

    assert!(bob.send_message("tech", "hello").await.unwrap());
    let messages = alice.receive_messages("tech", 0).await.unwrap();
    assert_eq!(messages[0].username, "bob");
    assert_eq!(messages[0].room, "tech");

    // Cursor past the end and negative cursors are not errors
    assert!(alice.receive_messages("tech", 1).await.unwrap().is_empty());
    assert!(alice.receive_messages("tech", -5).await.unwrap().is_empty());

    let left = bob.leave_room("tech").await.unwrap();
    assert!(left.success);
    assert_eq!(left.remaining_users, 0);
    let left = bob.leave_room("tech").await.unwrap();
    assert_eq!(left.message, "not in room tech");

    let rooms = bob.list_rooms().await.unwrap();
    assert!(rooms.iter().any(|room| room.room_name == "tech"));

    let stats = server.get_stats().await;
    assert_eq!(stats.engine.rooms, 2);
    assert_eq!(stats.engine.messages, 2);
    assert_eq!(stats.bind_address, Some(addr));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_clients_share_one_log() {
    let (_server, addr) = start_server(limited(16)).await;

    let mut tasks = Vec::new();
    for name in ["left", "right"] {
        let client = connect(addr, name).await.unwrap();
        tasks.push(tokio::spawn(async move {
            for i in 0..50 {
                assert!(client.send_message("general", &format!("{}", i)).await.unwrap());
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let reader = connect(addr, "reader").await.unwrap();
    let messages = reader.receive_messages("general", 0).await.unwrap();
    assert_eq!(messages.len(), 100);

    // Per-sender order is preserved
    for name in ["left", "right"] {
        let mine: Vec<String> = messages
            .iter()
            .filter(|m| m.username == name)
            .map(|m| m.text.clone())
            .collect();
        let expected: Vec<String> = (0..50).map(|i| i.to_string()).collect();
        assert_eq!(mine, expected);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn connection_limit_is_enforced() {
    let (server, addr) = start_server(limited(1)).await;

    let _first = connect(addr, "first").await.unwrap();

    // The server registers the connection right after its side of the handshake
    for _ in 0..50 {
        if server.get_stats().await.connected_clients == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(server.get_stats().await.connected_clients, 1);

    let err = connect(addr, "second").await.err().unwrap();
    assert!(matches!(err, ChatError::Connection(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn connection_limit_holds_under_concurrent_connects() {
    let (server, addr) = start_server(limited(1)).await;

    let attempts: Vec<_> = (0..8)
        .map(|i| tokio::spawn(async move { connect(addr, &format!("user{}", i)).await }))
        .collect();

    let mut connected = Vec::new();
    for attempt in attempts {
        if let Ok(client) = attempt.await.unwrap() {
            connected.push(client);
        }
    }

    assert_eq!(connected.len(), 1);
    assert!(server.get_stats().await.connected_clients <= 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn oversized_backlog_is_delivered_in_pages() {
    let (_server, addr) = start_server(ChatConfig::default()).await;

    // Together well over one frame, each one under the request limit
    let writer = connect(addr, "writer").await.unwrap();
    let chunk = "x".repeat(900 * 1024);
    for _ in 0..20 {
        assert!(writer.send_message("general", &chunk).await.unwrap());
    }

    let reader = connect(addr, "reader").await.unwrap();
    let first_page = reader.receive_messages("general", 0).await.unwrap();
    assert!(!first_page.is_empty());
    assert!(first_page.len() < 20);

    let mut cursor = first_page.len() as i64;
    loop {
        let page = reader.receive_messages("general", cursor).await.unwrap();
        if page.is_empty() {
            break;
        }
        cursor += page.len() as i64;
    }
    assert_eq!(cursor, 20);
}
