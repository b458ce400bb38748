//! End-to-end tests: a real server on an ephemeral port driven by
//! `tokio-tungstenite` clients.

use std::net::SocketAddr;
use std::time::Duration;

use assert_matches::assert_matches;
use beehive_core::{Game, Player, ServerEvent};
use beehive_server::config::ServerConfig;
use beehive_server::server::RelayServer;
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);
const QUIET_PERIOD: Duration = Duration::from_millis(200);

async fn start() -> (RelayServer, SocketAddr) {
    start_with(ServerConfig::default()).await
}

async fn start_with(config: ServerConfig) -> (RelayServer, SocketAddr) {
    let server = RelayServer::new(config);
    let (addr, _handle) = server.listen().await.unwrap();
    (server, addr)
}

/// Connect and consume the `identification` frame.
async fn connect(addr: SocketAddr) -> (Ws, String) {
    let (mut ws, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();
    let id = match next_event(&mut ws).await {
        ServerEvent::Identification { connection_id } => connection_id,
        other => panic!("expected identification, got {other:?}"),
    };
    (ws, id)
}

async fn next_event(ws: &mut Ws) -> ServerEvent {
    next_event_within(ws, RECV_TIMEOUT).await
}

async fn next_event_within(ws: &mut Ws, wait: Duration) -> ServerEvent {
    loop {
        let msg = tokio::time::timeout(wait, ws.next())
            .await
            .expect("timed out waiting for frame")
            .expect("stream ended")
            .expect("websocket error");
        match msg {
            Message::Text(text) => return ServerEvent::parse(text.as_str()).unwrap(),
            Message::Ping(_) | Message::Pong(_) => {}
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}

async fn next_game(ws: &mut Ws, room: &str) -> Game {
    match next_event(ws).await {
        ServerEvent::Information { room_id, game } => {
            assert_eq!(room_id, room);
            game
        }
        other => panic!("expected information, got {other:?}"),
    }
}

async fn assert_quiet(ws: &mut Ws) {
    let result = tokio::time::timeout(QUIET_PERIOD, ws.next()).await;
    assert!(result.is_err(), "unexpected frame: {result:?}");
}

async fn send(ws: &mut Ws, frame: Value) {
    ws.send(Message::Text(frame.to_string().into())).await.unwrap();
}

async fn create_game(ws: &mut Ws) {
    send(
        ws,
        json!({"event": "createGame", "args": [["a", "b", "c"], "d", ["dab"], [], 0]}),
    )
    .await;
}

async fn join_game(ws: &mut Ws, room: &str) {
    send(ws, json!({"event": "joinGame", "args": [room]})).await;
}

fn names(game: &Game) -> Vec<&str> {
    game.players().iter().map(|p| p.name.as_str()).collect()
}

#[tokio::test]
async fn create_join_update_leave() {
    let (server, addr) = start().await;
    let (mut c1, id1) = connect(addr).await;
    let (mut c2, id2) = connect(addr).await;
    assert_ne!(id1, id2);

    create_game(&mut c1).await;
    assert_matches!(next_event(&mut c1).await, ServerEvent::GameCreated { room_id } if room_id == id1);
    let game = next_game(&mut c1, &id1).await;
    assert_eq!(game.players(), &[Player::new(id1.clone(), 0)]);
    assert_eq!(game.edge_letters(), &["a", "b", "c"]);
    assert_eq!(game.center_letter(), "d");
    assert!(game.found_words().is_empty());

    join_game(&mut c2, &id1).await;
    let seen_by_c1 = next_game(&mut c1, &id1).await;
    let seen_by_c2 = next_game(&mut c2, &id1).await;
    assert_eq!(seen_by_c1, seen_by_c2);
    assert_eq!(names(&seen_by_c1), vec![id1.as_str(), id2.as_str()]);

    send(
        &mut c1,
        json!({
            "event": "gameUpdate",
            "args": [id1, "dab", {"name": id2, "score": 5, "previousScore": 0}],
        }),
    )
    .await;
    let game = next_game(&mut c1, &id1).await;
    assert_eq!(next_game(&mut c2, &id1).await, game);
    assert_eq!(game.found_words(), &["dab"]);
    assert_eq!(
        game.players(),
        &[Player::new(id1.clone(), 0), Player::new(id2.clone(), 5)]
    );

    c2.close(None).await.unwrap();
    let game = next_game(&mut c1, &id1).await;
    assert_eq!(game.players(), &[Player::new(id1.clone(), 0)]);
    assert_eq!(game.found_words(), &["dab"]);

    assert!(server.registry().contains(&id1));
    assert_eq!(server.broadcast().connection_count().await, 1);
}

#[tokio::test]
async fn rooms_are_isolated() {
    let (_server, addr) = start().await;
    let (mut c1, id1) = connect(addr).await;
    let (mut c3, id3) = connect(addr).await;

    create_game(&mut c1).await;
    let _ = next_event(&mut c1).await;
    let _ = next_game(&mut c1, &id1).await;

    create_game(&mut c3).await;
    let _ = next_event(&mut c3).await;
    let _ = next_game(&mut c3, &id3).await;

    send(
        &mut c1,
        json!({
            "event": "gameUpdate",
            "args": [id1, "bad", {"name": id1, "score": 3, "previousScore": 0}],
        }),
    )
    .await;
    let game = next_game(&mut c1, &id1).await;
    assert_eq!(game.player(&id1).map(|p| p.score), Some(3));
    assert_quiet(&mut c3).await;
}

#[tokio::test]
async fn malformed_frames_keep_connection_open() {
    let (server, addr) = start().await;
    let (mut c1, id1) = connect(addr).await;

    c1.send(Message::Text("not json".into())).await.unwrap();
    send(&mut c1, json!({"event": "createGame", "args": ["oops"]})).await;
    send(&mut c1, json!({"event": "dropTables", "args": []})).await;
    assert_quiet(&mut c1).await;
    assert!(server.registry().is_empty());

    create_game(&mut c1).await;
    assert_matches!(next_event(&mut c1).await, ServerEvent::GameCreated { room_id } if room_id == id1);
}

#[tokio::test]
async fn binary_utf8_frames_are_accepted() {
    let (_server, addr) = start().await;
    let (mut c1, id1) = connect(addr).await;

    let frame = json!({"event": "createGame", "args": [["a"], "b", [], [], 0]}).to_string();
    c1.send(Message::Binary(frame.into_bytes().into()))
        .await
        .unwrap();
    assert_matches!(next_event(&mut c1).await, ServerEvent::GameCreated { room_id } if room_id == id1);
}

#[tokio::test]
async fn unknown_player_update_still_records_word() {
    let (_server, addr) = start().await;
    let (mut c1, id1) = connect(addr).await;

    create_game(&mut c1).await;
    let _ = next_event(&mut c1).await;
    let _ = next_game(&mut c1, &id1).await;

    send(
        &mut c1,
        json!({
            "event": "gameUpdate",
            "args": [id1, "dab", {"name": "stranger", "score": 50, "previousScore": 0}],
        }),
    )
    .await;
    let game = next_game(&mut c1, &id1).await;
    assert_eq!(game.found_words(), &["dab"]);
    assert_eq!(game.players(), &[Player::new(id1.clone(), 0)]);
}

#[tokio::test]
async fn joining_missing_room_sends_nothing() {
    let (_server, addr) = start().await;
    let (mut c1, _id1) = connect(addr).await;

    join_game(&mut c1, "no-such-room").await;
    assert_quiet(&mut c1).await;
}

#[tokio::test]
async fn creator_disconnect_keeps_room() {
    let (server, addr) = start().await;
    let (mut c1, id1) = connect(addr).await;
    let (mut c2, id2) = connect(addr).await;

    create_game(&mut c1).await;
    let _ = next_event(&mut c1).await;
    let _ = next_game(&mut c1, &id1).await;
    join_game(&mut c2, &id1).await;
    let _ = next_game(&mut c2, &id1).await;

    c1.close(None).await.unwrap();
    let game = next_game(&mut c2, &id1).await;
    assert_eq!(names(&game), vec![id2.as_str()]);
    assert!(server.registry().contains(&id1));
}

#[tokio::test]
async fn unresponsive_client_is_dropped_from_room() {
    let config = ServerConfig {
        heartbeat_interval_secs: 1,
        heartbeat_timeout_secs: 2,
        ..ServerConfig::default()
    };
    let (server, addr) = start_with(config).await;
    let (mut c1, id1) = connect(addr).await;
    let (mut c2, id2) = connect(addr).await;

    create_game(&mut c1).await;
    let _ = next_event(&mut c1).await;
    let _ = next_game(&mut c1, &id1).await;
    join_game(&mut c2, &id1).await;
    let game = next_game(&mut c2, &id1).await;
    assert_eq!(names(&game), vec![id1.as_str(), id2.as_str()]);
    let _ = next_game(&mut c1, &id1).await;

    // c2 stays open but is never polled again, so server pings go unanswered.
    let game = match next_event_within(&mut c1, Duration::from_secs(10)).await {
        ServerEvent::Information { room_id, game } => {
            assert_eq!(room_id, id1);
            game
        }
        other => panic!("expected information, got {other:?}"),
    };
    assert_eq!(names(&game), vec![id1.as_str()]);
    assert_eq!(server.broadcast().connection_count().await, 1);
    drop(c2);
}

#[tokio::test]
async fn shutdown_closes_sessions() {
    let (server, addr) = start().await;
    let (mut c1, _id1) = connect(addr).await;

    server.shutdown().shutdown();

    let closed = tokio::time::timeout(RECV_TIMEOUT, async {
        while let Some(msg) = c1.next().await {
            match msg {
                Ok(Message::Close(_)) | Err(_) => return,
                Ok(_) => {}
            }
        }
    })
    .await;
    assert!(closed.is_ok());
}
