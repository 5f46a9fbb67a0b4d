//! End-to-end tests for the sync session against a local WebSocket server.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};

use funban::errors::SyncError;
use funban::sync::{ReconnectPolicy, SessionOptions, parse_ws_url};
use funban::{Command, ConnectionStatus, NoteState, SyncSession};

const WAIT: Duration = Duration::from_secs(5);

struct Connection {
    uri: String,
    ws: WebSocketStream<TcpStream>,
}

struct TestServer {
    url: String,
    connections: mpsc::UnboundedReceiver<Connection>,
}

impl TestServer {
    async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let uri = Arc::new(Mutex::new(String::new()));
                let captured = Arc::clone(&uri);
                let callback = move |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
                    *captured.lock().unwrap() = req.uri().to_string();
                    Ok(resp)
                };
                let Ok(ws) = accept_hdr_async(stream, callback).await else {
                    continue;
                };
                let uri = uri.lock().unwrap().clone();
                if tx.send(Connection { uri, ws }).is_err() {
                    break;
                }
            }
        });

        Self {
            url: format!("ws://{}/ws", addr),
            connections: rx,
        }
    }

    async fn accept(&mut self) -> Connection {
        tokio::time::timeout(WAIT, self.connections.recv())
            .await
            .expect("client did not connect in time")
            .expect("server task stopped")
    }

    /// Fails if the client opens another socket within `window`.
    async fn expect_no_connection(&mut self, window: Duration) {
        let extra = tokio::time::timeout(window, self.connections.recv()).await;
        assert!(extra.is_err(), "unexpected extra connection");
    }
}

/// Accepts TCP connections and drops them before the WebSocket handshake,
/// reporting each attempt.
async fn refusing_server() -> (String, mpsc::UnboundedReceiver<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            drop(stream);
            if tx.send(()).is_err() {
                break;
            }
        }
    });
    (format!("ws://{}/ws", addr), rx)
}

async fn count_attempts(attempts: &mut mpsc::UnboundedReceiver<()>, expected: usize) {
    for _ in 0..expected {
        tokio::time::timeout(WAIT, attempts.recv())
            .await
            .expect("client stopped retrying too early")
            .unwrap();
    }
    let extra = tokio::time::timeout(Duration::from_millis(300), attempts.recv()).await;
    assert!(extra.is_err(), "client kept retrying past its budget");
}

fn start_session(server: &TestServer, token: &str) -> SyncSession {
    SyncSession::start(
        SessionOptions {
            ws_url: parse_ws_url(&server.url).unwrap(),
            policy: ReconnectPolicy {
                delay: Duration::from_millis(50),
                max_attempts: None,
            },
        },
        Some(token.to_string()),
    )
}

async fn send_json(ws: &mut WebSocketStream<TcpStream>, value: Value) {
    ws.send(Message::Text(value.to_string())).await.unwrap();
}

async fn next_text(ws: &mut WebSocketStream<TcpStream>) -> String {
    loop {
        let frame = tokio::time::timeout(WAIT, ws.next())
            .await
            .expect("no frame from client")
            .expect("client closed")
            .unwrap();
        if let Message::Text(text) = frame {
            return text;
        }
    }
}

async fn next_json(ws: &mut WebSocketStream<TcpStream>) -> Value {
    loop {
        let frame = tokio::time::timeout(WAIT, ws.next())
            .await
            .expect("no frame from client")
            .expect("client closed")
            .unwrap();
        if let Message::Text(text) = frame {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

async fn send_initial_state(ws: &mut WebSocketStream<TcpStream>) {
    send_json(
        ws,
        json!({"type": "Users", "items": [{"id": 1, "name": "Ann", "color": "red"}]}),
    )
    .await;
    send_json(
        ws,
        json!({"type": "Notes", "items": [{
            "id": 10,
            "text": "draft",
            "owner_id": 1,
            "state": "todo",
            "predecessor_id": null,
            "created": "2024-05-01T10:00:00Z",
            "updated": "2024-05-01T10:00:00Z",
        }]}),
    )
    .await;
}

#[tokio::test]
async fn test_token_is_sent_in_query() {
    let mut server = TestServer::start().await;
    let session = start_session(&server, "secret");

    let conn = server.accept().await;
    assert_eq!(conn.uri, "/ws?token=secret");

    session.wait_until_open(WAIT).await.unwrap();
    assert_eq!(session.status(), ConnectionStatus::Open);
    session.shutdown().await;
}

#[tokio::test]
async fn test_snapshots_populate_board() {
    let mut server = TestServer::start().await;
    let session = start_session(&server, "secret");
    let mut conn = server.accept().await;

    send_initial_state(&mut conn.ws).await;
    session.wait_until_synced(WAIT).await.unwrap();

    let board = session.board();
    assert_eq!(board.users().len(), 1);
    assert_eq!(board.notes().len(), 1);
    let view = board.view(board.note(10).unwrap());
    assert_eq!(view.owner_name(), Some("Ann"));
    session.shutdown().await;
}

#[tokio::test]
async fn test_command_is_acknowledged_by_patch() {
    let mut server = TestServer::start().await;
    let session = start_session(&server, "secret");
    let mut conn = server.accept().await;
    send_initial_state(&mut conn.ws).await;
    session.wait_until_synced(WAIT).await.unwrap();

    let command = Command::add_note(1, NoteState::Todo, "ship it");
    let server_side = async {
        let frame = next_json(&mut conn.ws).await;
        assert_eq!(frame["type"], "AddNote");
        assert_eq!(frame["owner"], 1);
        assert_eq!(frame["state"], "todo");
        let uuid = frame["uuid"].as_str().unwrap().to_string();

        send_json(
            &mut conn.ws,
            json!({"type": "Patch", "ops": [
                {"type": "NoteAdded", "note": {
                    "id": "11",
                    "text": "ship it",
                    "owner": {"id": 1, "name": "Ann", "color": "red"},
                    "state": "todo",
                    "predecessor_id": 10,
                    "created": "2024-05-02T10:00:00Z",
                    "updated": "2024-05-02T10:00:00Z",
                }},
                {"type": "ActionFinished", "uuid": uuid},
            ]}),
        )
        .await;
        uuid
    };

    let (result, uuid) = tokio::join!(session.execute(&command, WAIT), server_side);
    assert_eq!(result.unwrap(), uuid);
    assert!(!session.is_busy());

    let board = session.board();
    let todo: Vec<i64> = board
        .column(NoteState::Todo)
        .iter()
        .map(|v| v.note.id)
        .collect();
    assert_eq!(todo, vec![10, 11]);
    session.shutdown().await;
}

#[tokio::test]
async fn test_foreign_ack_keeps_command_pending() {
    let mut server = TestServer::start().await;
    let session = start_session(&server, "secret");
    let mut conn = server.accept().await;
    send_initial_state(&mut conn.ws).await;
    session.wait_until_synced(WAIT).await.unwrap();

    session.issue(&Command::clone_note(10)).unwrap();
    let frame = next_json(&mut conn.ws).await;
    assert_eq!(frame["type"], "CloneNote");

    send_json(
        &mut conn.ws,
        json!({"type": "Patch", "ops": [{"type": "ActionFinished", "uuid": "someone-else"}]}),
    )
    .await;
    // a later snapshot proves the patch was processed
    send_initial_state(&mut conn.ws).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(session.is_busy());
    session.shutdown().await;
}

#[tokio::test]
async fn test_reconnects_after_server_close() {
    let mut server = TestServer::start().await;
    let session = start_session(&server, "secret");

    let mut first = server.accept().await;
    session.wait_until_open(WAIT).await.unwrap();
    first.ws.close(None).await.unwrap();

    let second = server.accept().await;
    assert_eq!(second.uri, "/ws?token=secret");
    session.wait_until_open(WAIT).await.unwrap();
    session.shutdown().await;
}

#[tokio::test]
async fn test_each_close_triggers_exactly_one_reconnect() {
    let mut server = TestServer::start().await;
    let session = start_session(&server, "secret");

    let mut first = server.accept().await;
    session.wait_until_open(WAIT).await.unwrap();
    first.ws.close(None).await.unwrap();

    let mut second = server.accept().await;
    server.expect_no_connection(Duration::from_millis(300)).await;
    session.wait_until_open(WAIT).await.unwrap();
    second.ws.close(None).await.unwrap();

    let _third = server.accept().await;
    server.expect_no_connection(Duration::from_millis(300)).await;
    session.wait_until_open(WAIT).await.unwrap();
    session.shutdown().await;
}

#[tokio::test]
async fn test_frames_sent_during_close_never_reach_next_socket() {
    let mut server = TestServer::start().await;
    let session = start_session(&server, "secret");
    let mut conn = server.accept().await;
    session.wait_until_open(WAIT).await.unwrap();

    for round in 0..5 {
        let closer = async {
            conn.ws.close(None).await.unwrap();
        };
        let sender = async {
            let mut n = 0;
            while session.send(format!("stale-{}-{}", round, n)).is_ok() {
                n += 1;
                tokio::task::yield_now().await;
            }
        };
        tokio::time::timeout(WAIT, async { tokio::join!(closer, sender) })
            .await
            .expect("socket never left the open state");

        conn = server.accept().await;
        session.wait_until_open(WAIT).await.unwrap();
        session.send(format!("fresh-{}", round)).unwrap();
        assert_eq!(next_text(&mut conn.ws).await, format!("fresh-{}", round));
    }
    session.shutdown().await;
}

#[tokio::test]
async fn test_new_token_restores_retry_budget() {
    let (url, mut attempts) = refusing_server().await;
    let session = SyncSession::start(
        SessionOptions {
            ws_url: parse_ws_url(&url).unwrap(),
            policy: ReconnectPolicy {
                delay: Duration::from_millis(50),
                max_attempts: Some(1),
            },
        },
        Some("first".to_string()),
    );

    // first try plus one retry, then the budget is spent
    count_attempts(&mut attempts, 2).await;
    assert_eq!(session.status(), ConnectionStatus::Closed);

    session.set_token(Some("second".to_string()));
    count_attempts(&mut attempts, 2).await;
    session.shutdown().await;
}

#[tokio::test]
async fn test_close_abandons_pending_command() {
    let mut server = TestServer::start().await;
    let session = start_session(&server, "secret");
    let mut conn = server.accept().await;
    send_initial_state(&mut conn.ws).await;
    session.wait_until_synced(WAIT).await.unwrap();

    let server_side = async {
        let frame = next_json(&mut conn.ws).await;
        assert_eq!(frame["type"], "RemoveNote");
        conn.ws.close(None).await.unwrap();
    };
    let cmd = Command::remove_note(10);
    let (result, ()) = tokio::join!(
        session.execute(&cmd, WAIT),
        server_side
    );
    assert!(matches!(result, Err(SyncError::Abandoned { .. })));
    assert!(!session.is_busy());
    session.shutdown().await;
}

#[tokio::test]
async fn test_removing_token_clears_state() {
    let mut server = TestServer::start().await;
    let session = start_session(&server, "secret");
    let mut conn = server.accept().await;
    send_initial_state(&mut conn.ws).await;
    session.wait_until_synced(WAIT).await.unwrap();

    session.set_token(None);
    let mut status = session.watch_status();
    tokio::time::timeout(
        WAIT,
        status.wait_for(|s| *s == ConnectionStatus::Uninstantiated),
    )
    .await
    .unwrap()
    .unwrap();
    drop(status);

    assert!(session.board().is_empty());
    assert!(matches!(
        session.send("{}".to_string()),
        Err(SyncError::NotOpen { .. })
    ));
    session.shutdown().await;
}

#[tokio::test]
async fn test_new_token_reconnects_with_new_credentials() {
    let mut server = TestServer::start().await;
    let session = start_session(&server, "first");
    let _first = server.accept().await;
    session.wait_until_open(WAIT).await.unwrap();

    session.set_token(Some("second".to_string()));
    let second = server.accept().await;
    assert_eq!(second.uri, "/ws?token=second");
    session.shutdown().await;
}
