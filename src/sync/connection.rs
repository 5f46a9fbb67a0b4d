//! WebSocket lifecycle: URL derivation, the reconnect state machine, and the
//! task that owns the live socket.
//!
//! The state machine is pure so the reconnect policy can be exercised
//! without a socket:
//!
//! ```text
//! Uninstantiated -> Connecting -> Open -> Closed(retry pending) -> Connecting ...
//!                                  \-> Closing (client initiated) -> Closed
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt, stream::SplitSink};
use reqwest::Url;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;

use super::session::{Outbound, Shared};
use crate::errors::SyncError;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Delay between reconnect attempts unless configured otherwise.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Uninstantiated,
    Connecting,
    Open,
    Closing,
    Closed,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uninstantiated => "uninstantiated",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closing => "closing",
            Self::Closed => "closed",
        }
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed-interval retry. `max_attempts: None` retries forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub delay: Duration,
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            delay: DEFAULT_RECONNECT_DELAY,
            max_attempts: None,
        }
    }
}

/// A scheduled reconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPlan {
    pub attempt: u32,
    pub delay: Duration,
}

#[derive(Debug, Clone)]
pub struct ConnectionMachine {
    policy: ReconnectPolicy,
    status: ConnectionStatus,
    retry_pending: bool,
    attempts: u32,
}

impl ConnectionMachine {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            status: ConnectionStatus::Uninstantiated,
            retry_pending: false,
            attempts: 0,
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn retry_pending(&self) -> bool {
        self.retry_pending
    }

    pub fn begin_connect(&mut self) {
        self.status = ConnectionStatus::Connecting;
        self.retry_pending = false;
    }

    pub fn on_open(&mut self) {
        self.status = ConnectionStatus::Open;
        self.attempts = 0;
    }

    /// The client is closing the socket on purpose.
    pub fn begin_close(&mut self) {
        if matches!(
            self.status,
            ConnectionStatus::Open | ConnectionStatus::Connecting
        ) {
            self.status = ConnectionStatus::Closing;
        }
    }

    /// The socket went away (or never opened). Schedules exactly one retry
    /// per close; a close reported while a retry is already pending, or once
    /// the attempt budget is spent, schedules nothing.
    pub fn on_close(&mut self) -> Option<RetryPlan> {
        self.status = ConnectionStatus::Closed;
        if self.retry_pending {
            return None;
        }
        if self
            .policy
            .max_attempts
            .is_some_and(|max| self.attempts >= max)
        {
            return None;
        }
        self.attempts += 1;
        self.retry_pending = true;
        Some(RetryPlan {
            attempt: self.attempts,
            delay: self.policy.delay,
        })
    }

    /// Closed on purpose (token swap, shutdown); no retry is scheduled.
    pub fn on_client_close(&mut self) {
        self.status = ConnectionStatus::Closed;
        self.retry_pending = false;
        self.attempts = 0;
    }

    /// The token is gone: back to the initial state, nothing scheduled.
    pub fn deauthenticate(&mut self) {
        self.status = ConnectionStatus::Uninstantiated;
        self.retry_pending = false;
        self.attempts = 0;
    }
}

/// Parse and check a `ws://` / `wss://` base URL.
pub fn parse_ws_url(raw: &str) -> Result<Url, SyncError> {
    let url = Url::parse(raw).map_err(|e| SyncError::InvalidUrl {
        url: raw.to_string(),
        message: e.to_string(),
    })?;
    match url.scheme() {
        "ws" | "wss" => Ok(url),
        other => Err(SyncError::UnsupportedScheme {
            scheme: other.to_string(),
        }),
    }
}

/// `<base>?token=<token>`, keeping any query pairs already on `base`.
pub fn connection_url(base: &Url, token: &str) -> Url {
    let mut url = base.clone();
    url.query_pairs_mut().append_pair("token", token);
    url
}

enum SocketEnd {
    Lost,
    TokenChanged,
    Cancelled,
}

enum WaitEnd {
    Elapsed,
    TokenChanged,
    Cancelled,
}

/// Owns the socket for the lifetime of a [`super::SyncSession`].
pub(crate) struct ConnectionTask {
    pub(crate) base_url: Url,
    pub(crate) machine: ConnectionMachine,
    pub(crate) shared: Arc<Shared>,
    pub(crate) token: watch::Receiver<Option<String>>,
    pub(crate) outbound: mpsc::UnboundedReceiver<Outbound>,
    pub(crate) cancel: CancellationToken,
}

impl ConnectionTask {
    pub(crate) async fn run(mut self) {
        loop {
            let token = self.token.borrow_and_update().clone();
            let Some(token) = token else {
                self.deauthenticate();
                match self.wait(None).await {
                    WaitEnd::Cancelled => break,
                    WaitEnd::TokenChanged | WaitEnd::Elapsed => continue,
                }
            };

            let url = connection_url(&self.base_url, &token);
            self.machine.begin_connect();
            self.publish();
            tracing::info!(url = %self.base_url, "connecting to board socket");

            let connected = tokio::select! {
                _ = self.cancel.cancelled() => break,
                changed = self.token.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    self.machine.on_client_close();
                    self.publish();
                    continue;
                }
                result = connect_async(url.as_str()) => result,
            };

            match connected {
                Ok((socket, _response)) => {
                    self.machine.on_open();
                    self.shared.abandon_pending();
                    let epoch = self.shared.open_link();
                    self.publish();
                    tracing::info!(epoch, "board socket open");

                    match self.drive(socket, epoch).await {
                        SocketEnd::Cancelled => break,
                        SocketEnd::TokenChanged => {
                            tracing::info!("access token changed, reconnecting");
                            self.machine.on_client_close();
                            self.after_close();
                            continue;
                        }
                        SocketEnd::Lost => {}
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "board socket connect failed");
                }
            }

            let plan = self.machine.on_close();
            self.after_close();
            let delay = match plan {
                Some(plan) => {
                    tracing::info!(
                        attempt = plan.attempt,
                        delay_ms = plan.delay.as_millis() as u64,
                        "scheduling reconnect"
                    );
                    Some(plan.delay)
                }
                None => {
                    tracing::warn!("reconnect attempts exhausted, waiting for a new token");
                    None
                }
            };
            match self.wait(delay).await {
                WaitEnd::Cancelled => break,
                // a new token starts with a fresh attempt budget
                WaitEnd::TokenChanged => self.machine.on_client_close(),
                WaitEnd::Elapsed => {}
            }
        }

        self.machine.on_client_close();
        self.shared.close_link();
        self.shared.reset();
        self.after_close();
        tracing::debug!("board socket task finished");
    }

    /// Pump frames until the socket ends, the token changes or the session
    /// is cancelled.
    async fn drive(&mut self, socket: Socket, epoch: u64) -> SocketEnd {
        let (mut sink, mut source) = socket.split();
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    self.close(&mut sink).await;
                    return SocketEnd::Cancelled;
                }
                changed = self.token.changed() => {
                    self.close(&mut sink).await;
                    return if changed.is_err() {
                        SocketEnd::Cancelled
                    } else {
                        SocketEnd::TokenChanged
                    };
                }
                Some(outbound) = self.outbound.recv() => {
                    if outbound.epoch != epoch {
                        tracing::warn!(
                            frame_epoch = outbound.epoch,
                            epoch,
                            "dropping frame queued for an earlier socket"
                        );
                        continue;
                    }
                    if let Err(e) = sink.send(Message::Text(outbound.frame)).await {
                        tracing::warn!(error = %e, "failed to write to board socket");
                        return SocketEnd::Lost;
                    }
                }
                incoming = source.next() => match incoming {
                    Some(Ok(Message::Text(text))) => self.shared.handle_frame(&text),
                    Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes) {
                        Ok(text) => self.shared.handle_frame(&text),
                        Err(_) => tracing::warn!("dropping non UTF-8 binary frame"),
                    },
                    Some(Ok(Message::Close(frame))) => {
                        tracing::info!(?frame, "board socket closed by server");
                        return SocketEnd::Lost;
                    }
                    // ping/pong are answered by tungstenite
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "board socket error");
                        return SocketEnd::Lost;
                    }
                    None => return SocketEnd::Lost,
                },
            }
        }
    }

    async fn close(&mut self, sink: &mut SplitSink<Socket, Message>) {
        self.machine.begin_close();
        self.publish();
        if let Err(e) = sink.send(Message::Close(None)).await {
            tracing::debug!(error = %e, "close frame not delivered");
        }
    }

    /// Sleep for `delay` (or forever when `None`) unless the token changes or
    /// the session is cancelled first.
    async fn wait(&mut self, delay: Option<Duration>) -> WaitEnd {
        let sleep = async {
            match delay {
                Some(delay) => tokio::time::sleep(delay).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::select! {
            _ = self.cancel.cancelled() => WaitEnd::Cancelled,
            changed = self.token.changed() => {
                if changed.is_err() {
                    WaitEnd::Cancelled
                } else {
                    WaitEnd::TokenChanged
                }
            }
            _ = sleep => WaitEnd::Elapsed,
        }
    }

    /// Per-connection cleanup shared by every close path. The machine must
    /// already hold the post-close status: the link is shut and that status
    /// published before the queue is drained, so nothing accepted for the
    /// dead socket can reach the next one.
    fn after_close(&mut self) {
        self.shared.close_link();
        self.publish();
        self.shared.abandon_pending();
        let mut dropped = 0usize;
        while self.outbound.try_recv().is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            tracing::warn!(dropped, "dropped frames queued on a closed socket");
        }
    }

    fn deauthenticate(&mut self) {
        if self.machine.status() != ConnectionStatus::Uninstantiated {
            tracing::info!("access token removed, clearing board");
        }
        self.machine.deauthenticate();
        self.shared.close_link();
        self.shared.reset();
        self.after_close();
    }

    fn publish(&self) {
        self.shared.set_status(self.machine.status());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine() -> ConnectionMachine {
        ConnectionMachine::new(ReconnectPolicy::default())
    }

    #[test]
    fn test_initial_status_is_uninstantiated() {
        assert_eq!(machine().status(), ConnectionStatus::Uninstantiated);
    }

    #[test]
    fn test_connect_open_close_cycle() {
        let mut m = machine();
        m.begin_connect();
        assert_eq!(m.status(), ConnectionStatus::Connecting);
        m.on_open();
        assert_eq!(m.status(), ConnectionStatus::Open);

        let plan = m.on_close().expect("close schedules a retry");
        assert_eq!(m.status(), ConnectionStatus::Closed);
        assert_eq!(plan.delay, DEFAULT_RECONNECT_DELAY);
        assert_eq!(plan.attempt, 1);
    }

    #[test]
    fn test_duplicate_close_schedules_nothing() {
        let mut m = machine();
        m.begin_connect();
        m.on_open();
        assert!(m.on_close().is_some());
        assert!(m.on_close().is_none());
        assert!(m.retry_pending());
    }

    #[test]
    fn test_each_close_after_reconnect_schedules_one_retry() {
        let mut m = machine();
        let mut scheduled = 0;
        for _ in 0..5 {
            m.begin_connect();
            if m.on_close().is_some() {
                scheduled += 1;
            }
            // a second report of the same close is ignored
            assert!(m.on_close().is_none());
        }
        assert_eq!(scheduled, 5);
    }

    #[test]
    fn test_attempts_reset_after_successful_open() {
        let mut m = ConnectionMachine::new(ReconnectPolicy {
            delay: Duration::from_millis(10),
            max_attempts: Some(2),
        });
        m.begin_connect();
        assert_eq!(m.on_close().map(|p| p.attempt), Some(1));
        m.begin_connect();
        assert_eq!(m.on_close().map(|p| p.attempt), Some(2));
        m.begin_connect();
        assert!(m.on_close().is_none(), "budget spent");

        m.begin_connect();
        m.on_open();
        assert_eq!(m.on_close().map(|p| p.attempt), Some(1));
    }

    #[test]
    fn test_client_close_restores_spent_budget() {
        let mut m = ConnectionMachine::new(ReconnectPolicy {
            delay: Duration::from_millis(10),
            max_attempts: Some(1),
        });
        m.begin_connect();
        assert!(m.on_close().is_some());
        m.begin_connect();
        assert!(m.on_close().is_none(), "budget spent");

        // new credentials arrive while waiting
        m.on_client_close();
        m.begin_connect();
        assert_eq!(m.on_close().map(|p| p.attempt), Some(1));
    }

    #[test]
    fn test_client_close_goes_through_closing() {
        let mut m = machine();
        m.begin_connect();
        m.on_open();
        m.begin_close();
        assert_eq!(m.status(), ConnectionStatus::Closing);
        m.on_client_close();
        assert_eq!(m.status(), ConnectionStatus::Closed);
        assert!(!m.retry_pending());
    }

    #[test]
    fn test_deauthenticate_cancels_pending_retry() {
        let mut m = machine();
        m.begin_connect();
        assert!(m.on_close().is_some());
        m.deauthenticate();
        assert_eq!(m.status(), ConnectionStatus::Uninstantiated);
        assert!(!m.retry_pending());
    }

    #[test]
    fn test_connection_url_appends_token() {
        let base = parse_ws_url("ws://localhost:8000/ws").unwrap();
        let url = connection_url(&base, "abc");
        assert_eq!(url.as_str(), "ws://localhost:8000/ws?token=abc");
    }

    #[test]
    fn test_connection_url_keeps_existing_query_and_encodes() {
        let base = parse_ws_url("wss://board.example.com/ws?board=main").unwrap();
        let url = connection_url(&base, "a b&c");
        assert_eq!(
            url.as_str(),
            "wss://board.example.com/ws?board=main&token=a+b%26c"
        );
    }

    #[test]
    fn test_parse_ws_url_rejects_http() {
        assert!(matches!(
            parse_ws_url("http://localhost:8000/ws"),
            Err(SyncError::UnsupportedScheme { .. })
        ));
        assert!(matches!(
            parse_ws_url("not a url"),
            Err(SyncError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_status_display() {
        assert_eq!(ConnectionStatus::Open.to_string(), "open");
        assert_eq!(ConnectionStatus::Uninstantiated.to_string(), "uninstantiated");
    }
}
