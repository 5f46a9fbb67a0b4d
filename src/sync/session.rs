//! Public handle over the connection task.
//!
//! The socket task and callers share one [`Reconciler`] behind a mutex; the
//! lock is never held across an `.await`. Status changes go out on a
//! `watch` channel, everything else as [`SyncEvent`]s on a broadcast channel.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use funban_common::{Command, Note, ServerMessage, SnapshotKind, User};
use reqwest::Url;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::connection::{ConnectionMachine, ConnectionStatus, ConnectionTask, ReconnectPolicy};
use super::correlation::Outcome;
use super::reconciler::{Applied, Reconciler};
use crate::board::Board;
use crate::errors::SyncError;

const EVENT_CAPACITY: usize = 256;

/// Something observable happened to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    Status(ConnectionStatus),
    SnapshotApplied { kind: SnapshotKind, count: usize },
    Patched { applied: usize, skipped: usize },
    CommandFinished { uuid: String },
    CommandAbandoned { uuid: String },
    /// Board and pending command were dropped (token removed or shutdown).
    Cleared,
}

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub ws_url: Url,
    pub policy: ReconnectPolicy,
}

/// A frame bound for the socket that was open when it was accepted.
#[derive(Debug)]
pub(crate) struct Outbound {
    pub(crate) epoch: u64,
    pub(crate) frame: String,
}

/// Gate for outbound frames. `epoch` counts successful opens; frames are
/// only accepted while `open` and are tagged with the epoch they were
/// accepted for.
#[derive(Debug, Default)]
pub(crate) struct Link {
    epoch: u64,
    open: bool,
}

impl Link {
    fn open_epoch(&self) -> Option<u64> {
        self.open.then_some(self.epoch)
    }
}

/// Which snapshots have arrived since the board was last cleared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Loaded {
    users: bool,
    notes: bool,
}

pub(crate) struct Shared {
    reconciler: Mutex<Reconciler>,
    link: Mutex<Link>,
    status: watch::Sender<ConnectionStatus>,
    loaded: watch::Sender<Loaded>,
    events: broadcast::Sender<SyncEvent>,
}

impl Shared {
    fn new() -> Self {
        let (status, _) = watch::channel(ConnectionStatus::Uninstantiated);
        let (loaded, _) = watch::channel(Loaded::default());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            reconciler: Mutex::new(Reconciler::new()),
            link: Mutex::new(Link::default()),
            status,
            loaded,
            events,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Reconciler> {
        self.reconciler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn link(&self) -> MutexGuard<'_, Link> {
        self.link.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start accepting frames for a freshly opened socket.
    pub(crate) fn open_link(&self) -> u64 {
        let mut link = self.link();
        link.epoch += 1;
        link.open = true;
        link.epoch
    }

    /// Stop accepting frames. Anything already queued belongs to a dead
    /// socket and is dropped by the connection task.
    pub(crate) fn close_link(&self) {
        self.link().open = false;
    }

    fn emit(&self, event: SyncEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }

    pub(crate) fn set_status(&self, next: ConnectionStatus) {
        let changed = self.status.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
        if changed {
            tracing::debug!(status = %next, "connection status changed");
            self.emit(SyncEvent::Status(next));
        }
    }

    pub(crate) fn handle_frame(&self, raw: &str) {
        let message = match ServerMessage::parse(raw) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(error = %e, "dropping undecodable frame");
                return;
            }
        };

        let applied = self.lock().apply_message(message);
        match applied {
            Applied::Snapshot { kind, count } => {
                tracing::debug!(?kind, count, "snapshot applied");
                self.loaded.send_modify(|loaded| match kind {
                    SnapshotKind::Users => loaded.users = true,
                    SnapshotKind::Notes => loaded.notes = true,
                });
                self.emit(SyncEvent::SnapshotApplied { kind, count });
            }
            Applied::Patch(report) => {
                tracing::debug!(
                    applied = report.applied,
                    skipped = report.skipped,
                    "patch applied"
                );
                self.emit(SyncEvent::Patched {
                    applied: report.applied,
                    skipped: report.skipped,
                });
                for uuid in report.finished {
                    self.emit(SyncEvent::CommandFinished { uuid });
                }
            }
        }
    }

    pub(crate) fn abandon_pending(&self) {
        let abandoned = self.lock().correlation_mut().abandon();
        if let Some(uuid) = abandoned {
            tracing::warn!(%uuid, "pending command abandoned, connection changed");
            self.emit(SyncEvent::CommandAbandoned { uuid });
        }
    }

    pub(crate) fn reset(&self) {
        let (was_empty, abandoned) = {
            let mut reconciler = self.lock();
            let was_empty = reconciler.board().is_empty();
            (was_empty, reconciler.reset())
        };
        self.loaded.send_replace(Loaded::default());
        if let Some(uuid) = abandoned {
            self.emit(SyncEvent::CommandAbandoned { uuid });
        }
        if !was_empty {
            self.emit(SyncEvent::Cleared);
        }
    }
}

/// A live board session. Dropping it cancels the socket task; call
/// [`SyncSession::shutdown`] to also wait for the socket to close.
pub struct SyncSession {
    shared: Arc<Shared>,
    outbound: mpsc::UnboundedSender<Outbound>,
    token: watch::Sender<Option<String>>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl SyncSession {
    /// Spawn the connection task. Must be called inside a tokio runtime.
    /// With `token: None` the session stays `Uninstantiated` until
    /// [`SyncSession::set_token`] provides one.
    pub fn start(options: SessionOptions, token: Option<String>) -> Self {
        let shared = Arc::new(Shared::new());
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (token_tx, token_rx) = watch::channel(token);
        let cancel = CancellationToken::new();

        let task = ConnectionTask {
            base_url: options.ws_url,
            machine: ConnectionMachine::new(options.policy),
            shared: Arc::clone(&shared),
            token: token_rx,
            outbound: outbound_rx,
            cancel: cancel.clone(),
        };
        let handle = tokio::spawn(task.run());

        Self {
            shared,
            outbound: outbound_tx,
            token: token_tx,
            cancel,
            task: Some(handle),
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.shared.status.borrow()
    }

    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.shared.status.subscribe()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.shared.events.subscribe()
    }

    /// Swap the access token. A different token reconnects with the new
    /// credentials; `None` closes the socket and clears the board.
    pub fn set_token(&self, token: Option<String>) {
        self.token.send_if_modified(|current| {
            if *current == token {
                false
            } else {
                *current = token;
                true
            }
        });
    }

    pub async fn wait_until_open(&self, timeout: Duration) -> Result<(), SyncError> {
        with_timeout(timeout, "connection to open", self.opened()).await
    }

    /// Wait until the socket is open and both snapshots have been applied.
    pub async fn wait_until_synced(&self, timeout: Duration) -> Result<(), SyncError> {
        with_timeout(timeout, "board snapshots", async {
            self.opened().await?;
            let mut loaded = self.shared.loaded.subscribe();
            loaded
                .wait_for(|l| l.users && l.notes)
                .await
                .map(|_| ())
                .map_err(|_| SyncError::SessionClosed)
        })
        .await
    }

    async fn opened(&self) -> Result<(), SyncError> {
        let mut status = self.watch_status();
        status
            .wait_for(|s| *s == ConnectionStatus::Open)
            .await
            .map(|_| ())
            .map_err(|_| SyncError::SessionClosed)
    }

    /// Current board, cloned out of the lock.
    pub fn board(&self) -> Board {
        self.shared.lock().board().clone()
    }

    pub fn users(&self) -> Vec<User> {
        self.shared.lock().board().users().to_vec()
    }

    pub fn notes(&self) -> Vec<Note> {
        self.shared.lock().board().notes().to_vec()
    }

    pub fn is_busy(&self) -> bool {
        self.shared.lock().correlation().is_busy()
    }

    pub fn pending(&self) -> Option<String> {
        self.shared.lock().correlation().pending().map(str::to_string)
    }

    /// Send a raw frame. Frames are only written to the socket that is open
    /// right now; otherwise the frame is dropped and an error logged.
    pub fn send(&self, raw: String) -> Result<(), SyncError> {
        let link = self.shared.link();
        let Some(epoch) = link.open_epoch() else {
            let status = self.status();
            tracing::error!(%status, "socket not open, dropping outbound frame");
            return Err(SyncError::NotOpen {
                status: status.to_string(),
            });
        };
        self.outbound
            .send(Outbound { epoch, frame: raw })
            .map_err(|_| SyncError::SessionClosed)
    }

    /// Tag `command` with a fresh correlation token and send it. The busy
    /// flag stays set until the matching `ActionFinished` arrives.
    pub fn issue(&self, command: &Command) -> Result<String, SyncError> {
        // held until the frame is queued so a close cannot slip in between
        let link = self.shared.link();
        let Some(epoch) = link.open_epoch() else {
            let status = self.status();
            tracing::error!(%status, command = command.type_name(), "socket not open, command not sent");
            return Err(SyncError::NotOpen {
                status: status.to_string(),
            });
        };

        let (issued, replaced) = self.shared.lock().correlation_mut().issue(command)?;
        if let Some(uuid) = replaced {
            self.shared.emit(SyncEvent::CommandAbandoned { uuid });
        }
        tracing::debug!(uuid = %issued.uuid, epoch, command = command.type_name(), "sending command");
        let queued = self.outbound.send(Outbound {
            epoch,
            frame: issued.json,
        });
        drop(link);

        if queued.is_err() {
            self.shared.lock().correlation_mut().resolve(&issued.uuid);
            return Err(SyncError::SessionClosed);
        }
        Ok(issued.uuid)
    }

    /// Issue `command` and wait for its acknowledgement.
    pub async fn execute(&self, command: &Command, timeout: Duration) -> Result<String, SyncError> {
        let mut events = self.subscribe();
        let uuid = self.issue(command)?;

        let outcome = tokio::time::timeout(timeout, async {
            loop {
                match events.recv().await {
                    Ok(SyncEvent::CommandFinished { uuid: done }) if done == uuid => {
                        return Ok(());
                    }
                    Ok(SyncEvent::CommandAbandoned { uuid: dropped }) if dropped == uuid => {
                        return Err(SyncError::Abandoned { uuid: dropped });
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "event receiver lagged");
                        let outcome = self.shared.lock().correlation().outcome(&uuid);
                        match outcome {
                            Outcome::Pending => {}
                            Outcome::Finished => return Ok(()),
                            Outcome::Abandoned => {
                                return Err(SyncError::Abandoned { uuid: uuid.clone() });
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        return Err(SyncError::SessionClosed);
                    }
                }
            }
        })
        .await;

        match outcome {
            Ok(result) => result.map(|()| uuid),
            Err(_) => Err(SyncError::Timeout {
                seconds: timeout.as_secs(),
                what: format!("acknowledgement of {}", command.type_name()),
            }),
        }
    }

    /// Close the socket, clear local state and wait for the task to finish.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "board socket task failed");
            }
        }
    }
}

async fn with_timeout<F>(timeout: Duration, what: &str, fut: F) -> Result<(), SyncError>
where
    F: std::future::Future<Output = Result<(), SyncError>>,
{
    tokio::time::timeout(timeout, fut)
        .await
        .unwrap_or_else(|_| {
            Err(SyncError::Timeout {
                seconds: timeout.as_secs(),
                what: what.to_string(),
            })
        })
}

impl Drop for SyncSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
