//! Realtime board synchronisation over a WebSocket.

pub mod connection;
pub mod correlation;
pub mod reconciler;
pub mod session;

pub use connection::{
    ConnectionMachine, ConnectionStatus, DEFAULT_RECONNECT_DELAY, ReconnectPolicy, RetryPlan,
    connection_url, parse_ws_url,
};
pub use correlation::{Correlation, Issued, Outcome};
pub use reconciler::{Applied, PatchReport, Reconciler};
pub use session::{SessionOptions, SyncEvent, SyncSession};
