pub mod api;
pub mod board;
pub mod config;
pub mod credentials;
pub mod errors;
pub mod logging;
pub mod sync;
pub mod ui;
pub mod validation;

pub use board::{Board, NoteRecord, NoteView};
pub use funban_common::{Command, Note, NoteState, Operation, ServerMessage, User};
pub use sync::{ConnectionStatus, SyncEvent, SyncSession};
