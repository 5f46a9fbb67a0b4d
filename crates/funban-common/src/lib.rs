//! Shared board model and wire protocol for the funban sync client.

pub mod models;
pub mod protocol;

pub use models::{Note, NoteState, User, normalize_color_name, parse_timestamp};
pub use protocol::{Command, NoteUpdate, Operation, OverId, ProtocolError, ServerMessage, SnapshotKind};
