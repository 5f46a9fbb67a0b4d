//! JSON wire protocol spoken over the board WebSocket.
//!
//! Client → server frames are [`Command`]s, discriminated by a `type` field.
//! Server → client frames are [`ServerMessage`]s: a full snapshot of one
//! collection, or a `Patch` carrying an ordered batch of [`Operation`]s.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::models::{Note, NoteState, User, id, predecessor};

/// Errors raised while encoding or decoding a frame.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Frame is not valid JSON: {0}")]
    Json(#[source] serde_json::Error),

    #[error("Frame has no 'type' discriminator")]
    MissingType,

    #[error("Unknown message type '{type_name}'")]
    UnknownMessage { type_name: String },

    #[error("Malformed '{type_name}' message: {source}")]
    Malformed {
        type_name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to encode command: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Where a reordered note should land.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OverId {
    /// Directly above the note with this id.
    Before { id: i64 },
    /// At the end of the given column.
    Last { state: NoteState },
}

/// One part of a combined `NoteUpdate` command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "target")]
pub enum NoteUpdate {
    Text { text: String },
    Order { over_id: OverId },
}

/// Commands sent to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Command {
    AddUser {
        name: String,
        color: String,
    },
    UpdateUserName {
        id: i64,
        name: String,
    },
    UpdateUserColor {
        id: i64,
        color: String,
    },
    RemoveUser {
        id: i64,
    },
    AddNote {
        owner: i64,
        state: NoteState,
        text: String,
    },
    UpdateNoteText {
        id: i64,
        text: String,
    },
    Reorder {
        moved_item_id: i64,
        over_id: OverId,
    },
    NoteUpdate {
        id: i64,
        updates: Vec<NoteUpdate>,
    },
    RemoveNote {
        id: i64,
    },
    CloneNote {
        id: i64,
    },
}

impl Command {
    pub fn add_user(name: impl Into<String>, color: impl Into<String>) -> Self {
        Self::AddUser {
            name: name.into(),
            color: color.into(),
        }
    }

    pub fn update_user_name(id: i64, name: impl Into<String>) -> Self {
        Self::UpdateUserName {
            id,
            name: name.into(),
        }
    }

    pub fn update_user_color(id: i64, color: impl Into<String>) -> Self {
        Self::UpdateUserColor {
            id,
            color: color.into(),
        }
    }

    pub fn remove_user(id: i64) -> Self {
        Self::RemoveUser { id }
    }

    pub fn add_note(owner: i64, state: NoteState, text: impl Into<String>) -> Self {
        Self::AddNote {
            owner,
            state,
            text: text.into(),
        }
    }

    pub fn update_note_text(id: i64, text: impl Into<String>) -> Self {
        Self::UpdateNoteText {
            id,
            text: text.into(),
        }
    }

    /// Move `id` directly above `over`.
    pub fn reorder_before(id: i64, over: i64) -> Self {
        Self::Reorder {
            moved_item_id: id,
            over_id: OverId::Before { id: over },
        }
    }

    /// Move `id` to the end of `state`.
    pub fn reorder_last(id: i64, state: NoteState) -> Self {
        Self::Reorder {
            moved_item_id: id,
            over_id: OverId::Last { state },
        }
    }

    /// Replace the text and move the note to the end of `state` in one command.
    pub fn update_note(id: i64, text: impl Into<String>, state: NoteState) -> Self {
        Self::NoteUpdate {
            id,
            updates: vec![
                NoteUpdate::Text { text: text.into() },
                NoteUpdate::Order {
                    over_id: OverId::Last { state },
                },
            ],
        }
    }

    pub fn remove_note(id: i64) -> Self {
        Self::RemoveNote { id }
    }

    pub fn clone_note(id: i64) -> Self {
        Self::CloneNote { id }
    }

    /// Pick the command an edit form should send for `note`.
    ///
    /// Returns `None` when neither the text nor the column changed.
    pub fn edit_note(note: &Note, text: &str, state: NoteState) -> Option<Self> {
        let text_changed = note.text != text;
        let state_changed = note.state != state;
        match (text_changed, state_changed) {
            (true, true) => Some(Self::update_note(note.id, text, state)),
            (true, false) => Some(Self::update_note_text(note.id, text)),
            (false, true) => Some(Self::reorder_last(note.id, state)),
            (false, false) => None,
        }
    }

    /// The `type` discriminator this command is sent with.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::AddUser { .. } => "AddUser",
            Self::UpdateUserName { .. } => "UpdateUserName",
            Self::UpdateUserColor { .. } => "UpdateUserColor",
            Self::RemoveUser { .. } => "RemoveUser",
            Self::AddNote { .. } => "AddNote",
            Self::UpdateNoteText { .. } => "UpdateNoteText",
            Self::Reorder { .. } => "Reorder",
            Self::NoteUpdate { .. } => "NoteUpdate",
            Self::RemoveNote { .. } => "RemoveNote",
            Self::CloneNote { .. } => "CloneNote",
        }
    }

    pub fn to_json(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }

    /// Serialize with a correlation token in the `uuid` field.
    pub fn to_json_with_uuid(&self, uuid: &str) -> Result<String, ProtocolError> {
        let mut value = serde_json::to_value(self).map_err(ProtocolError::Encode)?;
        if let Value::Object(map) = &mut value {
            map.insert("uuid".to_string(), Value::String(uuid.to_string()));
        }
        serde_json::to_string(&value).map_err(ProtocolError::Encode)
    }
}

/// Incremental change carried by a `Patch` message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Operation {
    UserAdded {
        user: User,
    },
    UserNameUpdated {
        #[serde(deserialize_with = "id")]
        id: i64,
        name: String,
    },
    UserColorUpdated {
        #[serde(deserialize_with = "id")]
        id: i64,
        color: String,
    },
    UserRemoved {
        #[serde(deserialize_with = "id")]
        id: i64,
    },
    NoteAdded {
        note: Note,
    },
    NoteTextUpdated {
        #[serde(deserialize_with = "id")]
        id: i64,
        text: String,
    },
    NoteOrderChanged {
        #[serde(deserialize_with = "id")]
        id: i64,
        state: NoteState,
        #[serde(default, deserialize_with = "predecessor")]
        predecessor_id: Option<i64>,
    },
    NoteRemoved {
        #[serde(deserialize_with = "id")]
        id: i64,
    },
    ActionFinished {
        uuid: String,
    },
    /// A `type` tag this client does not know.
    #[serde(skip)]
    Unknown { type_name: String },
    /// A known tag whose body failed to decode.
    #[serde(skip)]
    Invalid { type_name: String, error: String },
}

const KNOWN_OPERATIONS: [&str; 9] = [
    "UserAdded",
    "UserNameUpdated",
    "UserColorUpdated",
    "UserRemoved",
    "NoteAdded",
    "NoteTextUpdated",
    "NoteOrderChanged",
    "NoteRemoved",
    "ActionFinished",
];

impl Operation {
    /// Decode one patch entry. Never fails: unrecognized or broken entries
    /// come back as [`Operation::Unknown`] / [`Operation::Invalid`] so the
    /// rest of the batch can still be applied.
    pub fn decode(value: Value) -> Self {
        let Some(type_name) = value.get("type").and_then(Value::as_str).map(str::to_owned)
        else {
            return Self::Invalid {
                type_name: String::new(),
                error: "missing 'type' discriminator".to_string(),
            };
        };

        if !KNOWN_OPERATIONS.contains(&type_name.as_str()) {
            return Self::Unknown { type_name };
        }

        match serde_json::from_value(value) {
            Ok(op) => op,
            Err(e) => Self::Invalid {
                type_name,
                error: e.to_string(),
            },
        }
    }

    pub fn type_name(&self) -> &str {
        match self {
            Self::UserAdded { .. } => "UserAdded",
            Self::UserNameUpdated { .. } => "UserNameUpdated",
            Self::UserColorUpdated { .. } => "UserColorUpdated",
            Self::UserRemoved { .. } => "UserRemoved",
            Self::NoteAdded { .. } => "NoteAdded",
            Self::NoteTextUpdated { .. } => "NoteTextUpdated",
            Self::NoteOrderChanged { .. } => "NoteOrderChanged",
            Self::NoteRemoved { .. } => "NoteRemoved",
            Self::ActionFinished { .. } => "ActionFinished",
            Self::Unknown { type_name } | Self::Invalid { type_name, .. } => type_name,
        }
    }
}

/// Which collection a snapshot replaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotKind {
    Users,
    Notes,
}

/// A decoded server → client frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    Users(Vec<User>),
    Notes(Vec<Note>),
    Patch(Vec<Operation>),
}

#[derive(Deserialize)]
struct ItemsBody<T> {
    items: Vec<T>,
}

#[derive(Deserialize)]
struct PatchBody {
    ops: Vec<Value>,
}

impl ServerMessage {
    pub fn parse(raw: &str) -> Result<Self, ProtocolError> {
        let value: Value = serde_json::from_str(raw).map_err(ProtocolError::Json)?;
        let type_name = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or(ProtocolError::MissingType)?
            .to_owned();

        let malformed = |source: serde_json::Error| ProtocolError::Malformed {
            type_name: type_name.clone(),
            source,
        };

        match type_name.as_str() {
            "Users" => serde_json::from_value::<ItemsBody<User>>(value)
                .map(|body| Self::Users(body.items))
                .map_err(malformed),
            "Notes" => serde_json::from_value::<ItemsBody<Note>>(value)
                .map(|body| Self::Notes(body.items))
                .map_err(malformed),
            "Patch" => serde_json::from_value::<PatchBody>(value)
                .map(|body| Self::Patch(body.ops.into_iter().map(Operation::decode).collect()))
                .map_err(malformed),
            _ => Err(ProtocolError::UnknownMessage { type_name }),
        }
    }
}
