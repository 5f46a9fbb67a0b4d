use chrono::{DateTime, Utc};
use funban_common::{Note, parse_timestamp};
use serde::{Deserialize, Serialize};

use crate::board::NoteRecord;

/// Body of `POST /auth/signin`.
#[derive(Debug, Serialize)]
pub struct SignInRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

/// Response of `POST /auth/signin`. Only the token matters to the client.
#[derive(Debug, Clone, Deserialize)]
pub struct SignIn {
    pub token: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Response of `GET /auth/me`.
#[derive(Debug, Clone, Deserialize)]
pub struct Account {
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct ChangePasswordRequest<'a> {
    pub old_password: &'a str,
    pub new_password: &'a str,
}

#[derive(Debug, Serialize)]
pub struct ChangeEmailRequest<'a> {
    pub new_email: &'a str,
}

#[derive(Debug, Serialize)]
pub struct SnapshotRequest<'a> {
    pub label: &'a str,
    /// base64 of the JSON-encoded note records.
    pub snapshot: String,
}

/// Link to a neighbouring history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRef {
    pub id: i64,
}

/// One saved board snapshot. `snapshot` is only present on the detail
/// endpoints; the list endpoint returns metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryItem {
    pub id: i64,
    pub label: String,
    /// Kept as sent; see [`HistoryItem::created`].
    pub created_at: String,
    #[serde(default)]
    pub snapshot: Option<String>,
    #[serde(default)]
    pub next: Option<HistoryRef>,
    #[serde(default)]
    pub previous: Option<HistoryRef>,
}

impl HistoryItem {
    pub fn created(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.created_at)
    }

    /// `dd/mm/yyyy, hh:mm`, or the raw value when it is not a timestamp.
    pub fn created_label(&self) -> String {
        match self.created() {
            Some(at) => at.format("%d/%m/%Y, %H:%M").to_string(),
            None => self.created_at.clone(),
        }
    }
}

/// Body of a 400 response.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
}

/// Owner details as they may appear inside a stored snapshot: either flat
/// (`name`, `color`) or nested under `owner`.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct SnapshotOwnerFields {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub owner: Option<SnapshotOwner>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SnapshotOwner {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

impl SnapshotOwnerFields {
    pub(crate) fn into_record(self, note: Note) -> NoteRecord {
        let (nested_name, nested_color) = self
            .owner
            .map(|owner| (owner.name, owner.color))
            .unwrap_or_default();
        NoteRecord {
            id: note.id,
            text: note.text,
            name: self.name.or(nested_name).unwrap_or_default(),
            owner_id: note.owner_id,
            color: self.color.or(nested_color).unwrap_or_default(),
            state: note.state,
            predecessor_id: note.predecessor_id,
            created: note.created,
            updated: note.updated,
        }
    }
}
