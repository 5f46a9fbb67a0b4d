use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, de};
use serde_json::Value;

/// A board member. Notes reference their owner by `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(deserialize_with = "id")]
    pub id: i64,
    pub name: String,
    pub color: String,
}

/// Board column a note lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteState {
    Notes,
    Todo,
    InProgress,
    Done,
}

impl NoteState {
    /// Columns in display order.
    pub const ALL: [NoteState; 4] = [
        NoteState::Notes,
        NoteState::Todo,
        NoteState::InProgress,
        NoteState::Done,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Notes => "notes",
            Self::Todo => "todo",
            Self::InProgress => "in_progress",
            Self::Done => "done",
        }
    }

    /// Human-facing column title.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Notes => "Notes",
            Self::Todo => "To Do",
            Self::InProgress => "In Progress",
            Self::Done => "Done",
        }
    }
}

impl std::fmt::Display for NoteState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NoteState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "notes" => Ok(Self::Notes),
            "todo" => Ok(Self::Todo),
            "in_progress" => Ok(Self::InProgress),
            "done" => Ok(Self::Done),
            _ => Err(format!("Invalid note state: {}", s)),
        }
    }
}

/// A card on the board.
///
/// Ordering inside a column is encoded by `predecessor_id`: `None` marks the
/// head of the column, otherwise it points at the note displayed right above.
/// Owner name and color are not stored here; they are joined from the user
/// collection when a note is displayed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WireNote")]
pub struct Note {
    pub id: i64,
    pub text: String,
    pub owner_id: i64,
    pub state: NoteState,
    pub predecessor_id: Option<i64>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

/// Inbound note shape. The server may send either a flat `owner_id` or a
/// nested `owner` object, and ids either as numbers or numeric strings.
#[derive(Deserialize)]
struct WireNote {
    #[serde(deserialize_with = "id")]
    id: i64,
    text: String,
    #[serde(default, deserialize_with = "optional_id")]
    owner_id: Option<i64>,
    #[serde(default)]
    owner: Option<WireOwner>,
    state: NoteState,
    #[serde(default, deserialize_with = "predecessor")]
    predecessor_id: Option<i64>,
    #[serde(default = "Utc::now", deserialize_with = "timestamp")]
    created: DateTime<Utc>,
    #[serde(default = "Utc::now", deserialize_with = "timestamp")]
    updated: DateTime<Utc>,
}

#[derive(Deserialize)]
struct WireOwner {
    #[serde(deserialize_with = "id")]
    id: i64,
}

impl TryFrom<WireNote> for Note {
    type Error = String;

    fn try_from(wire: WireNote) -> Result<Self, Self::Error> {
        let owner_id = wire
            .owner_id
            .or(wire.owner.map(|owner| owner.id))
            .ok_or_else(|| format!("note {} has no owner", wire.id))?;
        Ok(Note {
            id: wire.id,
            text: wire.text,
            owner_id,
            state: wire.state,
            predecessor_id: wire.predecessor_id,
            created: wire.created,
            updated: wire.updated,
        })
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IdRepr {
    Int(i64),
    Text(String),
}

impl IdRepr {
    fn into_id<E: de::Error>(self) -> Result<i64, E> {
        match self {
            IdRepr::Int(n) => Ok(n),
            IdRepr::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| E::custom(format!("invalid id '{}'", s))),
        }
    }
}

pub(crate) fn id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    IdRepr::deserialize(deserializer)?.into_id()
}

pub(crate) fn optional_id<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<i64>, D::Error> {
    match Option::<IdRepr>::deserialize(deserializer)? {
        None => Ok(None),
        Some(repr) => repr.into_id().map(Some),
    }
}

/// Like [`optional_id`], but `0` and `""` also mean "no predecessor".
pub(crate) fn predecessor<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<i64>, D::Error> {
    match Option::<IdRepr>::deserialize(deserializer)? {
        None => Ok(None),
        Some(IdRepr::Text(s)) if s.trim().is_empty() => Ok(None),
        Some(repr) => repr.into_id().map(|id| (id != 0).then_some(id)),
    }
}

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Parse a server timestamp. RFC 3339 is preferred; a date-time without an
/// offset, or a bare date, is read as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Some(at.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
        .map(|naive| naive.and_utc())
}

/// Note timestamps are display-only, so one that cannot be read falls back
/// to the current time instead of failing the whole note.
fn timestamp<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
    let parsed = match Value::deserialize(deserializer)? {
        Value::String(raw) => parse_timestamp(&raw),
        // epoch milliseconds
        Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    };
    Ok(parsed.unwrap_or_else(Utc::now))
}

/// Normalize a color name for comparison: lowercase, spaces become `_`.
pub fn normalize_color_name(color: &str) -> String {
    color.trim().to_lowercase().replace(' ', "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_state_round_trips_through_str() {
        for state in NoteState::ALL {
            assert_eq!(state.as_str().parse::<NoteState>().unwrap(), state);
        }
        assert!("backlog".parse::<NoteState>().is_err());
    }

    #[test]
    fn test_note_state_serializes_snake_case() {
        let json = serde_json::to_string(&NoteState::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
    }

    #[test]
    fn test_note_accepts_flat_owner_id() {
        let json = r#"{
            "id": 3, "text": "ship it", "owner_id": 1, "state": "todo",
            "predecessor_id": 2,
            "created": "2024-05-01T10:00:00Z", "updated": "2024-05-01T10:00:00Z"
        }"#;
        let note: Note = serde_json::from_str(json).unwrap();
        assert_eq!(note.id, 3);
        assert_eq!(note.owner_id, 1);
        assert_eq!(note.state, NoteState::Todo);
        assert_eq!(note.predecessor_id, Some(2));
    }

    #[test]
    fn test_note_accepts_nested_owner_and_string_ids() {
        let json = r#"{
            "id": "7", "text": "review", "state": "done",
            "owner": {"id": "4", "name": "Ada", "color": "sky blue"},
            "predecessor_id": null,
            "created": "2024-05-01T10:00:00Z", "updated": "2024-05-02T10:00:00Z"
        }"#;
        let note: Note = serde_json::from_str(json).unwrap();
        assert_eq!(note.id, 7);
        assert_eq!(note.owner_id, 4);
        assert_eq!(note.predecessor_id, None);
    }

    #[test]
    fn test_note_zero_predecessor_means_head() {
        let json = r#"{"id": 1, "text": "a", "owner_id": 1, "state": "notes", "predecessor_id": 0}"#;
        let note: Note = serde_json::from_str(json).unwrap();
        assert_eq!(note.predecessor_id, None);
    }

    #[test]
    fn test_note_without_owner_is_rejected() {
        let json = r#"{"id": 1, "text": "a", "state": "notes"}"#;
        let err = serde_json::from_str::<Note>(json).unwrap_err();
        assert!(err.to_string().contains("no owner"));
    }

    #[test]
    fn test_note_rejects_non_numeric_id() {
        let json = r#"{"id": "abc", "text": "a", "owner_id": 1, "state": "notes"}"#;
        assert!(serde_json::from_str::<Note>(json).is_err());
    }

    #[test]
    fn test_note_accepts_timestamp_without_offset() {
        let json = r#"{
            "id": 1, "text": "a", "owner_id": 1, "state": "notes",
            "created": "2024-05-01T10:00:00", "updated": "2024-05-01 12:30:00.123456"
        }"#;
        let note: Note = serde_json::from_str(json).unwrap();
        assert_eq!(note.created, "2024-05-01T10:00:00Z".parse::<DateTime<Utc>>().unwrap());
        assert_eq!(
            note.updated,
            "2024-05-01T12:30:00.123456Z".parse::<DateTime<Utc>>().unwrap()
        );
    }

    #[test]
    fn test_note_survives_unreadable_timestamp() {
        let json = r#"{
            "id": 1, "text": "a", "owner_id": 1, "state": "notes",
            "created": "last tuesday", "updated": 1714557600000
        }"#;
        let note: Note = serde_json::from_str(json).unwrap();
        assert_eq!(note.id, 1);
        assert_eq!(note.updated, "2024-05-01T10:00:00Z".parse::<DateTime<Utc>>().unwrap());
    }

    #[test]
    fn test_parse_timestamp_variants() {
        let expected: DateTime<Utc> = "2024-05-01T10:00:00Z".parse().unwrap();
        assert_eq!(parse_timestamp("2024-05-01T12:00:00+02:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-01T10:00:00"), Some(expected));
        assert_eq!(
            parse_timestamp("2024-05-01"),
            Some("2024-05-01T00:00:00Z".parse().unwrap())
        );
        assert_eq!(parse_timestamp("soon"), None);
    }

    #[test]
    fn test_normalize_color_name() {
        assert_eq!(normalize_color_name("Sky Blue"), "sky_blue");
        assert_eq!(normalize_color_name("red"), "red");
    }
}
