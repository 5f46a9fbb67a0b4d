//! In-memory board: the user and note collections plus read-side views.
//!
//! Mutation is `pub(crate)` and only driven by the reconciler; everything
//! outside the sync core sees the board through clones and views.

pub mod ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use funban_common::{Note, NoteState, User};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Board {
    users: Vec<User>,
    notes: Vec<Note>,
}

impl Board {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a read-only board from snapshot records. Owners are recovered
    /// from the frozen name and color, first occurrence wins.
    pub fn from_records(records: &[NoteRecord]) -> Self {
        let mut board = Self::new();
        for record in records {
            if board.user(record.owner_id).is_none() {
                board.users.push(User {
                    id: record.owner_id,
                    name: record.name.clone(),
                    color: record.color.clone(),
                });
            }
            board.notes.push(Note {
                id: record.id,
                text: record.text.clone(),
                owner_id: record.owner_id,
                state: record.state,
                predecessor_id: record.predecessor_id,
                created: record.created,
                updated: record.updated,
            });
        }
        board
    }

    pub fn users(&self) -> &[User] {
        &self.users
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn user(&self, id: i64) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }

    pub fn note(&self, id: i64) -> Option<&Note> {
        self.notes.iter().find(|n| n.id == id)
    }

    pub fn user_by_name(&self, name: &str) -> Option<&User> {
        self.users.iter().find(|u| u.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty() && self.notes.is_empty()
    }

    /// Join a note with its owner.
    pub fn view<'a>(&'a self, note: &'a Note) -> NoteView<'a> {
        NoteView {
            note,
            owner: self.user(note.owner_id),
        }
    }

    /// Notes of one column, in display order.
    pub fn column(&self, state: NoteState) -> Vec<NoteView<'_>> {
        ordering::order_column(self.notes.iter().filter(|n| n.state == state))
            .into_iter()
            .map(|note| self.view(note))
            .collect()
    }

    /// All four columns in display order.
    pub fn columns(&self) -> Vec<Column<'_>> {
        ordering::ordered_columns(&self.notes)
            .into_iter()
            .map(|(state, notes)| Column {
                state,
                notes: notes.into_iter().map(|note| self.view(note)).collect(),
            })
            .collect()
    }

    /// Flatten the board into self-contained records (owner name and color
    /// resolved), in column display order.
    pub fn records(&self) -> Vec<NoteRecord> {
        self.columns()
            .iter()
            .flat_map(|column| column.notes.iter().map(NoteView::to_record))
            .collect()
    }

    pub(crate) fn replace_users(&mut self, users: Vec<User>) {
        self.users = users;
    }

    pub(crate) fn replace_notes(&mut self, notes: Vec<Note>) {
        self.notes = notes;
    }

    /// Append, or replace in place when the id already exists.
    /// Returns `true` if an existing user was replaced.
    pub(crate) fn upsert_user(&mut self, user: User) -> bool {
        match self.users.iter_mut().find(|u| u.id == user.id) {
            Some(existing) => {
                *existing = user;
                true
            }
            None => {
                self.users.push(user);
                false
            }
        }
    }

    pub(crate) fn rename_user(&mut self, id: i64, name: String) -> bool {
        match self.users.iter_mut().find(|u| u.id == id) {
            Some(user) => {
                user.name = name;
                true
            }
            None => false,
        }
    }

    pub(crate) fn recolor_user(&mut self, id: i64, color: String) -> bool {
        match self.users.iter_mut().find(|u| u.id == id) {
            Some(user) => {
                user.color = color;
                true
            }
            None => false,
        }
    }

    /// Remove a user and every note they own. Returns the number of notes
    /// removed, or `None` if the user was unknown. Owned notes are removed
    /// even when the user itself is missing.
    pub(crate) fn remove_user(&mut self, id: i64) -> Option<usize> {
        let before = self.notes.len();
        self.notes.retain(|n| n.owner_id != id);
        let removed_notes = before - self.notes.len();

        let users_before = self.users.len();
        self.users.retain(|u| u.id != id);
        (self.users.len() != users_before).then_some(removed_notes)
    }

    pub(crate) fn upsert_note(&mut self, note: Note) -> bool {
        match self.notes.iter_mut().find(|n| n.id == note.id) {
            Some(existing) => {
                *existing = note;
                true
            }
            None => {
                self.notes.push(note);
                false
            }
        }
    }

    pub(crate) fn set_note_text(&mut self, id: i64, text: String, now: DateTime<Utc>) -> bool {
        match self.notes.iter_mut().find(|n| n.id == id) {
            Some(note) => {
                note.text = text;
                note.updated = now;
                true
            }
            None => false,
        }
    }

    pub(crate) fn move_note(
        &mut self,
        id: i64,
        state: NoteState,
        predecessor_id: Option<i64>,
        now: DateTime<Utc>,
    ) -> bool {
        match self.notes.iter_mut().find(|n| n.id == id) {
            Some(note) => {
                note.state = state;
                note.predecessor_id = predecessor_id;
                note.updated = now;
                true
            }
            None => false,
        }
    }

    pub(crate) fn remove_note(&mut self, id: i64) -> bool {
        let before = self.notes.len();
        self.notes.retain(|n| n.id != id);
        self.notes.len() != before
    }

    pub(crate) fn clear(&mut self) {
        self.users.clear();
        self.notes.clear();
    }
}

/// A note joined with its owner at read time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteView<'a> {
    pub note: &'a Note,
    pub owner: Option<&'a User>,
}

impl NoteView<'_> {
    pub fn owner_name(&self) -> Option<&str> {
        self.owner.map(|u| u.name.as_str())
    }

    pub fn color(&self) -> Option<&str> {
        self.owner.map(|u| u.color.as_str())
    }

    pub fn to_record(&self) -> NoteRecord {
        NoteRecord {
            id: self.note.id,
            text: self.note.text.clone(),
            name: self.owner_name().unwrap_or_default().to_string(),
            owner_id: self.note.owner_id,
            color: self.color().unwrap_or_default().to_string(),
            state: self.note.state,
            predecessor_id: self.note.predecessor_id,
            created: self.note.created,
            updated: self.note.updated,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column<'a> {
    pub state: NoteState,
    pub notes: Vec<NoteView<'a>>,
}

/// Self-contained note as stored in history snapshots: owner name and color
/// are frozen into the record because a snapshot carries no user list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteRecord {
    pub id: i64,
    pub text: String,
    pub name: String,
    pub owner_id: i64,
    pub color: String,
    pub state: NoteState,
    pub predecessor_id: Option<i64>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}
