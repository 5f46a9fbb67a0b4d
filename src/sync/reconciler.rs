//! Folds server messages into the board.
//!
//! Snapshots replace a collection wholesale. Patch operations are applied one
//! by one in array order; a bad operation is logged and skipped and never
//! rolls back the ones before it.

use chrono::{DateTime, Utc};
use funban_common::{Note, Operation, ServerMessage, SnapshotKind, User};

use super::correlation::Correlation;
use crate::board::Board;

/// Outcome of one patch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchReport {
    pub applied: usize,
    pub skipped: usize,
    /// Correlation tokens resolved by `ActionFinished` in this patch.
    pub finished: Vec<String>,
}

/// What a single inbound message changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    Snapshot { kind: SnapshotKind, count: usize },
    Patch(PatchReport),
}

#[derive(Debug, Default)]
pub struct Reconciler {
    board: Board,
    correlation: Correlation,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn correlation(&self) -> &Correlation {
        &self.correlation
    }

    pub fn correlation_mut(&mut self) -> &mut Correlation {
        &mut self.correlation
    }

    pub fn apply_message(&mut self, message: ServerMessage) -> Applied {
        match message {
            ServerMessage::Users(users) => {
                let count = users.len();
                self.apply_users_snapshot(users);
                Applied::Snapshot {
                    kind: SnapshotKind::Users,
                    count,
                }
            }
            ServerMessage::Notes(notes) => {
                let count = notes.len();
                self.apply_notes_snapshot(notes);
                Applied::Snapshot {
                    kind: SnapshotKind::Notes,
                    count,
                }
            }
            ServerMessage::Patch(ops) => Applied::Patch(self.apply_patch(ops)),
        }
    }

    pub fn apply_users_snapshot(&mut self, users: Vec<User>) {
        tracing::debug!(count = users.len(), "replacing users from snapshot");
        self.board.replace_users(users);
    }

    pub fn apply_notes_snapshot(&mut self, notes: Vec<Note>) {
        tracing::debug!(count = notes.len(), "replacing notes from snapshot");
        self.board.replace_notes(notes);
    }

    pub fn apply_patch(&mut self, ops: Vec<Operation>) -> PatchReport {
        let now = Utc::now();
        let mut report = PatchReport::default();
        for op in ops {
            match self.apply_operation(op, now) {
                OpOutcome::Applied => report.applied += 1,
                OpOutcome::Skipped => report.skipped += 1,
                OpOutcome::Finished(Some(uuid)) => {
                    report.applied += 1;
                    report.finished.push(uuid);
                }
                OpOutcome::Finished(None) => report.applied += 1,
            }
        }
        report
    }

    fn apply_operation(&mut self, op: Operation, now: DateTime<Utc>) -> OpOutcome {
        let type_name = op.type_name().to_string();
        let hit = match op {
            Operation::UserAdded { user } => {
                if self.board.upsert_user(user) {
                    tracing::warn!(op = %type_name, "user id already present, replaced");
                }
                true
            }
            Operation::UserNameUpdated { id, name } => self.board.rename_user(id, name),
            Operation::UserColorUpdated { id, color } => self.board.recolor_user(id, color),
            Operation::UserRemoved { id } => match self.board.remove_user(id) {
                Some(notes) => {
                    tracing::debug!(user_id = id, notes, "user removed with owned notes");
                    true
                }
                None => false,
            },
            Operation::NoteAdded { note } => {
                if self.board.upsert_note(note) {
                    tracing::warn!(op = %type_name, "note id already present, replaced");
                }
                true
            }
            Operation::NoteTextUpdated { id, text } => self.board.set_note_text(id, text, now),
            Operation::NoteOrderChanged {
                id,
                state,
                predecessor_id,
            } => self.board.move_note(id, state, predecessor_id, now),
            Operation::NoteRemoved { id } => self.board.remove_note(id),
            Operation::ActionFinished { uuid } => {
                let matched = self.correlation.resolve(&uuid);
                if !matched {
                    tracing::debug!(%uuid, "ack for a command that is not pending");
                }
                return OpOutcome::Finished(matched.then_some(uuid));
            }
            Operation::Unknown { type_name } => {
                tracing::error!(op = %type_name, "unknown operation, skipping");
                return OpOutcome::Skipped;
            }
            Operation::Invalid { type_name, error } => {
                tracing::error!(op = %type_name, %error, "malformed operation, skipping");
                return OpOutcome::Skipped;
            }
        };

        if hit {
            OpOutcome::Applied
        } else {
            tracing::debug!(op = %type_name, "operation targets an unknown id, skipping");
            OpOutcome::Skipped
        }
    }

    /// Drop all board state and any pending command. Returns the abandoned
    /// correlation token, if there was one.
    pub fn reset(&mut self) -> Option<String> {
        self.board.clear();
        self.correlation.abandon()
    }
}

enum OpOutcome {
    Applied,
    Skipped,
    Finished(Option<String>),
}
