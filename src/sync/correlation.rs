//! Tracks the single in-flight command so the UI can show a busy state until
//! the server acknowledges it with `ActionFinished`.

use std::collections::VecDeque;

use funban_common::{Command, ProtocolError};
use uuid::Uuid;

/// How many acknowledged tokens are remembered for [`Correlation::outcome`].
const RECENT_ACKS: usize = 32;

/// A command tagged and ready to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issued {
    pub uuid: String,
    pub json: String,
}

/// Where an issued token stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Pending,
    Finished,
    /// Dropped without an ack (replaced, connection closed, or too old to
    /// be remembered).
    Abandoned,
}

#[derive(Debug, Default)]
pub struct Correlation {
    pending: Option<String>,
    acked: VecDeque<String>,
}

impl Correlation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tag `command` with a fresh token and make it the pending one.
    ///
    /// A previously pending token is dropped and returned alongside; its ack
    /// will no longer clear the busy flag.
    pub fn issue(&mut self, command: &Command) -> Result<(Issued, Option<String>), ProtocolError> {
        let uuid = Uuid::new_v4().to_string();
        let json = command.to_json_with_uuid(&uuid)?;
        let replaced = self.pending.replace(uuid.clone());
        if let Some(old) = &replaced {
            tracing::debug!(abandoned = %old, "pending command replaced by a new one");
        }
        Ok((Issued { uuid, json }, replaced))
    }

    /// Clear the busy flag if `uuid` is the pending token.
    pub fn resolve(&mut self, uuid: &str) -> bool {
        if self.pending.as_deref() == Some(uuid) {
            self.pending = None;
            if self.acked.len() == RECENT_ACKS {
                self.acked.pop_front();
            }
            self.acked.push_back(uuid.to_string());
            true
        } else {
            false
        }
    }

    /// Forget the pending token without an ack. Returns it, if any.
    pub fn abandon(&mut self) -> Option<String> {
        self.pending.take()
    }

    pub fn is_busy(&self) -> bool {
        self.pending.is_some()
    }

    pub fn pending(&self) -> Option<&str> {
        self.pending.as_deref()
    }

    pub fn outcome(&self, uuid: &str) -> Outcome {
        if self.pending.as_deref() == Some(uuid) {
            Outcome::Pending
        } else if self.acked.iter().any(|acked| acked == uuid) {
            Outcome::Finished
        } else {
            Outcome::Abandoned
        }
    }
}
