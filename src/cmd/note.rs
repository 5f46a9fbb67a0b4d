//! Note commands (`funban note`).

use anyhow::{Context as _, Result, anyhow};

use funban::Command;
use funban::board::Board;
use funban::validation::validate_note_text;

use super::{Context, resolve_user, run_board_command};
use crate::NoteCommands;

pub async fn cmd_note(ctx: &Context, command: NoteCommands) -> Result<()> {
    match command {
        NoteCommands::Add { text, owner, state } => {
            run_board_command(ctx, |board| {
                validate_note_text(&text).map_err(|e| anyhow!(e))?;
                let owner = resolve_user(board, &owner)?;
                Ok(Some((
                    Command::add_note(owner.id, state, text.as_str()),
                    format!("Added note for {} in {}", owner.name, state.label()),
                )))
            })
            .await
        }
        NoteCommands::Edit { id, text, state } => {
            run_board_command(ctx, |board| {
                let note = require_note(board, id)?;
                let text = text.unwrap_or_else(|| note.text.clone());
                validate_note_text(&text).map_err(|e| anyhow!(e))?;
                let state = state.unwrap_or(note.state);
                Ok(Command::edit_note(note, &text, state)
                    .map(|command| (command, format!("Updated note #{}", id))))
            })
            .await
        }
        NoteCommands::Before { id, over } => {
            run_board_command(ctx, |board| {
                require_note(board, id)?;
                let target = require_note(board, over)?;
                if id == over {
                    return Ok(None);
                }
                Ok(Some((
                    Command::reorder_before(id, over),
                    format!("Moved #{} above #{} in {}", id, over, target.state.label()),
                )))
            })
            .await
        }
        NoteCommands::Last { id, state } => {
            run_board_command(ctx, |board| {
                require_note(board, id)?;
                Ok(Some((
                    Command::reorder_last(id, state),
                    format!("Moved #{} to the end of {}", id, state.label()),
                )))
            })
            .await
        }
        NoteCommands::Remove { id } => {
            run_board_command(ctx, |board| {
                let note = require_note(board, id)?;
                let preview: String = note.text.chars().take(40).collect();
                if !ctx.confirm(&format!("Delete note #{} \"{}\"?", id, preview))? {
                    return Ok(None);
                }
                Ok(Some((Command::remove_note(id), format!("Deleted note #{}", id))))
            })
            .await
        }
        NoteCommands::Clone { id } => {
            run_board_command(ctx, |board| {
                require_note(board, id)?;
                Ok(Some((Command::clone_note(id), format!("Cloned note #{}", id))))
            })
            .await
        }
    }
}

fn require_note(board: &Board, id: i64) -> Result<&funban::Note> {
    board
        .note(id)
        .with_context(|| format!("No note #{} on the board", id))
}
