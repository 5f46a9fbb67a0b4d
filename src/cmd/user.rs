//! Team member commands (`funban user`).

use anyhow::{Result, anyhow};
use console::style;

use funban::Command;
use funban::ui::user_style;
use funban::validation::validate_user_name;

use super::{Context, resolve_user, run_board_command};
use crate::UserCommands;

pub async fn cmd_user(ctx: &Context, command: UserCommands) -> Result<()> {
    match command {
        UserCommands::List => {
            let session = ctx.open_session().await?;
            let board = session.board();
            session.shutdown().await;

            if board.users().is_empty() {
                println!("No team members yet.");
            }
            for user in board.users() {
                let owned = board.notes().iter().filter(|n| n.owner_id == user.id).count();
                println!(
                    "{:>5}  {}  {}  {}",
                    style(format!("#{}", user.id)).dim(),
                    user_style(&user.color).apply_to(&user.name),
                    style(&user.color).dim(),
                    style(format!("{} notes", owned)).dim()
                );
            }
            Ok(())
        }
        UserCommands::Add { name, color } => {
            run_board_command(ctx, |board| {
                validate_user_name(&name, board.users(), None).map_err(|e| anyhow!(e))?;
                Ok(Some((
                    Command::add_user(name.as_str(), color.as_str()),
                    format!("Added {}", name),
                )))
            })
            .await
        }
        UserCommands::Rename { user, name } => {
            run_board_command(ctx, |board| {
                let target = resolve_user(board, &user)?;
                if target.name == name {
                    return Ok(None);
                }
                validate_user_name(&name, board.users(), Some(target.id)).map_err(|e| anyhow!(e))?;
                Ok(Some((
                    Command::update_user_name(target.id, name.as_str()),
                    format!("Renamed {} to {}", target.name, name),
                )))
            })
            .await
        }
        UserCommands::Color { user, color } => {
            run_board_command(ctx, |board| {
                let target = resolve_user(board, &user)?;
                if target.color == color {
                    return Ok(None);
                }
                Ok(Some((
                    Command::update_user_color(target.id, color.as_str()),
                    format!("{} is now {}", target.name, color),
                )))
            })
            .await
        }
        UserCommands::Remove { user } => {
            run_board_command(ctx, |board| {
                let target = resolve_user(board, &user)?;
                let owned = board.notes().iter().filter(|n| n.owner_id == target.id).count();
                let prompt = format!(
                    "Remove {} and their {} note(s)?",
                    target.name, owned
                );
                if !ctx.confirm(&prompt)? {
                    return Ok(None);
                }
                Ok(Some((
                    Command::remove_user(target.id),
                    format!("Removed {}", target.name),
                )))
            })
            .await
        }
    }
}
