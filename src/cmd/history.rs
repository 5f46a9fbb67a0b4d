//! Board snapshot commands (`funban history`).

use anyhow::{Result, anyhow};
use console::style;

use funban::api::{HistoryItem, decode_snapshot};
use funban::board::Board;
use funban::ui::icons::{CHECK, CLOCK};
use funban::ui::{render_board, render_history_list};
use funban::validation::validate_snapshot_label;

use super::Context;
use crate::HistoryCommands;

pub async fn cmd_history(ctx: &Context, command: HistoryCommands) -> Result<()> {
    match command {
        HistoryCommands::List => {
            let items = ctx.api()?.history().await.map_err(|e| ctx.api_failure(e))?;
            print!("{}", render_history_list(&items));
        }
        HistoryCommands::Show { id } => {
            let item = ctx
                .api()?
                .history_item(id)
                .await
                .map_err(|e| ctx.api_failure(e))?;
            print_snapshot(&item)?;
        }
        HistoryCommands::Last => {
            let item = ctx
                .api()?
                .history_last()
                .await
                .map_err(|e| ctx.api_failure(e))?;
            print_snapshot(&item)?;
        }
        HistoryCommands::Save { label } => {
            validate_snapshot_label(&label).map_err(|e| anyhow!(e))?;
            let api = ctx.api()?;

            let session = ctx.open_session().await?;
            let records = session.board().records();
            session.shutdown().await;

            api.post_snapshot(&label, &records)
                .await
                .map_err(|e| ctx.api_failure(e))?;
            println!(
                "{}Saved snapshot {} ({} notes)",
                CHECK,
                style(&label).bold(),
                records.len()
            );
        }
    }
    Ok(())
}

fn print_snapshot(item: &HistoryItem) -> Result<()> {
    let records = decode_snapshot(item)?;
    println!(
        "{}{}  {}",
        CLOCK,
        style(&item.label).bold(),
        style(item.created_label()).dim()
    );
    let mut links = Vec::new();
    if let Some(previous) = item.previous {
        links.push(format!("previous: #{}", previous.id));
    }
    if let Some(next) = item.next {
        links.push(format!("next: #{}", next.id));
    }
    if !links.is_empty() {
        println!("{}", style(links.join("  ")).dim());
    }
    println!();
    print!("{}", render_board(&Board::from_records(&records)));
    Ok(())
}
