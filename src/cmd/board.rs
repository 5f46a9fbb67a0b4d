//! Live board view (`funban board`).

use anyhow::Result;
use console::{Term, style};
use tokio::sync::broadcast::error::RecvError;

use funban::ui::icons::{LINK, PLUG};
use funban::ui::render_board;
use funban::{ConnectionStatus, SyncEvent};

use super::Context;

pub async fn cmd_board(ctx: &Context, once: bool) -> Result<()> {
    let session = ctx.open_session().await?;
    let mut events = session.subscribe();
    let term = Term::stdout();

    if once {
        print!("{}", render_board(&session.board()));
        session.shutdown().await;
        return Ok(());
    }

    redraw(&term, &render_board(&session.board()), ConnectionStatus::Open);
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Ok(SyncEvent::SnapshotApplied { .. })
                | Ok(SyncEvent::Patched { .. })
                | Ok(SyncEvent::Cleared)
                | Ok(SyncEvent::Status(_)) => {
                    redraw(&term, &render_board(&session.board()), session.status());
                }
                Ok(SyncEvent::CommandFinished { .. }) | Ok(SyncEvent::CommandAbandoned { .. }) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "board view lagged, redrawing");
                    redraw(&term, &render_board(&session.board()), session.status());
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    session.shutdown().await;
    Ok(())
}

fn redraw(term: &Term, board: &str, status: ConnectionStatus) {
    if term.is_term() {
        let _ = term.clear_screen();
    }
    let status_line = match status {
        ConnectionStatus::Open => format!("{}{}", LINK, style("live").green()),
        other => format!("{}{}", PLUG, style(other).yellow()),
    };
    println!("{}  {}", status_line, style("Ctrl-C to quit").dim());
    println!();
    print!("{}", board);
}
