//! Plain-terminal rendering of the board and of history listings.

use std::fmt::Write as _;

use console::{Color, Style, style};
use funban_common::normalize_color_name;

use crate::api::HistoryItem;
use crate::board::Board;

const RULE_WIDTH: usize = 48;

/// Map a user color name onto the nearest terminal color.
pub fn user_style(color: &str) -> Style {
    let color = match normalize_color_name(color).as_str() {
        "red" | "orange" | "deep_orange" => Color::Red,
        "green" | "light_green" | "lime" | "teal" => Color::Green,
        "yellow" | "amber" => Color::Yellow,
        "blue" | "indigo" | "dark_blue" => Color::Blue,
        "purple" | "deep_purple" | "pink" | "magenta" => Color::Magenta,
        "cyan" | "light_blue" => Color::Cyan,
        _ => Color::White,
    };
    Style::new().fg(color)
}

/// All four columns, top to bottom, each in chain order.
pub fn render_board(board: &Board) -> String {
    let mut out = String::new();
    for column in board.columns() {
        let title = format!("{} ({})", column.state.label(), column.notes.len());
        let rule = "─".repeat(RULE_WIDTH.saturating_sub(title.chars().count() + 4));
        let _ = writeln!(out, "── {} {}", style(title).bold(), style(rule).dim());

        if column.notes.is_empty() {
            let _ = writeln!(out, "   {}", style("(empty)").dim());
        }
        for view in &column.notes {
            let owner = view.owner_name().unwrap_or("?");
            let owner_style = view.color().map(user_style).unwrap_or_default();
            let _ = writeln!(
                out,
                "  {:>4}  {}  {}",
                style(format!("#{}", view.note.id)).dim(),
                owner_style.apply_to(format!("[{}]", owner)),
                view.note.text.replace('\n', " ")
            );
        }
        out.push('\n');
    }
    if !board.users().is_empty() {
        let members: Vec<String> = board
            .users()
            .iter()
            .map(|u| user_style(&u.color).apply_to(format!("{} (#{})", u.name, u.id)).to_string())
            .collect();
        let _ = writeln!(out, "Team: {}", members.join(", "));
    }
    out
}

pub fn render_history_list(items: &[HistoryItem]) -> String {
    let mut out = String::new();
    if items.is_empty() {
        out.push_str("No snapshots saved yet.\n");
        return out;
    }
    for item in items {
        let _ = writeln!(
            out,
            "{:>5}  {}  {}",
            style(format!("#{}", item.id)).dim(),
            item.created_label(),
            item.label
        );
    }
    out
}
