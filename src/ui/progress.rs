//! Busy indicator shown while a command waits for its acknowledgement.

use std::time::Duration;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use super::icons::{CHECK, CROSS};

/// Spinner bound to one in-flight command.
///
/// Draws to stderr and stays hidden when stderr is not a terminal, so
/// scripted use only sees the final line.
pub struct CommandSpinner {
    bar: ProgressBar,
}

impl CommandSpinner {
    pub fn start(message: impl Into<String>) -> Self {
        let style = ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg} {elapsed:.dim}")
            .expect("progress bar template is a valid static string");
        let bar = ProgressBar::new_spinner();
        bar.set_style(style);
        bar.set_message(message.into());
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar }
    }

    pub fn clear(self) {
        self.bar.finish_and_clear();
    }

    pub fn succeed(self, message: &str) {
        self.bar.finish_and_clear();
        println!("{}{}", CHECK, style(message).green());
    }

    pub fn fail(self, message: &str) {
        self.bar.finish_and_clear();
        eprintln!("{}{}", CROSS, style(message).red());
    }
}
