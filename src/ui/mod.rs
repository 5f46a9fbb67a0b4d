pub mod icons;
pub mod progress;
pub mod render;

pub use progress::CommandSpinner;
pub use render::{render_board, render_history_list, user_style};
