//! Shared status glyphs with plain-text fallbacks.

use console::Emoji;

pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK]");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "[ERR]");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "[!]");

// connection status
pub static LINK: Emoji<'_, '_> = Emoji("🔗 ", "[~]");
pub static PLUG: Emoji<'_, '_> = Emoji("🔌 ", "[x]");

pub static CLOCK: Emoji<'_, '_> = Emoji("⏱️  ", "[T]");
