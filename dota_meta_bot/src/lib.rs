//! A Telegram bot that answers questions about the Dota 2 meta: which
//! heroes win the most, and what to build on them.

/// Configuration read from the environment.
pub mod config;

/// Fetching, extracting, ranking and presenting hero stats.
pub mod pipeline;

/// Hero directory and web search lookups.
pub mod lookup;

/// Bounded log of incoming messages.
pub mod transcript;

/// State shared between handlers.
mod state;

/// Functions that handle events from Telegram.
mod handlers;

/// Entry function that starts the bot.
mod entry;
pub use entry::*;
