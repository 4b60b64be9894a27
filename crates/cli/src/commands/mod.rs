//! Command handlers for the QnA Assist CLI.

pub mod ask;
pub mod bot;
pub mod classify;
pub mod serve;

// Re-export command types for convenience
pub use ask::AskCommand;
pub use bot::BotCommand;
pub use classify::ClassifyCommand;
pub use serve::ServeCommand;
