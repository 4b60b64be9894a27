//! Chat-bot front end for QnA Assist.
//!
//! Requesters ask questions by text or voice; every generated answer is
//! routed through the moderation gate before it reaches them.

pub mod dispatcher;
pub mod polling;
pub mod telegram;
pub mod transport;
pub mod voice;

pub use dispatcher::{Answerer, Dispatcher};
pub use polling::run_polling;
pub use telegram::{TelegramTransport, Update};
pub use transport::{ChatTransport, Content, Event};
pub use voice::{voice_file_name, Transcriber, WhisperHttpTranscriber};
