//! WebSocket transport for the speech-to-text service.
//!
//! One message stream per client at `/rtstt`: the client sends PCM chunks
//! (raw binary frames, or JSON frames with base64 audio), the server answers
//! with `start speaking` / `stop speaking` / `text` JSON frames.

pub mod client;
pub mod error;
pub mod message;
pub mod server;

pub use client::Client;
pub use error::ComError;
pub use message::{ClientMessage, ServerMessage};
pub use server::{SttServer, RTSTT_PATH};
