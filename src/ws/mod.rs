//! WebSocket surface: wire messages, connection handling and fan-out.

pub mod dispatcher;
pub mod handler;
pub mod messages;

pub use handler::{create_router, AppState};
pub use messages::{ClientMessage, ServerMessage, TranscriptionResult};
