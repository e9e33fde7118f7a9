//! Orrery Web - frame streaming server

#![warn(missing_docs)]
#![warn(clippy::missing_errors_doc)]
#![deny(clippy::missing_panics_doc)]
//!
//! Serves the browser client and exposes the `/sim` WebSocket endpoint,
//! where each connection gets its own simulation streamed in batches.

pub mod handlers;
pub mod server;
pub mod static_files;
pub mod websocket;

// Re-export main types
pub use server::{AppState, WebError, build_router, run_server};
pub use static_files::StaticAssets;
pub use websocket::WebSocketTransport;
