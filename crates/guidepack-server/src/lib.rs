//! Development server with live reload for bundled guides.
//!
//! Serves the in-memory bundle, rebuilds it whenever a guide source changes
//! and tells connected browsers to reload over a WebSocket.

pub mod server;
pub mod watcher;
pub mod websocket;

pub use server::{DevServer, DevServerConfig, ServerError};
pub use watcher::{FileWatcher, WatchEvent};
pub use websocket::{ReloadHub, ReloadMessage};
