pub mod api;
pub mod client;
pub mod protocol;
pub mod transport;

pub use api::{ChatBackend, HttpBackend};
pub use client::ChatClient;
pub use transport::{ConnectionHandle, TransportConfig, connect, disconnect};
