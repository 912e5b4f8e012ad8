pub mod common;
pub mod config;
pub mod error;
pub mod network;
pub mod session;
pub mod ui;

pub use error::{ChatError, ChatResult};
