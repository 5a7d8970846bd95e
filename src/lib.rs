//! Client-side real-time sync and premium engine
//!
//! Sits between one unreliable, high-frequency event stream and several
//! read-only consumers: keeps the authoritative latest-value tick view,
//! a ranked time-bounded opportunity cache, and computes the
//! currency-normalized premium matrix between exchanges.

pub mod core;
pub mod engine;
pub mod infrastructure;
pub mod premium;
pub mod rest;
pub mod store;
pub mod stream;

// Re-export commonly used types
pub use engine::{EngineHandle, SyncEngine};
pub use infrastructure::config::Config;

use thiserror::Error;

/// Main error type for the sync core
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Stream error: {0}")]
    Stream(String),

    #[error("REST error: {0}")]
    Rest(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, SyncError>;
