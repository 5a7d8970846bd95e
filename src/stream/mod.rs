//! Stream transport: envelope parsing, sources, and the fan-out multiplexer

pub mod connection;
pub mod envelope;
pub mod multiplexer;
pub mod source;

pub use connection::{ConnectionError, StreamConnection};
pub use envelope::{MessageKind, StreamMessage};
pub use multiplexer::{ConnectionStatus, StreamMultiplexer, StreamSubscription};
pub use source::{BridgeHandle, StreamSource};
