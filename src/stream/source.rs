//! Event sources
//!
//! The multiplexer reads from a `StreamSource`: either a real socket
//! connection or a process-local bridge fed by an execution host. Which one
//! is used is decided by configuration at construction time - both deliver
//! identical envelope payloads. Enum dispatch keeps the read loop free of
//! trait objects.

use crate::stream::connection::StreamConnection;
use crate::stream::envelope::StreamMessage;
use crate::{Result, SyncError};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

/// A connectable source of stream messages.
///
/// Cloning yields a disconnected instance of the same endpoint: socket
/// sources share only their URL, bridge sources share the underlying queue.
/// The multiplexer clones its prototype for every connection instance.
#[derive(Clone)]
pub enum StreamSource {
    Socket(SocketSource),
    Bridge(BridgeSource),
}

impl StreamSource {
    /// Socket-backed source for the given ws:// or wss:// URL
    pub fn socket(url: impl Into<String>) -> Self {
        StreamSource::Socket(SocketSource::new(url.into()))
    }

    /// Process-local source plus the handle the host pushes messages with
    pub fn bridge() -> (BridgeHandle, Self) {
        let (handle, source) = BridgeSource::channel();
        (handle, StreamSource::Bridge(source))
    }

    pub async fn connect(&mut self) -> Result<()> {
        match self {
            StreamSource::Socket(s) => s.connect().await,
            StreamSource::Bridge(_) => Ok(()),
        }
    }

    /// Next parsed message; `Ok(None)` when the source closed.
    ///
    /// Unparseable payloads are logged and skipped without surfacing an
    /// error, so one malformed message never tears down the connection.
    pub async fn next_message(&mut self) -> Result<Option<StreamMessage>> {
        match self {
            StreamSource::Socket(s) => s.next_message().await,
            StreamSource::Bridge(b) => b.next_message().await,
        }
    }

    pub async fn close(&mut self) {
        if let StreamSource::Socket(s) = self {
            s.close().await;
        }
    }

    pub fn is_connected(&self) -> bool {
        match self {
            StreamSource::Socket(s) => s.is_connected(),
            StreamSource::Bridge(_) => true,
        }
    }
}

/// WebSocket-backed source
pub struct SocketSource {
    url: String,
    conn: Option<StreamConnection>,
}

impl SocketSource {
    pub fn new(url: String) -> Self {
        Self { url, conn: None }
    }

    async fn connect(&mut self) -> Result<()> {
        url::Url::parse(&self.url).map_err(|e| SyncError::Config(format!("bad stream url: {e}")))?;
        let conn = StreamConnection::connect(&self.url)
            .await
            .map_err(|e| SyncError::Stream(e.to_string()))?;
        self.conn = Some(conn);
        Ok(())
    }

    async fn next_message(&mut self) -> Result<Option<StreamMessage>> {
        let conn = self
            .conn
            .as_mut()
            .ok_or_else(|| SyncError::Stream("not connected".into()))?;
        loop {
            match conn.recv_text().await {
                Ok(Some(text)) => match StreamMessage::parse_arrived(&text) {
                    Ok(msg) => return Ok(Some(msg)),
                    Err(e) => {
                        tracing::warn!(target: "stream", error = %e, "dropping unparseable message");
                        continue;
                    }
                },
                Ok(None) => {
                    self.conn = None;
                    return Ok(None);
                }
                Err(e) => {
                    self.conn = None;
                    return Err(SyncError::Stream(e.to_string()));
                }
            }
        }
    }

    async fn close(&mut self) {
        if let Some(mut conn) = self.conn.take() {
            conn.close().await;
        }
    }

    fn is_connected(&self) -> bool {
        self.conn.as_ref().is_some_and(|c| c.is_connected())
    }
}

impl Clone for SocketSource {
    fn clone(&self) -> Self {
        // a clone starts disconnected; only the endpoint is shared
        Self::new(self.url.clone())
    }
}

/// Process-local source: an in-memory queue fed by the execution host.
/// Also the transport the tests drive.
#[derive(Clone)]
pub struct BridgeSource {
    rx: Arc<Mutex<mpsc::UnboundedReceiver<StreamMessage>>>,
}

/// Host-side sender for a bridge source
#[derive(Clone)]
pub struct BridgeHandle {
    tx: mpsc::UnboundedSender<StreamMessage>,
}

impl BridgeHandle {
    /// Push one already-typed message; arrival is stamped here, mirroring
    /// what the socket path does on receipt
    pub fn push(&self, mut msg: StreamMessage) -> bool {
        msg.stamp_arrival(crate::core::now_millis());
        self.tx.send(msg).is_ok()
    }

    /// Push a raw envelope as it would arrive on the wire
    pub fn push_raw(&self, text: &str) -> bool {
        match StreamMessage::parse_arrived(text) {
            Ok(msg) => self.tx.send(msg).is_ok(),
            Err(e) => {
                tracing::warn!(target: "stream", error = %e, "dropping unparseable message");
                true
            }
        }
    }
}

impl BridgeSource {
    fn channel() -> (BridgeHandle, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            BridgeHandle { tx },
            Self {
                rx: Arc::new(Mutex::new(rx)),
            },
        )
    }

    async fn next_message(&mut self) -> Result<Option<StreamMessage>> {
        Ok(self.rx.lock().await.recv().await)
    }
}
