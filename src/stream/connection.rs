//! WebSocket connection
//!
//! Thin wrapper over tokio-tungstenite carrying the connection state the
//! multiplexer needs. TCP_NODELAY is set on plain streams so small envelope
//! frames are not batched by Nagle.

use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::{timeout, Instant};
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message, MaybeTlsStream, WebSocketStream};

use futures_util::{SinkExt, StreamExt};

/// Connect timeout for the initial handshake
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connected,
    Disconnected,
}

#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("connection failed: {0}")]
    ConnectFailed(String),
    #[error("send failed: {0}")]
    SendFailed(String),
    #[error("receive failed: {0}")]
    ReceiveFailed(String),
    #[error("connect timed out")]
    Timeout,
    #[error("not connected")]
    NotConnected,
}

pub type Result<T> = std::result::Result<T, ConnectionError>;

/// A single live WebSocket connection to the data stream
pub struct StreamConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    state: ConnectionState,
    last_activity: Instant,
}

impl StreamConnection {
    /// Connect to a ws:// or wss:// endpoint
    pub async fn connect(url: &str) -> Result<Self> {
        let (ws_stream, _) = timeout(CONNECT_TIMEOUT, connect_async(url))
            .await
            .map_err(|_| ConnectionError::Timeout)?
            .map_err(|e| ConnectionError::ConnectFailed(e.to_string()))?;

        if let MaybeTlsStream::Plain(tcp) = ws_stream.get_ref() {
            tcp.set_nodelay(true)
                .map_err(|e| ConnectionError::ConnectFailed(e.to_string()))?;
        }

        Ok(Self {
            stream: ws_stream,
            state: ConnectionState::Connected,
            last_activity: Instant::now(),
        })
    }

    /// Send a text frame
    pub async fn send_text(&mut self, text: &str) -> Result<()> {
        if self.state != ConnectionState::Connected {
            return Err(ConnectionError::NotConnected);
        }
        self.stream
            .send(Message::text(text))
            .await
            .map_err(|e| ConnectionError::SendFailed(e.to_string()))?;
        self.last_activity = Instant::now();
        Ok(())
    }

    /// Receive the next text payload.
    ///
    /// Control frames (ping/pong) are handled by the protocol layer and
    /// skipped here. Returns `Ok(None)` once the peer closes.
    pub async fn recv_text(&mut self) -> Result<Option<String>> {
        if self.state != ConnectionState::Connected {
            return Err(ConnectionError::NotConnected);
        }

        loop {
            match self.stream.next().await {
                Some(Ok(msg)) => {
                    self.last_activity = Instant::now();
                    match msg {
                        Message::Text(text) => return Ok(Some(text.as_str().to_string())),
                        Message::Binary(data) => {
                            if let Ok(text) = std::str::from_utf8(&data) {
                                return Ok(Some(text.to_string()));
                            }
                            // non-UTF8 binary frame, skip
                        }
                        Message::Close(_) => {
                            self.state = ConnectionState::Disconnected;
                            return Ok(None);
                        }
                        _ => {} // ping/pong/frame
                    }
                }
                Some(Err(e)) => {
                    self.state = ConnectionState::Disconnected;
                    return Err(ConnectionError::ReceiveFailed(e.to_string()));
                }
                None => {
                    self.state = ConnectionState::Disconnected;
                    return Ok(None);
                }
            }
        }
    }

    #[inline]
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Time since the last frame in either direction
    #[inline]
    pub fn idle_duration(&self) -> Duration {
        self.last_activity.elapsed()
    }

    /// Close gracefully; errors on close are ignored, the connection is
    /// considered gone either way
    pub async fn close(&mut self) {
        if self.state == ConnectionState::Connected {
            let _ = self.stream.close(None).await;
            self.state = ConnectionState::Disconnected;
        }
    }
}
