//! Transport multiplexer
//!
//! Owns the single underlying stream connection and fans it out to any
//! number of logical subscribers. The first subscriber opens the connection;
//! the last unsubscribe closes it and clears all retained state - a later
//! first-subscriber starts a fresh connection instance.
//!
//! One message per logical kind is retained, and a new subscriber is
//! replayed every retained message (snapshots before deltas) before any live
//! message, so late joiners reach a consistent initial state without a
//! request/response round trip.
//!
//! On abnormal closure the reader reconnects after a fixed small delay - not
//! exponential backoff, the upstream typically recovers quickly.

use crate::stream::envelope::{MessageKind, StreamMessage};
use crate::stream::source::StreamSource;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Observable connection lifecycle, for staleness badges
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// No subscribers, no connection
    Idle,
    Connecting,
    Connected,
    /// Lost the connection, waiting out the reconnect delay
    Reconnecting,
}

struct MuxState {
    subscribers: HashMap<u64, mpsc::UnboundedSender<StreamMessage>>,
    retained: HashMap<MessageKind, StreamMessage>,
    next_id: u64,
    /// Bumped when the last subscriber leaves; a reader from an older
    /// generation stops itself on the next dispatch
    generation: u64,
    reader: Option<JoinHandle<()>>,
    status: ConnectionStatus,
}

struct MuxShared {
    source: StreamSource,
    reconnect_delay: Duration,
    state: Mutex<MuxState>,
}

impl MuxShared {
    fn is_current(&self, generation: u64) -> bool {
        self.state.lock().generation == generation
    }

    fn set_status(&self, generation: u64, status: ConnectionStatus) {
        let mut state = self.state.lock();
        if state.generation == generation {
            state.status = status;
        }
    }

    /// Retain the message under its kind and fan out to live subscribers.
    /// Returns false when this reader's generation has been retired.
    fn dispatch(&self, generation: u64, msg: StreamMessage) -> bool {
        let mut state = self.state.lock();
        if state.generation != generation {
            return false;
        }
        state.retained.insert(msg.kind(), msg.clone());
        state
            .subscribers
            .retain(|_, tx| tx.send(msg.clone()).is_ok());
        true
    }

    fn unsubscribe(&self, id: u64) {
        let mut state = self.state.lock();
        state.subscribers.remove(&id);
        if state.subscribers.is_empty() {
            // terminal for this connection instance
            state.generation += 1;
            if let Some(reader) = state.reader.take() {
                reader.abort();
            }
            state.retained.clear();
            state.status = ConnectionStatus::Idle;
        }
    }
}

/// Handle to one logical subscription. Messages arrive on [`next`];
/// dropping the handle unsubscribes.
///
/// [`next`]: StreamSubscription::next
pub struct StreamSubscription {
    rx: mpsc::UnboundedReceiver<StreamMessage>,
    shared: Arc<MuxShared>,
    id: u64,
}

impl StreamSubscription {
    /// Next message, retained replay first. `None` only after the
    /// multiplexer itself is gone.
    pub async fn next(&mut self) -> Option<StreamMessage> {
        self.rx.recv().await
    }

    /// Non-blocking variant of [`next`](Self::next)
    pub fn try_next(&mut self) -> Option<StreamMessage> {
        self.rx.try_recv().ok()
    }
}

impl Drop for StreamSubscription {
    fn drop(&mut self) {
        self.shared.unsubscribe(self.id);
    }
}

/// Fan-out over the single underlying stream connection
pub struct StreamMultiplexer {
    shared: Arc<MuxShared>,
}

impl StreamMultiplexer {
    pub fn new(source: StreamSource, reconnect_delay: Duration) -> Self {
        Self {
            shared: Arc::new(MuxShared {
                source,
                reconnect_delay,
                state: Mutex::new(MuxState {
                    subscribers: HashMap::new(),
                    retained: HashMap::new(),
                    next_id: 0,
                    generation: 0,
                    reader: None,
                    status: ConnectionStatus::Idle,
                }),
            }),
        }
    }

    /// Subscribe to the stream. Must be called within a tokio runtime: the
    /// first subscriber spawns the reader task that owns the connection.
    pub fn subscribe(&self) -> StreamSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.shared.state.lock();

        // replay retained state before any live message
        for kind in MessageKind::REPLAY_ORDER {
            if let Some(msg) = state.retained.get(&kind) {
                let _ = tx.send(msg.clone());
            }
        }

        let id = state.next_id;
        state.next_id += 1;
        state.subscribers.insert(id, tx);

        if state.subscribers.len() == 1 {
            let generation = state.generation;
            let shared = self.shared.clone();
            state.reader = Some(tokio::spawn(run_reader(shared, generation)));
        }
        drop(state);

        StreamSubscription {
            rx,
            shared: self.shared.clone(),
            id,
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.shared.state.lock().status
    }

    pub fn subscriber_count(&self) -> usize {
        self.shared.state.lock().subscribers.len()
    }
}

/// Connection loop for one generation: connect, read, fan out, and on any
/// failure wait out the fixed delay and reconnect - until the generation is
/// retired by the last unsubscribe.
async fn run_reader(shared: Arc<MuxShared>, generation: u64) {
    let mut source = shared.source.clone();
    loop {
        if !shared.is_current(generation) {
            return;
        }
        shared.set_status(generation, ConnectionStatus::Connecting);
        match source.connect().await {
            Ok(()) => {
                shared.set_status(generation, ConnectionStatus::Connected);
                tracing::info!(target: "stream", "stream connected");
                loop {
                    match source.next_message().await {
                        Ok(Some(msg)) => {
                            if !shared.dispatch(generation, msg) {
                                source.close().await;
                                return;
                            }
                        }
                        Ok(None) => {
                            tracing::warn!(target: "stream", "stream closed by peer");
                            break;
                        }
                        Err(e) => {
                            tracing::warn!(target: "stream", error = %e, "stream read failed");
                            break;
                        }
                    }
                }
            }
            Err(e) => {
                tracing::warn!(target: "stream", error = %e, "stream connect failed");
            }
        }
        if !shared.is_current(generation) {
            return;
        }
        shared.set_status(generation, ConnectionStatus::Reconnecting);
        tokio::time::sleep(shared.reconnect_delay).await;
    }
}
