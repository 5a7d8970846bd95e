//! Stream message envelope
//!
//! Every inbound message is `{ "type": <kind>, "data": <payload> }`. The
//! envelope is modeled as an adjacently-tagged serde enum so parsing and
//! dispatch are a single step. Unknown types fail to parse and are dropped
//! by the source without tearing down the connection.

use crate::core::{now_millis, ExchangeRateSnapshot, Opportunity, PriceTick};
use crate::premium::ServerPremiumMatrix;
use serde::{Deserialize, Serialize};

/// Logical message type, one retained slot per kind in the multiplexer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Price,
    PriceSnapshot,
    Opportunity,
    OpportunitySnapshot,
    Stats,
    ExchangeRate,
    CommonMarkets,
    WalletStatus,
}

impl MessageKind {
    /// Replay order for late joiners: full snapshots before deltas, so a new
    /// subscriber never applies a delta to pre-snapshot state.
    pub const REPLAY_ORDER: [MessageKind; 8] = [
        MessageKind::PriceSnapshot,
        MessageKind::Price,
        MessageKind::OpportunitySnapshot,
        MessageKind::Opportunity,
        MessageKind::ExchangeRate,
        MessageKind::Stats,
        MessageKind::CommonMarkets,
        MessageKind::WalletStatus,
    ];
}

/// Parsed inbound message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum StreamMessage {
    /// Single tick delta
    Price(PriceTick),
    /// Full tick snapshot
    Prices(Vec<PriceTick>),
    /// Single opportunity delta
    Opportunity(Opportunity),
    /// Full opportunity snapshot
    Opportunities(Vec<Opportunity>),
    /// Server-computed premium matrix entries
    Stats(ServerPremiumMatrix),
    ExchangeRate(ExchangeRateSnapshot),
    /// Reference data; retained and replayed but not interpreted here
    CommonMarkets(serde_json::Value),
    /// Wallet/deposit status; retained and replayed but not interpreted here
    WalletStatus(serde_json::Value),
}

impl StreamMessage {
    pub fn kind(&self) -> MessageKind {
        match self {
            StreamMessage::Price(_) => MessageKind::Price,
            StreamMessage::Prices(_) => MessageKind::PriceSnapshot,
            StreamMessage::Opportunity(_) => MessageKind::Opportunity,
            StreamMessage::Opportunities(_) => MessageKind::OpportunitySnapshot,
            StreamMessage::Stats(_) => MessageKind::Stats,
            StreamMessage::ExchangeRate(_) => MessageKind::ExchangeRate,
            StreamMessage::CommonMarkets(_) => MessageKind::CommonMarkets,
            StreamMessage::WalletStatus(_) => MessageKind::WalletStatus,
        }
    }

    /// Parse one envelope from wire text
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Stamp arrival timestamps on the carried payloads. Arrival order is
    /// authoritative; timestamps embedded in payloads are never consulted.
    pub fn stamp_arrival(&mut self, now: u64) {
        match self {
            StreamMessage::Price(t) => t.received_at = now,
            StreamMessage::Prices(ticks) => {
                for t in ticks {
                    t.received_at = now;
                }
            }
            StreamMessage::Opportunity(o) => o.received_at = now,
            StreamMessage::Opportunities(opps) => {
                for o in opps {
                    o.received_at = now;
                }
            }
            StreamMessage::ExchangeRate(r) => r.received_at = now,
            StreamMessage::Stats(_)
            | StreamMessage::CommonMarkets(_)
            | StreamMessage::WalletStatus(_) => {}
        }
    }

    /// Parse and stamp in one step, as the sources do on receipt
    pub fn parse_arrived(text: &str) -> Result<Self, serde_json::Error> {
        let mut msg = Self::parse(text)?;
        msg.stamp_arrival(now_millis());
        Ok(msg)
    }
}
