//! Currency-normalized premium computation
//!
//! Everything here is pure: the engine is handed immutable snapshots and
//! returns a matrix. The two normalization modes differ only on KRW legs -
//! tether mode keeps the venue USDT/KRW routing baked into the normalized
//! prices, kimchi mode re-expresses KRW legs against the bank USD/KRW rate.

pub mod engine;
pub mod matrix;
pub mod stablecoin;

pub use engine::PremiumEngine;
pub use matrix::{PremiumCell, PremiumMatrix, ServerPremiumEntry, ServerPremiumMatrix, VenueQuote};
