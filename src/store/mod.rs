//! Latest-value stores with bounded snapshot publication

pub mod opportunities;
pub mod ticks;

pub use opportunities::{OpportunityCache, RankedOpportunities, RankedOpportunity};
pub use ticks::{TickSnapshot, TickStore};
