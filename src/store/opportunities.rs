//! Opportunity cache with time-decay eviction
//!
//! Latest-value-wins per (symbol, source, target) route. Entries age from
//! their arrival timestamp; the periodic sweep removes anything past the
//! retention threshold, and the ranked view filters stale entries as well
//! so a consumer never sees one between sweeps.
//!
//! The ranked view is bounded: at most `max_entries` rows, raw premium at
//! least `min_premium_bps`, sorted by descending premium. Rank is
//! recomputed on every materialization - a replaced route does not keep its
//! old position.

use crate::core::{Opportunity, RouteKey};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Ranked view size bound
pub const DEFAULT_MAX_ENTRIES: usize = 50;
/// Minimum raw premium to surface, in basis points
pub const DEFAULT_MIN_PREMIUM_BPS: i64 = 30;
/// Entries older than this are evicted
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(60);

/// One row of the ranked view, with age derived at materialization time
#[derive(Debug, Clone, PartialEq)]
pub struct RankedOpportunity {
    pub opportunity: Opportunity,
    pub age_ms: u64,
}

/// Immutable ranked view handed to consumers
#[derive(Debug, Clone, Default)]
pub struct RankedOpportunities {
    /// Timestamp (epoch ms) the ages were derived against
    pub as_of: u64,
    pub entries: Arc<Vec<RankedOpportunity>>,
}

impl RankedOpportunities {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RankedOpportunity> {
        self.entries.iter()
    }
}

/// Latest-value-wins cache of live arbitrage routes
#[derive(Debug)]
pub struct OpportunityCache {
    routes: HashMap<RouteKey, Opportunity>,
    dirty: bool,
    max_entries: usize,
    min_premium_bps: i64,
    retention: Duration,
}

impl OpportunityCache {
    pub fn new(max_entries: usize, min_premium_bps: i64, retention: Duration) -> Self {
        Self {
            routes: HashMap::new(),
            dirty: false,
            max_entries,
            min_premium_bps,
            retention,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES, DEFAULT_MIN_PREMIUM_BPS, DEFAULT_RETENTION)
    }

    /// Replace the entry for the opportunity's route
    pub fn apply_delta(&mut self, opportunity: Opportunity) {
        self.routes.insert(opportunity.key(), opportunity);
        self.dirty = true;
    }

    /// Clear and repopulate from a full snapshot
    pub fn apply_snapshot(&mut self, opportunities: Vec<Opportunity>) {
        self.routes.clear();
        for opp in opportunities {
            self.routes.insert(opp.key(), opp);
        }
        self.dirty = true;
    }

    /// Mark a republish as due without touching data. The age-refresh timer
    /// calls this so displayed ages advance even when no messages arrive.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// Evict entries older than the retention threshold. Returns how many
    /// were removed; the dirty flag is set when any were.
    pub fn sweep(&mut self, now: u64) -> usize {
        let retention_ms = self.retention.as_millis() as u64;
        let before = self.routes.len();
        self.routes.retain(|_, opp| opp.age_ms(now) <= retention_ms);
        let removed = before - self.routes.len();
        if removed > 0 {
            self.dirty = true;
            tracing::debug!(removed, "swept stale opportunities");
        }
        removed
    }

    /// Materialize the ranked, filtered, size-bounded view
    pub fn ranked_view(&self, now: u64) -> RankedOpportunities {
        let retention_ms = self.retention.as_millis() as u64;
        let mut live: Vec<&Opportunity> = self
            .routes
            .values()
            .filter(|opp| opp.premium_bps >= self.min_premium_bps)
            .filter(|opp| opp.age_ms(now) <= retention_ms)
            .collect();

        live.sort_by(|a, b| {
            b.premium_bps
                .cmp(&a.premium_bps)
                .then_with(|| a.symbol.cmp(&b.symbol))
        });
        live.truncate(self.max_entries);

        let entries = live
            .into_iter()
            .map(|opp| RankedOpportunity {
                age_ms: opp.age_ms(now),
                opportunity: opp.clone(),
            })
            .collect();

        RankedOpportunities {
            as_of: now,
            entries: Arc::new(entries),
        }
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl Default for OpportunityCache {
    fn default() -> Self {
        Self::with_defaults()
    }
}
