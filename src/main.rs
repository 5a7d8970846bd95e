//! kimp-core daemon
//!
//! Wires configuration, logging and the sync engine against the configured
//! stream, then logs the ranked opportunity view as it refreshes. The
//! library is the product; this binary is the reference consumer.

use anyhow::Context;
use kimp_core::engine::SyncEngine;
use kimp_core::infrastructure::logging::init_logging;
use kimp_core::premium::PremiumEngine;
use kimp_core::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _guards = init_logging();

    let config = Config::load().context("loading configuration")?;
    let premium = PremiumEngine::new(config.premium.reference_venue);

    let (_bridge, engine) = SyncEngine::from_config(&config).context("building sync engine")?;
    let mut handle = engine.attach();

    tracing::info!(url = %config.stream.url, source = ?config.stream.source, "kimp-core started");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutting down");
                break;
            }
            changed = handle.opportunities.changed() => {
                if changed.is_err() {
                    break;
                }
                let view = handle.opportunities.borrow().clone();
                for row in view.iter().take(5) {
                    tracing::info!(
                        symbol = %row.opportunity.symbol,
                        route = %format!("{} -> {}", row.opportunity.source_exchange, row.opportunity.target_exchange),
                        premium_bps = row.opportunity.premium_bps,
                        age_ms = row.age_ms,
                        "opportunity"
                    );
                }
                let top = view.iter().next();
                if let Some(top) = top {
                    let matrix = handle.matrix_for(&top.opportunity.symbol, &premium);
                    tracing::debug!(
                        symbol = %matrix.symbol,
                        legs = matrix.legs.len(),
                        "premium matrix refreshed"
                    );
                }
            }
        }
    }

    Ok(())
}
