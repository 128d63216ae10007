pub mod codes;
pub mod convert;
pub mod setup;
pub mod ui;

use crate::core::{RateCache, RateSource};
use anyhow::Result;

/// Runs one freshness check, reporting progress on stderr when a refresh is
/// needed.
pub(crate) async fn refresh_if_stale<S: RateSource>(cache: &mut RateCache<S>) -> Result<bool> {
    if !cache.is_stale()? {
        return Ok(false);
    }

    if let Some(updated) = cache.last_refreshed() {
        eprintln!(
            "{}",
            ui::style_text(
                &format!(
                    "Rates last updated: {}",
                    updated.format("%Y-%m-%d %H:%M:%S UTC")
                ),
                ui::StyleType::Subtle
            )
        );
    }

    let pb = ui::new_spinner("Updating exchange rates...");
    let result = cache.ensure_fresh().await;
    pb.finish_and_clear();
    Ok(result?)
}
