use anyhow::Result;
use recall_sync::ChangeOutcome;

use super::check::{self, CheckSettings};
use super::clean;
use crate::config::AppConfig;

/// Check for a new archive; clean the configured dataset only when it changed.
pub async fn run(settings: &CheckSettings, config: &AppConfig) -> Result<ChangeOutcome> {
    let outcome = check::run(settings).await?;

    if outcome.is_changed() {
        let input = config.dataset_path(&settings.destination);
        let options = config.clean.to_options(&settings.destination)?;
        clean::run(&input, &options)?;
    } else {
        tracing::info!("dataset not changed, skipping clean");
    }

    Ok(outcome)
}
