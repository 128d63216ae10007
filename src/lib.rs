pub mod cli;
pub mod core;
pub mod providers;
pub mod store;

use crate::core::RateCache;
use crate::core::config::AppConfig;
use crate::providers::BspProvider;
use crate::store::DiskStore;
use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq)]
pub enum AppCommand {
    /// List the known currency codes
    Codes,
    /// Convert an amount of a foreign currency into the base currency
    Convert { code: String, amount: f64 },
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("Kina starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let data_path = config.default_data_path()?;
    debug!("Using rate cache in {}", data_path.display());

    let source = BspProvider::new(&config.provider.url).with_timeout(config.timeout());
    let mut cache = RateCache::new(source, Arc::new(DiskStore::new(data_path)))
        .with_threshold(config.staleness());
    cache.load();

    match command {
        AppCommand::Codes => cli::codes::run(&mut cache).await,
        AppCommand::Convert { code, amount } => {
            cli::convert::run(&mut cache, &code, amount, &config).await
        }
    }
}
