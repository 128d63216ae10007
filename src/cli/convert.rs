use super::{refresh_if_stale, ui};
use crate::core::config::AppConfig;
use crate::core::{RateCache, RateSource};
use anyhow::Result;
use tracing::{debug, info};

/// A single conversion into the base currency, ready for display.
#[derive(Debug, Clone, PartialEq)]
pub struct Conversion {
    pub code: String,
    pub country: String,
    pub amount: f64,
    pub rate: f64,
    pub converted: f64,
    pub base_currency: String,
    pub base_currency_name: String,
}

impl Conversion {
    pub fn display(&self) -> String {
        let converted = format!("K{:.2}", self.converted);
        format!(
            "Converting {} ({}) {} to {} ({})\nRate for {} is {}\n{} {}",
            self.amount,
            self.code,
            self.country,
            self.base_currency_name,
            self.base_currency,
            self.code,
            self.rate,
            ui::style_text("The converted amount is:", ui::StyleType::Label),
            ui::style_text(&converted, ui::StyleType::Value)
        )
    }
}

pub async fn run<S: RateSource>(
    cache: &mut RateCache<S>,
    code: &str,
    amount: f64,
    config: &AppConfig,
) -> Result<()> {
    if refresh_if_stale(cache).await? {
        info!("Exchange rates refreshed");
    }

    let entry = cache.lookup(code)?;
    let converted = cache.convert(&entry.code, amount)?;
    debug!(code = %entry.code, rate = entry.rate, converted, "Converted amount");

    let conversion = Conversion {
        code: entry.code,
        country: entry.country,
        amount,
        rate: entry.rate,
        converted,
        base_currency: config.base_currency.clone(),
        base_currency_name: config.base_currency_name.clone(),
    };
    println!("{}", conversion.display());
    Ok(())
}
