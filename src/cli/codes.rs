use super::ui;
use crate::core::{RateCache, RateSource};
use anyhow::Result;
use comfy_table::Cell;
use tracing::debug;

/// Renders the known currency codes as a table.
pub fn display_codes(codes: &[(String, String)]) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![ui::header_cell("Code"), ui::header_cell("Country")]);

    for (code, country) in codes {
        table.add_row(vec![Cell::new(code), Cell::new(country)]);
    }

    format!(
        "{}\n\n{}",
        ui::style_text("Currency codes", ui::StyleType::Title),
        table
    )
}

pub async fn run<S: RateSource>(cache: &mut RateCache<S>) -> Result<()> {
    let codes = if cache.is_empty() {
        let pb = ui::new_spinner("Fetching exchange rates...");
        let codes = cache.list_codes().await;
        pb.finish_and_clear();
        codes?
    } else {
        cache.list_codes().await?
    };
    debug!("Listing {} currency codes", codes.len());

    println!("{}", display_codes(&codes));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_codes() {
        let codes = vec![
            ("aud".to_string(), "Australia".to_string()),
            ("usd".to_string(), "United States".to_string()),
        ];

        let output = display_codes(&codes);
        assert!(output.contains("Currency codes"));
        assert!(output.contains("aud"));
        assert!(output.contains("United States"));
        assert!(output.find("aud").unwrap() < output.find("usd").unwrap());
    }
}
