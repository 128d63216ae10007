use crate::core::error::SourceError;
use crate::core::rate::{RateEntry, RateSource};
use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use tracing::{debug, instrument};

pub const DEFAULT_URL: &str =
    "http://www.bsp.com.pg/International/Exchange-Rates/Exchange-Rates.aspx";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

const TABLE_SELECTOR: &str = "table#exchange_rates";
const COUNTRY_COLUMN: usize = 3;
const CODE_COLUMN: usize = 4;
const RATE_COLUMN: usize = 5;

/// Scrapes the exchange rate table published by Bank South Pacific.
pub struct BspProvider {
    url: String,
    timeout: Duration,
}

impl BspProvider {
    pub fn new(url: &str) -> Self {
        BspProvider {
            url: url.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

fn selector(css: &str) -> Result<Selector, SourceError> {
    Selector::parse(css).map_err(|e| SourceError::Parse(format!("bad selector {css}: {e}")))
}

fn cell_text(cell: &ElementRef) -> String {
    cell.text().collect::<String>().trim().to_string()
}

/// Extracts `(code, country, rate)` rows from the rates page.
///
/// Rows without enough cells are skipped; a rate that is not a number fails
/// the whole page.
pub fn parse_rates_table(html: &str) -> Result<Vec<RateEntry>, SourceError> {
    let document = Html::parse_document(html);
    let table = document
        .select(&selector(TABLE_SELECTOR)?)
        .next()
        .ok_or_else(|| SourceError::Parse("table exchange_rates not found".to_string()))?;
    let body = table
        .select(&selector("tbody")?)
        .next()
        .ok_or_else(|| SourceError::Parse("table exchange_rates has no body".to_string()))?;

    let row_selector = selector("tr")?;
    let cell_selector = selector("td")?;
    let mut entries = Vec::new();

    for (i, row) in body.select(&row_selector).enumerate() {
        let cells: Vec<String> = row.select(&cell_selector).map(|c| cell_text(&c)).collect();
        if cells.len() <= RATE_COLUMN {
            debug!("Skipping row {} with {} cells", i, cells.len());
            continue;
        }

        let raw_rate = &cells[RATE_COLUMN];
        let rate: f64 = raw_rate.replace(',', "").parse().map_err(|_| {
            SourceError::Parse(format!(
                "invalid rate '{raw_rate}' for {}",
                cells[CODE_COLUMN]
            ))
        })?;

        entries.push(RateEntry::new(
            &cells[CODE_COLUMN],
            &cells[COUNTRY_COLUMN],
            rate,
        ));
    }

    if entries.is_empty() {
        return Err(SourceError::Parse(
            "table exchange_rates has no rates".to_string(),
        ));
    }
    Ok(entries)
}

#[async_trait]
impl RateSource for BspProvider {
    #[instrument(name = "BspRateFetch", skip(self), fields(url = %self.url))]
    async fn fetch(&self) -> Result<Vec<RateEntry>, SourceError> {
        debug!("Requesting exchange rates from {}", self.url);
        let request_error = |source| SourceError::Request {
            url: self.url.clone(),
            source,
        };

        let client = reqwest::Client::builder()
            .user_agent("kina/0.1")
            .timeout(self.timeout)
            .build()
            .map_err(request_error)?;

        let response = client
            .get(&self.url)
            .send()
            .await
            .map_err(request_error)?;

        if !response.status().is_success() {
            return Err(SourceError::Status {
                url: self.url.clone(),
                status: response.status(),
            });
        }

        let text = response.text().await.map_err(request_error)?;
        let entries = parse_rates_table(&text)?;
        debug!("Parsed {} exchange rates", entries.len());
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const RATES_PATH: &str = "/International/Exchange-Rates/Exchange-Rates.aspx";

    fn rates_page(rows: &str) -> String {
        format!(
            r#"<html><body>
            <table id="exchange_rates">
              <thead><tr><th></th><th>Date</th><th>Flag</th><th>Country</th><th>Code</th><th>Rate</th></tr></thead>
              <tbody>{rows}</tbody>
            </table>
            </body></html>"#
        )
    }

    fn row(country: &str, code: &str, rate: &str) -> String {
        format!(
            "<tr>\n<td>1</td>\n<td>19/10/2026</td>\n<td><img src=\"flag.png\"/></td>\n<td>{country}</td>\n<td>{code}</td>\n<td>{rate}</td>\n</tr>"
        )
    }

    async fn create_bsp_mock_server(body: &str, status_code: u16) -> MockServer {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(RATES_PATH))
            .respond_with(ResponseTemplate::new(status_code).set_body_string(body))
            .mount(&mock_server)
            .await;
        mock_server
    }

    #[test]
    fn test_parse_rates_table() {
        let html = rates_page(&[
            row("United States", "USD", "0.2551"),
            row(" Japan ", "JPY", "38.12"),
            row("Indonesia", "IDR", "4,012.50"),
        ]
        .concat());

        let entries = parse_rates_table(&html).unwrap();
        assert_eq!(
            entries,
            vec![
                RateEntry::new("usd", "United States", 0.2551),
                RateEntry::new("jpy", "Japan", 38.12),
                RateEntry::new("idr", "Indonesia", 4012.5),
            ]
        );
    }

    #[test]
    fn test_parse_skips_short_rows() {
        let html = rates_page(&format!(
            "<tr><td colspan=\"6\">Rates as at 19/10/2026</td></tr>{}",
            row("Australia", "AUD", "0.3899")
        ));

        let entries = parse_rates_table(&html).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].code, "aud");
    }

    #[test]
    fn test_parse_missing_table() {
        let err = parse_rates_table("<html><body><p>Maintenance</p></body></html>").unwrap_err();
        assert_eq!(
            err.to_string(),
            "unexpected rate table: table exchange_rates not found"
        );
    }

    #[test]
    fn test_parse_empty_table() {
        let err = parse_rates_table(&rates_page("")).unwrap_err();
        assert!(err.to_string().contains("has no rates"));
    }

    #[test]
    fn test_parse_invalid_rate() {
        let html = rates_page(&row("United States", "USD", "n/a"));
        let err = parse_rates_table(&html).unwrap_err();
        assert!(matches!(err, SourceError::Parse(_)));
        assert!(err.to_string().contains("invalid rate 'n/a' for USD"));
    }

    #[tokio::test]
    async fn test_successful_rate_fetch() {
        let body = rates_page(&[
            row("United States", "USD", "0.2551"),
            row("Australia", "AUD", "0.3899"),
        ]
        .concat());
        let mock_server = create_bsp_mock_server(&body, 200).await;

        let provider = BspProvider::new(&format!("{}{RATES_PATH}", mock_server.uri()));
        let entries = provider.fetch().await.unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], RateEntry::new("usd", "United States", 0.2551));
        assert_eq!(entries[1].country, "Australia");
    }

    #[tokio::test]
    async fn test_bsp_server_error_response() {
        let mock_server = create_bsp_mock_server("Server Error", 500).await;

        let url = format!("{}{RATES_PATH}", mock_server.uri());
        let provider = BspProvider::new(&url);
        let err = provider.fetch().await.unwrap_err();

        assert!(matches!(err, SourceError::Status { .. }));
        assert_eq!(
            err.to_string(),
            format!("HTTP error: 500 Internal Server Error from {url}")
        );
    }

    #[tokio::test]
    async fn test_bsp_malformed_page() {
        let mock_server =
            create_bsp_mock_server("<html><body>Under maintenance</body></html>", 200).await;

        let provider = BspProvider::new(&format!("{}{RATES_PATH}", mock_server.uri()));
        let err = provider.fetch().await.unwrap_err();

        assert!(matches!(err, SourceError::Parse(_)));
    }

    #[tokio::test]
    async fn test_bsp_unreachable() {
        let provider = BspProvider::new(&format!("http://127.0.0.1:1{RATES_PATH}"))
            .with_timeout(Duration::from_secs(2));
        let err = provider.fetch().await.unwrap_err();

        assert!(matches!(err, SourceError::Request { .. }));
    }
}
