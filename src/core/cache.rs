use crate::core::error::{RateError, Result};
use crate::core::rate::{RateEntry, RateSnapshot, RateSource};
use crate::store::RateStore;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

/// Maximum age of persisted rates: one day.
pub const DEFAULT_STALENESS: Duration = Duration::from_secs(86_400);

/// Locally cached exchange rates, refreshed from a [`RateSource`] once they
/// are older than the staleness threshold.
///
/// Lookups only ever read the in-memory snapshot. The snapshot is replaced
/// as a whole, and only after the new one has been persisted.
pub struct RateCache<S: RateSource> {
    source: S,
    store: Arc<dyn RateStore>,
    threshold: Duration,
    snapshot: RateSnapshot,
    last_refreshed: Option<SystemTime>,
}

impl<S: RateSource> RateCache<S> {
    pub fn new(source: S, store: Arc<dyn RateStore>) -> Self {
        Self {
            source,
            store,
            threshold: DEFAULT_STALENESS,
            snapshot: RateSnapshot::default(),
            last_refreshed: None,
        }
    }

    pub fn with_threshold(mut self, threshold: Duration) -> Self {
        self.threshold = threshold;
        self
    }

    /// Reads persisted rates into memory. A missing or unreadable store leaves
    /// the cache empty so the next [`ensure_fresh`](Self::ensure_fresh) refreshes it.
    pub fn load(&mut self) {
        match self.store.load() {
            Ok(Some(snapshot)) => {
                debug!("Loaded {} cached rates", snapshot.rates.len());
                self.snapshot = snapshot;
                self.last_refreshed = match self.store.last_modified() {
                    Ok(modified) => modified,
                    Err(e) => {
                        warn!(error = %e, "Could not read rate cache modification time");
                        None
                    }
                };
            }
            Ok(None) => debug!("No cached rates found"),
            Err(e) => warn!(error = %e, "Ignoring unreadable rate cache"),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot.is_empty()
    }

    pub fn is_stale(&self) -> Result<bool> {
        if self.snapshot.is_empty() {
            return Ok(true);
        }
        let Some(modified) = self.store.last_modified()? else {
            return Ok(true);
        };
        // A modification time in the future counts as brand new.
        let age = SystemTime::now()
            .duration_since(modified)
            .unwrap_or(Duration::ZERO);
        debug!(age_secs = age.as_secs(), "Checked rate cache age");
        Ok(age > self.threshold)
    }

    /// Refreshes from the source when stale. Returns whether a refresh happened.
    ///
    /// On failure both the persisted and the in-memory rates are left as they were.
    pub async fn ensure_fresh(&mut self) -> Result<bool> {
        if !self.is_stale()? {
            debug!("Rate cache is fresh");
            return Ok(false);
        }

        info!("Refreshing exchange rates");
        let entries = self.source.fetch().await?;
        let snapshot = RateSnapshot::from_entries(entries)?;

        self.store.save(&snapshot)?;
        info!("Saved {} exchange rates", snapshot.rates.len());

        self.snapshot = snapshot;
        self.last_refreshed = match self.store.last_modified() {
            Ok(Some(modified)) => Some(modified),
            Ok(None) => Some(SystemTime::now()),
            Err(e) => {
                warn!(error = %e, "Could not read rate cache modification time");
                Some(SystemTime::now())
            }
        };
        Ok(true)
    }

    pub fn lookup(&self, code: &str) -> Result<RateEntry> {
        let code = code.trim().to_lowercase();
        self.snapshot
            .get(&code)
            .ok_or(RateError::UnknownCode(code))
    }

    /// Converts `amount` of the currency `code` into the base currency.
    pub fn convert(&self, code: &str, amount: f64) -> Result<f64> {
        let entry = self.lookup(code)?;
        Ok(amount / entry.rate)
    }

    /// All known `(code, country)` pairs, ordered by code. Refreshes first when
    /// nothing is cached.
    pub async fn list_codes(&mut self) -> Result<Vec<(String, String)>> {
        if self.snapshot.is_empty() {
            self.ensure_fresh().await?;
        }
        Ok(self
            .snapshot
            .countries
            .iter()
            .map(|(code, country)| (code.clone(), country.clone()))
            .collect())
    }

    pub fn last_refreshed(&self) -> Option<DateTime<Utc>> {
        self.last_refreshed.map(DateTime::<Utc>::from)
    }
}
