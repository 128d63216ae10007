//! Exchange rate abstractions and core types

use crate::core::error::SourceError;
use async_trait::async_trait;
use std::collections::{BTreeMap, btree_map::Entry};

/// A single row of the published rate table.
///
/// `rate` is expressed in units of the foreign currency per one unit of the
/// base currency.
#[derive(Debug, Clone, PartialEq)]
pub struct RateEntry {
    pub code: String,
    pub country: String,
    pub rate: f64,
}

impl RateEntry {
    pub fn new(code: &str, country: &str, rate: f64) -> Self {
        Self {
            code: code.trim().to_lowercase(),
            country: country.trim().to_string(),
            rate,
        }
    }
}

#[async_trait]
pub trait RateSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<RateEntry>, SourceError>;
}

/// The two parallel mappings keyed by lowercase currency code.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RateSnapshot {
    pub rates: BTreeMap<String, f64>,
    pub countries: BTreeMap<String, String>,
}

/// Checks a single code/rate pair: the code must be non-empty lowercase with
/// no surrounding whitespace, the rate finite and positive.
pub fn check_entry(code: &str, rate: f64) -> Result<(), String> {
    if code.is_empty() {
        return Err("blank currency code".to_string());
    }
    if code != code.trim().to_lowercase() {
        return Err(format!("currency code '{code}' is not normalized"));
    }
    if !(rate.is_finite() && rate > 0.0) {
        return Err(format!("invalid rate {rate} for {code}"));
    }
    Ok(())
}

impl RateSnapshot {
    /// Builds a snapshot from fetched entries, rejecting blank or duplicate
    /// codes, non-positive rates and an empty list.
    pub fn from_entries(entries: Vec<RateEntry>) -> Result<Self, SourceError> {
        if entries.is_empty() {
            return Err(SourceError::Parse("no rates found".to_string()));
        }

        let mut snapshot = Self::default();
        for entry in entries {
            let code = entry.code.trim().to_lowercase();
            check_entry(&code, entry.rate).map_err(|reason| {
                SourceError::Parse(format!("{reason} ({})", entry.country))
            })?;
            match snapshot.rates.entry(code.clone()) {
                Entry::Occupied(_) => {
                    return Err(SourceError::Parse(format!(
                        "duplicate currency code: {code}"
                    )));
                }
                Entry::Vacant(slot) => {
                    slot.insert(entry.rate);
                }
            }
            snapshot.countries.insert(code, entry.country);
        }
        Ok(snapshot)
    }

    /// Checks every entry of an already built snapshot, e.g. one read back
    /// from storage.
    pub fn validate(&self) -> Result<(), String> {
        if !self.is_consistent() {
            return Err("rate and country codes disagree".to_string());
        }
        self.rates
            .iter()
            .try_for_each(|(code, rate)| check_entry(code, *rate))
    }

    pub fn is_empty(&self) -> bool {
        self.countries.is_empty()
    }

    pub fn is_consistent(&self) -> bool {
        self.rates.len() == self.countries.len()
            && self.rates.keys().all(|code| self.countries.contains_key(code))
    }

    pub fn get(&self, code: &str) -> Option<RateEntry> {
        let country = self.countries.get(code)?;
        let rate = self.rates.get(code)?;
        Some(RateEntry {
            code: code.to_string(),
            country: country.clone(),
            rate: *rate,
        })
    }
}
