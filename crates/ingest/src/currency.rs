//! Currency normalization consulted by the merge step.
//!
//! Stored amounts always keep their original currency. A converter only adds
//! USD-normalized companions (`usdPledged`, `usdGoal`) when it knows the rate.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::store::ProjectMap;

pub trait CurrencyConverter: Send + Sync {
    /// `amount` in `currency` expressed in USD, or `None` for unknown codes.
    fn to_usd(&self, amount: f64, currency: &str) -> Option<f64>;
}

/// Built-in USD rates for the currencies the site lists projects in.
const DEFAULT_RATES: &[(&str, f64)] = &[
    ("USD", 1.0),
    ("AUD", 0.65),
    ("CAD", 0.73),
    ("CHF", 1.12),
    ("DKK", 0.145),
    ("EUR", 1.08),
    ("GBP", 1.27),
    ("HKD", 0.128),
    ("JPY", 0.0067),
    ("MXN", 0.055),
    ("NOK", 0.093),
    ("NZD", 0.60),
    ("PLN", 0.25),
    ("SEK", 0.095),
    ("SGD", 0.74),
];

/// A fixed table of `code -> USD per unit`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StaticRates {
    rates: HashMap<String, f64>,
}

impl Default for StaticRates {
    fn default() -> Self {
        Self {
            rates: DEFAULT_RATES
                .iter()
                .map(|(code, rate)| (code.to_string(), *rate))
                .collect(),
        }
    }
}

impl StaticRates {
    /// A table with no rates; every conversion yields `None`.
    pub fn empty() -> Self {
        Self {
            rates: HashMap::new(),
        }
    }

    /// Set or replace the rate for `code`.
    pub fn with_rate(mut self, code: impl Into<String>, usd_per_unit: f64) -> Self {
        self.rates.insert(code.into().to_ascii_uppercase(), usd_per_unit);
        self
    }

    /// Defaults overlaid with `overrides`.
    pub fn with_overrides(overrides: &HashMap<String, f64>) -> Self {
        overrides
            .iter()
            .fold(Self::default(), |rates, (code, rate)| rates.with_rate(code.clone(), *rate))
    }

    pub fn rate(&self, code: &str) -> Option<f64> {
        self.rates.get(&code.to_ascii_uppercase()).copied()
    }
}

impl CurrencyConverter for StaticRates {
    fn to_usd(&self, amount: f64, currency: &str) -> Option<f64> {
        let rate = self.rate(currency)?;
        // Cents precision.
        Some((amount * rate * 100.0).round() / 100.0)
    }
}

/// Distinct currency codes across the store.
pub fn currencies(projects: &ProjectMap) -> BTreeSet<String> {
    projects
        .values()
        .filter_map(|p| p.currency.clone())
        .filter(|code| !code.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pagination::{Edge, Money, ProjectNode};
    use crate::store::merge_batch;
    use chrono::Utc;

    #[test]
    fn test_default_conversion() {
        let rates = StaticRates::default();
        assert_eq!(rates.to_usd(100.0, "USD"), Some(100.0));
        assert_eq!(rates.to_usd(100.0, "eur"), Some(108.0));
        assert_eq!(rates.to_usd(100.0, "XXX"), None);
    }

    #[test]
    fn test_overrides() {
        let overrides = HashMap::from([("eur".to_string(), 2.0), ("XTS".to_string(), 0.5)]);
        let rates = StaticRates::with_overrides(&overrides);
        assert_eq!(rates.to_usd(10.0, "EUR"), Some(20.0));
        assert_eq!(rates.to_usd(10.0, "XTS"), Some(5.0));
        assert_eq!(rates.to_usd(10.0, "GBP"), Some(12.7));
        assert_eq!(StaticRates::empty().to_usd(1.0, "USD"), None);
    }

    #[test]
    fn test_currencies_are_distinct_and_sorted() {
        let edges: Vec<Edge> = [("a", "GBP"), ("b", "EUR"), ("c", "GBP")]
            .into_iter()
            .map(|(id, code)| {
                Edge::new(ProjectNode {
                    id: Some(id.to_string()),
                    currency: Some(code.to_string()),
                    pledged: Some(Money {
                        amount: Some(1.0),
                        currency: Some(code.to_string()),
                    }),
                    ..Default::default()
                })
            })
            .collect();
        let (store, _) = merge_batch(&Default::default(), &edges, Utc::now(), &StaticRates::empty());

        let codes: Vec<String> = currencies(&store).into_iter().collect();
        assert_eq!(codes, vec!["EUR".to_string(), "GBP".to_string()]);
    }
}
