use std::collections::BTreeMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::currency::ExchangeRates;
use crate::domain::lookup::CurrencyCode;
use crate::errors::CurrencyError;
use crate::tables::defaults;

/// Source of live rates, keyed by code, relative to `reference`.
#[async_trait]
pub trait RateFeed: Send + Sync {
    async fn latest(
        &self,
        reference: &CurrencyCode,
    ) -> Result<BTreeMap<CurrencyCode, Decimal>, CurrencyError>;
}

/// Shared handle to the current rate snapshot.
///
/// Readers take an `Arc` to whatever snapshot is current and keep it for the whole
/// calculation; a refresh swaps in a complete new snapshot and never edits one in place.
#[derive(Clone, Debug)]
pub struct RateBook {
    current: Arc<ArcSwap<ExchangeRates>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MergedRates {
    pub rates: ExchangeRates,
    /// Tracked codes the feed omitted that were filled from the default rates.
    pub defaulted: Vec<CurrencyCode>,
    /// Tracked codes neither the feed nor the defaults know.
    pub dropped: Vec<CurrencyCode>,
}

impl RateBook {
    pub fn new(initial: ExchangeRates) -> Self {
        Self { current: Arc::new(ArcSwap::from_pointee(initial)) }
    }

    pub fn snapshot(&self) -> Arc<ExchangeRates> {
        self.current.load_full()
    }

    pub fn reference(&self) -> CurrencyCode {
        self.current.load().reference.clone()
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.current.load().last_updated
    }

    pub fn replace(&self, rates: ExchangeRates) {
        self.current.store(Arc::new(rates));
    }

    /// Fetches from `feed`, merges with the defaults and swaps the result in.
    ///
    /// On a feed failure the current snapshot stays in place and the error is returned.
    pub async fn refresh(
        &self,
        feed: &dyn RateFeed,
        tracked: &[CurrencyCode],
        fetched_at: DateTime<Utc>,
    ) -> Result<MergedRates, CurrencyError> {
        let reference = self.reference();
        let fetched = match feed.latest(&reference).await {
            Ok(fetched) => fetched,
            Err(error) => {
                warn!(
                    event_name = "rates.refresh_failed",
                    correlation_id = "rates",
                    reference = %reference,
                    error = %error,
                    "rate feed unavailable, keeping current snapshot"
                );
                return Err(error);
            }
        };

        let merged = merge_feed_rates(reference, tracked, &fetched, fetched_at);
        if !merged.defaulted.is_empty() {
            warn!(
                event_name = "rates.defaults_applied",
                correlation_id = "rates",
                currencies = ?merged.defaulted,
                "rate feed omitted tracked currencies, using default rates"
            );
        }
        self.replace(merged.rates.clone());
        info!(
            event_name = "rates.refreshed",
            correlation_id = "rates",
            currencies = merged.rates.rates.len(),
            "exchange rate snapshot replaced"
        );
        Ok(merged)
    }
}

/// Builds a snapshot for `tracked` from feed output, filling gaps per code from the
/// default rates. Non-positive feed values count as gaps.
pub fn merge_feed_rates(
    reference: CurrencyCode,
    tracked: &[CurrencyCode],
    fetched: &BTreeMap<CurrencyCode, Decimal>,
    fetched_at: DateTime<Utc>,
) -> MergedRates {
    let mut rates = ExchangeRates::new(reference);
    rates.last_updated = Some(fetched_at);
    let mut defaulted = Vec::new();
    let mut dropped = Vec::new();

    for code in tracked {
        if code == &rates.reference {
            rates.rates.insert(code.clone(), Decimal::ONE);
            continue;
        }
        match fetched.get(code).copied().filter(|rate| *rate > Decimal::ZERO) {
            Some(rate) => {
                rates.rates.insert(code.clone(), rate);
            }
            None => match defaults::default_rate(code) {
                Some(rate) => {
                    rates.rates.insert(code.clone(), rate);
                    defaulted.push(code.clone());
                }
                None => dropped.push(code.clone()),
            },
        }
    }

    MergedRates { rates, defaulted, dropped }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use async_trait::async_trait;
    use chrono::Utc;
    use rust_decimal::Decimal;

    use super::{merge_feed_rates, RateBook, RateFeed};
    use crate::currency::ExchangeRates;
    use crate::domain::lookup::CurrencyCode;
    use crate::errors::CurrencyError;

    fn codes(values: &[&str]) -> Vec<CurrencyCode> {
        values.iter().map(CurrencyCode::new).collect()
    }

    struct FixedFeed(BTreeMap<CurrencyCode, Decimal>);

    #[async_trait]
    impl RateFeed for FixedFeed {
        async fn latest(
            &self,
            _reference: &CurrencyCode,
        ) -> Result<BTreeMap<CurrencyCode, Decimal>, CurrencyError> {
            Ok(self.0.clone())
        }
    }

    struct DownFeed;

    #[async_trait]
    impl RateFeed for DownFeed {
        async fn latest(
            &self,
            _reference: &CurrencyCode,
        ) -> Result<BTreeMap<CurrencyCode, Decimal>, CurrencyError> {
            Err(CurrencyError::FeedUnavailable("connection reset".to_owned()))
        }
    }

    #[test]
    fn merge_keeps_feed_values_and_fills_gaps_per_code() {
        let fetched = BTreeMap::from([
            (CurrencyCode::new("USD"), Decimal::new(2723, 4)),
            (CurrencyCode::new("EUR"), Decimal::ZERO),
            (CurrencyCode::new("JPY"), Decimal::new(4050, 2)),
        ]);

        let merged = merge_feed_rates(
            CurrencyCode::new("AED"),
            &codes(&["AED", "USD", "EUR", "GBP", "XYZ"]),
            &fetched,
            Utc::now(),
        );

        assert_eq!(merged.rates.rate(&CurrencyCode::new("USD")), Some(Decimal::new(2723, 4)));
        assert_eq!(merged.rates.rate(&CurrencyCode::new("EUR")), Some(Decimal::new(25, 2)));
        assert_eq!(merged.rates.rate(&CurrencyCode::new("GBP")), Some(Decimal::new(21, 2)));
        assert_eq!(merged.rates.rate(&CurrencyCode::new("JPY")), None, "untracked codes are ignored");
        assert_eq!(merged.defaulted, codes(&["EUR", "GBP"]));
        assert_eq!(merged.dropped, codes(&["XYZ"]));
    }

    #[tokio::test]
    async fn refresh_swaps_the_snapshot_readers_already_hold_stays_intact() {
        let book = RateBook::new(ExchangeRates::defaults());
        let before = book.snapshot();

        let feed = FixedFeed(BTreeMap::from([(CurrencyCode::new("USD"), Decimal::new(30, 2))]));
        let merged = book
            .refresh(&feed, &codes(&["AED", "USD"]), Utc::now())
            .await
            .expect("feed is up");

        assert!(merged.defaulted.is_empty());
        assert_eq!(book.snapshot().rate(&CurrencyCode::new("USD")), Some(Decimal::new(30, 2)));
        assert_eq!(before.rate(&CurrencyCode::new("USD")), Some(Decimal::new(27, 2)));
        assert!(book.last_updated().is_some());
    }

    #[tokio::test]
    async fn failed_refresh_keeps_the_current_snapshot() {
        let book = RateBook::new(ExchangeRates::defaults());

        let error = book
            .refresh(&DownFeed, &codes(&["AED", "USD"]), Utc::now())
            .await
            .expect_err("feed is down");

        assert!(matches!(error, CurrencyError::FeedUnavailable(_)));
        assert_eq!(*book.snapshot(), ExchangeRates::defaults());
    }
}
