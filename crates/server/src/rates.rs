use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use ratecard_core::currency::MergedRates;
use ratecard_core::{CurrencyCode, CurrencyError, RateBook, RateFeed};
use ratecard_db::repositories::CurrencyRepository;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Rate feed served as `GET {base_url}/{reference}` returning `{"rates": {code: rate}}`.
pub struct HttpRateFeed {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct FeedResponse {
    rates: BTreeMap<String, serde_json::Number>,
}

impl HttpRateFeed {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, CurrencyError> {
        let client = Client::builder().timeout(timeout).build().map_err(|error| {
            CurrencyError::FeedUnavailable(format!("could not build rate feed client: {error}"))
        })?;
        Ok(Self { client, base_url: base_url.into() })
    }

    fn url_for(&self, reference: &CurrencyCode) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), reference)
    }
}

#[async_trait]
impl RateFeed for HttpRateFeed {
    async fn latest(
        &self,
        reference: &CurrencyCode,
    ) -> Result<BTreeMap<CurrencyCode, Decimal>, CurrencyError> {
        let url = self.url_for(reference);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|error| CurrencyError::FeedUnavailable(format!("request to {url} failed: {error}")))?;

        if !response.status().is_success() {
            return Err(CurrencyError::FeedUnavailable(format!(
                "rate feed returned {}",
                response.status()
            )));
        }

        let body = response.text().await.map_err(|error| {
            CurrencyError::FeedUnavailable(format!("could not read rate feed response: {error}"))
        })?;
        parse_feed_body(&body)
    }
}

/// Decodes a feed body. Entries whose value is not a decimal number are skipped.
pub fn parse_feed_body(body: &str) -> Result<BTreeMap<CurrencyCode, Decimal>, CurrencyError> {
    let parsed: FeedResponse = serde_json::from_str(body).map_err(|error| {
        CurrencyError::FeedUnavailable(format!("could not decode rate feed response: {error}"))
    })?;

    let mut rates = BTreeMap::new();
    for (code, value) in parsed.rates {
        let raw = value.to_string();
        match Decimal::from_str(&raw).or_else(|_| Decimal::from_scientific(&raw)) {
            Ok(rate) => {
                rates.insert(CurrencyCode::new(&code), rate);
            }
            Err(error) => {
                debug!(event_name = "rates.feed_value_skipped", code = %code, value = %raw, error = %error);
            }
        }
    }
    Ok(rates)
}

/// Refreshes the shared snapshot and writes the new rates back to the currency table.
///
/// A failed write is logged; the in-memory snapshot is still replaced.
pub async fn refresh_and_persist(
    book: &RateBook,
    feed: &dyn RateFeed,
    tracked: &[CurrencyCode],
    currencies: &dyn CurrencyRepository,
) -> Result<MergedRates, CurrencyError> {
    let merged = book.refresh(feed, tracked, Utc::now()).await?;

    match currencies.store_rates(&merged.rates).await {
        Ok(updated) => debug!(
            event_name = "rates.persisted",
            correlation_id = "rates",
            updated,
            "exchange rates written to currency table"
        ),
        Err(error) => warn!(
            event_name = "rates.persist_failed",
            correlation_id = "rates",
            error = %error,
            "exchange rates could not be stored"
        ),
    }
    Ok(merged)
}

/// Refreshes immediately, then every `interval`, until the task is aborted.
pub fn spawn_refresher(
    book: RateBook,
    feed: Arc<dyn RateFeed>,
    tracked: Vec<CurrencyCode>,
    currencies: Arc<dyn CurrencyRepository>,
    interval: Duration,
) -> JoinHandle<()> {
    info!(
        event_name = "rates.refresher.start",
        correlation_id = "bootstrap",
        interval_secs = interval.as_secs(),
        tracked = tracked.len(),
        "exchange rate refresher started"
    );

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            // Failures are logged inside the refresh and the previous snapshot stays live.
            if let Err(error) =
                refresh_and_persist(&book, feed.as_ref(), &tracked, currencies.as_ref()).await
            {
                debug!(event_name = "rates.refresher.skipped", error = %error);
            }
        }
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::BTreeMap;

    use async_trait::async_trait;
    use ratecard_core::tables::defaults;
    use ratecard_core::{CurrencyCode, CurrencyError, ExchangeRates, RateBook, RateFeed};
    use ratecard_db::repositories::{CurrencyRepository, InMemoryCurrencyRepository};
    use rust_decimal::Decimal;

    use super::{parse_feed_body, refresh_and_persist, HttpRateFeed};

    pub(crate) struct FixedFeed(pub(crate) BTreeMap<CurrencyCode, Decimal>);

    #[async_trait]
    impl RateFeed for FixedFeed {
        async fn latest(
            &self,
            _reference: &CurrencyCode,
        ) -> Result<BTreeMap<CurrencyCode, Decimal>, CurrencyError> {
            Ok(self.0.clone())
        }
    }

    pub(crate) struct DownFeed;

    #[async_trait]
    impl RateFeed for DownFeed {
        async fn latest(
            &self,
            _reference: &CurrencyCode,
        ) -> Result<BTreeMap<CurrencyCode, Decimal>, CurrencyError> {
            Err(CurrencyError::FeedUnavailable("connection refused".to_owned()))
        }
    }

    fn tracked() -> Vec<CurrencyCode> {
        ["AED", "USD", "EUR", "GBP", "PKR"].into_iter().map(CurrencyCode::new).collect()
    }

    #[test]
    fn feed_body_keeps_numeric_rates() {
        let rates = parse_feed_body(
            r#"{"base":"AED","rates":{"AED":1,"USD":0.2723,"eur":0.2511,"JPY":1e2}}"#,
        )
        .expect("valid body");

        assert_eq!(rates.get(&CurrencyCode::new("USD")), Some(&Decimal::new(2723, 4)));
        assert_eq!(rates.get(&CurrencyCode::new("EUR")), Some(&Decimal::new(2511, 4)));
        assert_eq!(rates.get(&CurrencyCode::new("AED")), Some(&Decimal::ONE));
        assert_eq!(rates.get(&CurrencyCode::new("JPY")).map(|rate| rate.normalize()), Some(Decimal::from(100)));
    }

    #[test]
    fn feed_body_without_rates_is_unavailable() {
        let error = parse_feed_body(r#"{"result":"error"}"#).expect_err("no rates");
        assert!(matches!(error, CurrencyError::FeedUnavailable(_)));
    }

    #[test]
    fn feed_url_appends_reference_code() {
        let feed = HttpRateFeed::new("https://rates.example.com/v4/latest/", std::time::Duration::from_secs(5))
            .expect("client");
        assert_eq!(
            feed.url_for(&CurrencyCode::new("AED")),
            "https://rates.example.com/v4/latest/AED"
        );
    }

    #[tokio::test]
    async fn refresh_swaps_snapshot_and_persists() {
        let book = RateBook::new(ExchangeRates::defaults());
        let repo = InMemoryCurrencyRepository::new(defaults::currencies());
        let feed = FixedFeed(BTreeMap::from([
            (CurrencyCode::new("USD"), Decimal::new(2723, 4)),
            (CurrencyCode::new("EUR"), Decimal::new(2511, 4)),
        ]));

        let merged = refresh_and_persist(&book, &feed, &tracked(), &repo).await.expect("refresh");

        assert_eq!(merged.defaulted, vec![CurrencyCode::new("GBP"), CurrencyCode::new("PKR")]);
        assert_eq!(book.snapshot().rate(&CurrencyCode::new("USD")), Some(Decimal::new(2723, 4)));
        let stored = repo.list().await.expect("list");
        let usd = stored.iter().find(|currency| currency.code.as_str() == "USD").expect("USD row");
        assert_eq!(usd.exchange_rate, Decimal::new(2723, 4));
        assert!(usd.last_updated.is_some());
    }

    #[tokio::test]
    async fn feed_outage_keeps_snapshot_and_table() {
        let book = RateBook::new(ExchangeRates::defaults());
        let repo = InMemoryCurrencyRepository::new(defaults::currencies());

        let error = refresh_and_persist(&book, &DownFeed, &tracked(), &repo).await.expect_err("down");

        assert!(matches!(error, CurrencyError::FeedUnavailable(_)));
        assert_eq!(*book.snapshot(), ExchangeRates::defaults());
        assert!(repo.list().await.expect("list").iter().all(|currency| currency.last_updated.is_none()));
    }
}
