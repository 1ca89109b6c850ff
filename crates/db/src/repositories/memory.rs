use std::collections::BTreeMap;

use tokio::sync::RwLock;

use ratecard_core::currency::ExchangeRates;
use ratecard_core::domain::lookup::{Currency, CurrencyCode};
use ratecard_core::domain::quote::{QuoteId, QuoteRecord};

use super::{CurrencyRepository, QuoteRepository, RepositoryError};

#[derive(Default)]
pub struct InMemoryQuoteRepository {
    quotes: RwLock<BTreeMap<i64, QuoteRecord>>,
}

#[async_trait::async_trait]
impl QuoteRepository for InMemoryQuoteRepository {
    async fn insert(&self, quote: &QuoteRecord) -> Result<QuoteId, RepositoryError> {
        let mut quotes = self.quotes.write().await;
        let id = QuoteId(quotes.keys().next_back().map_or(1, |last| last + 1));
        quotes.insert(id.0, quote.clone().with_id(id));
        Ok(id)
    }

    async fn find_by_id(&self, id: QuoteId) -> Result<Option<QuoteRecord>, RepositoryError> {
        let quotes = self.quotes.read().await;
        Ok(quotes.get(&id.0).cloned())
    }

    async fn list_recent(&self, limit: u32) -> Result<Vec<QuoteRecord>, RepositoryError> {
        let quotes = self.quotes.read().await;
        let mut recent: Vec<_> = quotes.values().cloned().collect();
        recent.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        recent.truncate(limit as usize);
        Ok(recent)
    }
}

pub struct InMemoryCurrencyRepository {
    currencies: RwLock<BTreeMap<CurrencyCode, Currency>>,
}

impl InMemoryCurrencyRepository {
    pub fn new(currencies: Vec<Currency>) -> Self {
        Self {
            currencies: RwLock::new(
                currencies.into_iter().map(|currency| (currency.code.clone(), currency)).collect(),
            ),
        }
    }
}

#[async_trait::async_trait]
impl CurrencyRepository for InMemoryCurrencyRepository {
    async fn list(&self) -> Result<Vec<Currency>, RepositoryError> {
        let currencies = self.currencies.read().await;
        Ok(currencies.values().cloned().collect())
    }

    async fn store_rates(&self, rates: &ExchangeRates) -> Result<u64, RepositoryError> {
        let mut currencies = self.currencies.write().await;
        let mut changed = 0;
        for (code, rate) in &rates.rates {
            if let Some(currency) = currencies.get_mut(code) {
                currency.exchange_rate = *rate;
                currency.last_updated = rates.last_updated;
                changed += 1;
            }
        }
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use ratecard_core::currency::ExchangeRates;
    use ratecard_core::domain::lookup::CurrencyCode;
    use ratecard_core::domain::quote::{
        CalculatorType, Contact, QuoteId, QuoteLabels, QuoteRecord, QuoteSelectionIds,
    };
    use ratecard_core::domain::lookup::{RegionId, RoleId, SeniorityId};
    use ratecard_core::tables::defaults;

    use crate::repositories::{
        CurrencyRepository, InMemoryCurrencyRepository, InMemoryQuoteRepository, QuoteRepository,
    };

    fn quote() -> QuoteRecord {
        QuoteRecord {
            id: None,
            calculator_type: CalculatorType::CustomResource,
            contact: Contact {
                email: "jane@example.com".to_string(),
                name: "Jane".to_string(),
                company: None,
            },
            selection: QuoteSelectionIds {
                role_id: RoleId("full-stack-developer".to_string()),
                seniority_id: SeniorityId("advanced".to_string()),
                region_id: Some(RegionId("middle-east".to_string())),
                workload_id: None,
                duration_id: None,
            },
            labels: QuoteLabels {
                role: "Full Stack Developer".to_string(),
                seniority: "Advanced".to_string(),
                region: Some("Middle East".to_string()),
                workload: None,
                duration: None,
            },
            currency: CurrencyCode::new("AED"),
            reference_currency: CurrencyCode::new("AED"),
            base_rate: Decimal::from(14_375),
            final_rate: Decimal::from(14_375),
            exchange_rate: Decimal::ONE,
            message: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn in_memory_quote_repo_assigns_sequential_ids() {
        let repo = InMemoryQuoteRepository::default();

        let first = repo.insert(&quote()).await.expect("insert");
        let second = repo.insert(&quote()).await.expect("insert");
        assert_eq!((first, second), (QuoteId(1), QuoteId(2)));

        let found = repo.find_by_id(second).await.expect("find").expect("present");
        assert_eq!(found.id, Some(second));
    }

    #[tokio::test]
    async fn in_memory_currency_repo_updates_known_codes() {
        let repo = InMemoryCurrencyRepository::new(defaults::currencies());
        let mut rates = ExchangeRates::new(CurrencyCode::new("AED"))
            .with_rate(CurrencyCode::new("EUR"), Decimal::new(24, 2))
            .expect("positive");
        rates.last_updated = Some(Utc::now());

        assert_eq!(repo.store_rates(&rates).await.expect("store"), 1);
        let eur = repo
            .list()
            .await
            .expect("list")
            .into_iter()
            .find(|currency| currency.code.as_str() == "EUR")
            .expect("EUR");
        assert_eq!(eur.exchange_rate, Decimal::new(24, 2));
        assert!(eur.last_updated.is_some());
    }
}
