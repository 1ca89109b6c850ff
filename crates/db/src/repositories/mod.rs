use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::Row;
use thiserror::Error;

use ratecard_core::currency::ExchangeRates;
use ratecard_core::domain::lookup::Currency;
use ratecard_core::domain::quote::{QuoteId, QuoteRecord};

pub mod currency;
pub mod lookup;
pub mod memory;
pub mod quote;

pub use currency::SqlCurrencyRepository;
pub use lookup::SqlLookupSource;
pub use memory::{InMemoryCurrencyRepository, InMemoryQuoteRepository};
pub use quote::SqlQuoteRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

#[async_trait]
pub trait QuoteRepository: Send + Sync {
    /// Inserts a new quote and returns the identifier the store assigned.
    async fn insert(&self, quote: &QuoteRecord) -> Result<QuoteId, RepositoryError>;
    async fn find_by_id(&self, id: QuoteId) -> Result<Option<QuoteRecord>, RepositoryError>;
    async fn list_recent(&self, limit: u32) -> Result<Vec<QuoteRecord>, RepositoryError>;
}

#[async_trait]
pub trait CurrencyRepository: Send + Sync {
    async fn list(&self) -> Result<Vec<Currency>, RepositoryError>;
    /// Writes each rate with the snapshot timestamp. Codes without a row are skipped;
    /// returns how many rows changed.
    async fn store_rates(&self, rates: &ExchangeRates) -> Result<u64, RepositoryError>;
}

pub(crate) fn text(row: &sqlx::sqlite::SqliteRow, column: &str) -> Result<String, RepositoryError> {
    row.try_get(column).map_err(|e| RepositoryError::Decode(e.to_string()))
}

pub(crate) fn optional_text(
    row: &sqlx::sqlite::SqliteRow,
    column: &str,
) -> Result<Option<String>, RepositoryError> {
    row.try_get(column).map_err(|e| RepositoryError::Decode(e.to_string()))
}

pub(crate) fn decimal(row: &sqlx::sqlite::SqliteRow, column: &str) -> Result<Decimal, RepositoryError> {
    let raw = text(row, column)?;
    Decimal::from_str(raw.trim())
        .map_err(|e| RepositoryError::Decode(format!("column `{column}` value `{raw}`: {e}")))
}

pub(crate) fn timestamp(raw: &str, column: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("column `{column}` value `{raw}`: {e}")))
}
