use ratecard_core::currency::ExchangeRates;
use ratecard_core::domain::lookup::{Currency, CurrencyCode};

use super::{decimal, optional_text, text, timestamp, CurrencyRepository, RepositoryError};
use crate::DbPool;

pub struct SqlCurrencyRepository {
    pool: DbPool,
}

impl SqlCurrencyRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

pub(crate) async fn fetch_currencies(pool: &DbPool) -> Result<Vec<Currency>, RepositoryError> {
    let rows = sqlx::query(
        "SELECT code, name, symbol, exchange_rate, last_updated FROM currencies ORDER BY code",
    )
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_currency).collect()
}

fn row_to_currency(row: &sqlx::sqlite::SqliteRow) -> Result<Currency, RepositoryError> {
    let last_updated = optional_text(row, "last_updated")?
        .map(|raw| timestamp(&raw, "last_updated"))
        .transpose()?;

    Ok(Currency {
        code: CurrencyCode::new(text(row, "code")?),
        name: text(row, "name")?,
        symbol: text(row, "symbol")?,
        exchange_rate: decimal(row, "exchange_rate")?,
        last_updated,
    })
}

#[async_trait::async_trait]
impl CurrencyRepository for SqlCurrencyRepository {
    async fn list(&self) -> Result<Vec<Currency>, RepositoryError> {
        fetch_currencies(&self.pool).await
    }

    async fn store_rates(&self, rates: &ExchangeRates) -> Result<u64, RepositoryError> {
        let last_updated = rates.last_updated.map(|dt| dt.to_rfc3339());
        let mut tx = self.pool.begin().await?;
        let mut changed = 0;

        for (code, rate) in &rates.rates {
            changed += sqlx::query(
                "UPDATE currencies SET exchange_rate = ?1, last_updated = ?2 WHERE code = ?3",
            )
            .bind(rate.to_string())
            .bind(&last_updated)
            .bind(code.as_str())
            .execute(&mut *tx)
            .await?
            .rows_affected();
        }

        tx.commit().await?;
        Ok(changed)
    }
}
