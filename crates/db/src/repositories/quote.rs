use sqlx::Row;

use ratecard_core::domain::lookup::{
    CurrencyCode, DurationId, RegionId, RoleId, SeniorityId, WorkloadId,
};
use ratecard_core::domain::quote::{
    CalculatorType, Contact, QuoteId, QuoteLabels, QuoteRecord, QuoteSelectionIds,
};

use super::{decimal, optional_text, text, timestamp, QuoteRepository, RepositoryError};
use crate::DbPool;

const QUOTE_COLUMNS: &str = "id, calculator_type, contact_email, contact_name, contact_company,
    role_id, seniority_id, region_id, workload_id, duration_id,
    role_label, seniority_label, region_label, workload_label, duration_label,
    currency, reference_currency, base_rate, final_rate, exchange_rate, message, created_at";

pub struct SqlQuoteRepository {
    pool: DbPool,
}

impl SqlQuoteRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_quote(row: &sqlx::sqlite::SqliteRow) -> Result<QuoteRecord, RepositoryError> {
    let id: i64 = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let calculator_type = text(row, "calculator_type")?
        .parse::<CalculatorType>()
        .map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at = timestamp(&text(row, "created_at")?, "created_at")?;

    Ok(QuoteRecord {
        id: Some(QuoteId(id)),
        calculator_type,
        contact: Contact {
            email: text(row, "contact_email")?,
            name: text(row, "contact_name")?,
            company: optional_text(row, "contact_company")?,
        },
        selection: QuoteSelectionIds {
            role_id: RoleId(text(row, "role_id")?),
            seniority_id: SeniorityId(text(row, "seniority_id")?),
            region_id: optional_text(row, "region_id")?.map(RegionId),
            workload_id: optional_text(row, "workload_id")?.map(WorkloadId),
            duration_id: optional_text(row, "duration_id")?.map(DurationId),
        },
        labels: QuoteLabels {
            role: text(row, "role_label")?,
            seniority: text(row, "seniority_label")?,
            region: optional_text(row, "region_label")?,
            workload: optional_text(row, "workload_label")?,
            duration: optional_text(row, "duration_label")?,
        },
        currency: CurrencyCode::new(text(row, "currency")?),
        reference_currency: CurrencyCode::new(text(row, "reference_currency")?),
        base_rate: decimal(row, "base_rate")?,
        final_rate: decimal(row, "final_rate")?,
        exchange_rate: decimal(row, "exchange_rate")?,
        message: optional_text(row, "message")?,
        created_at,
    })
}

#[async_trait::async_trait]
impl QuoteRepository for SqlQuoteRepository {
    async fn insert(&self, quote: &QuoteRecord) -> Result<QuoteId, RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO quotes (calculator_type, contact_email, contact_name, contact_company,
                                 role_id, seniority_id, region_id, workload_id, duration_id,
                                 role_label, seniority_label, region_label, workload_label,
                                 duration_label, currency, reference_currency, base_rate,
                                 final_rate, exchange_rate, message, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(quote.calculator_type.as_str())
        .bind(&quote.contact.email)
        .bind(&quote.contact.name)
        .bind(&quote.contact.company)
        .bind(&quote.selection.role_id.0)
        .bind(&quote.selection.seniority_id.0)
        .bind(quote.selection.region_id.as_ref().map(|id| id.0.as_str()))
        .bind(quote.selection.workload_id.as_ref().map(|id| id.0.as_str()))
        .bind(quote.selection.duration_id.as_ref().map(|id| id.0.as_str()))
        .bind(&quote.labels.role)
        .bind(&quote.labels.seniority)
        .bind(&quote.labels.region)
        .bind(&quote.labels.workload)
        .bind(&quote.labels.duration)
        .bind(quote.currency.as_str())
        .bind(quote.reference_currency.as_str())
        .bind(quote.base_rate.to_string())
        .bind(quote.final_rate.to_string())
        .bind(quote.exchange_rate.to_string())
        .bind(&quote.message)
        .bind(quote.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(QuoteId(result.last_insert_rowid()))
    }

    async fn find_by_id(&self, id: QuoteId) -> Result<Option<QuoteRecord>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {QUOTE_COLUMNS} FROM quotes WHERE id = ?"))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_quote(r)?)),
            None => Ok(None),
        }
    }

    async fn list_recent(&self, limit: u32) -> Result<Vec<QuoteRecord>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {QUOTE_COLUMNS} FROM quotes ORDER BY created_at DESC, id DESC LIMIT ?"
        ))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_quote).collect()
    }
}
