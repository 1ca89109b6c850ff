use async_trait::async_trait;
use sqlx::Row;

use ratecard_core::domain::lookup::{
    Currency, DurationId, DurationOption, Region, RegionId, Role, RoleId, SeniorityId,
    SeniorityLevel, WorkloadId, WorkloadOption,
};
use ratecard_core::errors::LookupError;
use ratecard_core::tables::{LookupSource, TableName};

use super::currency::fetch_currencies;
use super::{decimal, optional_text, text, RepositoryError};
use crate::DbPool;

/// Lookup tables read from SQLite, one ordered query per table.
#[derive(Clone)]
pub struct SqlLookupSource {
    pool: DbPool,
}

impl SqlLookupSource {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn lookup_error(table: TableName) -> impl Fn(RepositoryError) -> LookupError {
    move |error| match error {
        RepositoryError::Database(source) => {
            LookupError::SourceUnavailable { table, reason: source.to_string() }
        }
        RepositoryError::Decode(reason) => LookupError::Decode { table, reason },
    }
}

async fn fetch<T>(
    pool: &DbPool,
    table: TableName,
    sql: &str,
    decode: fn(&sqlx::sqlite::SqliteRow) -> Result<T, RepositoryError>,
) -> Result<Vec<T>, LookupError> {
    let rows = sqlx::query(sql)
        .fetch_all(pool)
        .await
        .map_err(|error| lookup_error(table)(error.into()))?;
    rows.iter().map(decode).collect::<Result<Vec<_>, _>>().map_err(lookup_error(table))
}

fn row_to_region(row: &sqlx::sqlite::SqliteRow) -> Result<Region, RepositoryError> {
    Ok(Region {
        id: RegionId(text(row, "id")?),
        name: text(row, "name")?,
        multiplier: decimal(row, "multiplier")?,
    })
}

fn row_to_role(row: &sqlx::sqlite::SqliteRow) -> Result<Role, RepositoryError> {
    Ok(Role {
        id: RoleId(text(row, "id")?),
        name: text(row, "name")?,
        base_rate: decimal(row, "base_rate")?,
        category: optional_text(row, "category")?,
    })
}

fn row_to_seniority(row: &sqlx::sqlite::SqliteRow) -> Result<SeniorityLevel, RepositoryError> {
    Ok(SeniorityLevel {
        id: SeniorityId(text(row, "id")?),
        name: text(row, "name")?,
        multiplier: decimal(row, "multiplier")?,
    })
}

fn row_to_workload(row: &sqlx::sqlite::SqliteRow) -> Result<WorkloadOption, RepositoryError> {
    Ok(WorkloadOption {
        id: WorkloadId(text(row, "id")?),
        label: text(row, "label")?,
        percentage: decimal(row, "percentage")?,
    })
}

fn row_to_duration(row: &sqlx::sqlite::SqliteRow) -> Result<DurationOption, RepositoryError> {
    let months: i64 = row.try_get("months").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let months = u32::try_from(months)
        .map_err(|_| RepositoryError::Decode(format!("column `months` value `{months}` out of range")))?;

    Ok(DurationOption {
        id: DurationId(text(row, "id")?),
        label: text(row, "label")?,
        months,
        discount: decimal(row, "discount")?,
    })
}

#[async_trait]
impl LookupSource for SqlLookupSource {
    fn name(&self) -> &'static str {
        "database"
    }

    async fn regions(&self) -> Result<Vec<Region>, LookupError> {
        fetch(
            &self.pool,
            TableName::Regions,
            "SELECT id, name, multiplier FROM regions ORDER BY name",
            row_to_region,
        )
        .await
    }

    async fn roles(&self) -> Result<Vec<Role>, LookupError> {
        fetch(
            &self.pool,
            TableName::Roles,
            "SELECT id, name, base_rate, category FROM roles ORDER BY name",
            row_to_role,
        )
        .await
    }

    async fn seniority_levels(&self) -> Result<Vec<SeniorityLevel>, LookupError> {
        fetch(
            &self.pool,
            TableName::SeniorityLevels,
            "SELECT id, name, multiplier FROM seniority_levels ORDER BY CAST(multiplier AS REAL), name",
            row_to_seniority,
        )
        .await
    }

    async fn workload_options(&self) -> Result<Vec<WorkloadOption>, LookupError> {
        fetch(
            &self.pool,
            TableName::WorkloadOptions,
            "SELECT id, label, percentage FROM workload_options ORDER BY CAST(percentage AS REAL), label",
            row_to_workload,
        )
        .await
    }

    async fn duration_options(&self) -> Result<Vec<DurationOption>, LookupError> {
        fetch(
            &self.pool,
            TableName::DurationOptions,
            "SELECT id, label, months, discount FROM duration_options ORDER BY months, label",
            row_to_duration,
        )
        .await
    }

    async fn currencies(&self) -> Result<Vec<Currency>, LookupError> {
        fetch_currencies(&self.pool).await.map_err(lookup_error(TableName::Currencies))
    }
}
