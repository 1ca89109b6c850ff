use sqlx::Executor;

use ratecard_core::tables::{LookupSource, LookupTables, TableName};

use crate::connection::DbPool;
use crate::repositories::{RepositoryError, SqlLookupSource};

/// Built-in lookup rows for a fresh database.
///
/// The SQL inserts with `INSERT OR IGNORE`, so loading twice is harmless and rows an
/// operator has edited are not overwritten.
pub struct LookupSeedDataset;

impl LookupSeedDataset {
    pub const SQL: &'static str = include_str!("../../../config/fixtures/lookup_seed.sql");

    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;
        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        let mut row_counts = Vec::with_capacity(TableName::ALL.len());
        for table in TableName::ALL {
            let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(1) FROM {table}"))
                .fetch_one(pool)
                .await?;
            row_counts.push((table, count));
        }

        Ok(SeedResult { row_counts })
    }

    /// Checks that every default row is present and decodes to the built-in value.
    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let source = SqlLookupSource::new(pool.clone());
        let expected = LookupTables::defaults();
        let mut checks = Vec::new();

        checks.push((
            TableName::Regions,
            source.regions().await.map(|rows| contains_all(&rows, &expected.regions)).unwrap_or(false),
        ));
        checks.push((
            TableName::Roles,
            source.roles().await.map(|rows| contains_all(&rows, &expected.roles)).unwrap_or(false),
        ));
        checks.push((
            TableName::SeniorityLevels,
            source
                .seniority_levels()
                .await
                .map(|rows| contains_all(&rows, &expected.seniority_levels))
                .unwrap_or(false),
        ));
        checks.push((
            TableName::WorkloadOptions,
            source
                .workload_options()
                .await
                .map(|rows| contains_all(&rows, &expected.workload_options))
                .unwrap_or(false),
        ));
        checks.push((
            TableName::DurationOptions,
            source
                .duration_options()
                .await
                .map(|rows| contains_all(&rows, &expected.duration_options))
                .unwrap_or(false),
        ));
        // Rates drift after a refresh, so only the rows themselves are checked.
        checks.push((
            TableName::Currencies,
            source
                .currencies()
                .await
                .map(|rows| {
                    expected.currencies.iter().all(|wanted| {
                        rows.iter().any(|row| row.code == wanted.code && row.symbol == wanted.symbol)
                    })
                })
                .unwrap_or(false),
        ));

        let all_present = checks.iter().all(|(_, ok)| *ok);
        Ok(VerificationResult { all_present, checks })
    }
}

fn contains_all<T: PartialEq>(rows: &[T], expected: &[T]) -> bool {
    expected.iter().all(|wanted| rows.contains(wanted))
}

#[derive(Debug)]
pub struct SeedResult {
    pub row_counts: Vec<(TableName, i64)>,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(TableName, bool)>,
}
