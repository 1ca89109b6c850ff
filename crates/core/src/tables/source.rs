use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::lookup::{
    Currency, DurationOption, Region, Role, SeniorityLevel, WorkloadOption,
};
use crate::errors::LookupError;
use crate::tables::{defaults, LookupTables, TableName};

/// Read-only access to the lookup tables, one query per table.
///
/// Implementations return rows in display order (see `defaults` for the order each
/// table uses).
#[async_trait]
pub trait LookupSource: Send + Sync {
    fn name(&self) -> &'static str;
    async fn regions(&self) -> Result<Vec<Region>, LookupError>;
    async fn roles(&self) -> Result<Vec<Role>, LookupError>;
    async fn seniority_levels(&self) -> Result<Vec<SeniorityLevel>, LookupError>;
    async fn workload_options(&self) -> Result<Vec<WorkloadOption>, LookupError>;
    async fn duration_options(&self) -> Result<Vec<DurationOption>, LookupError>;
    async fn currencies(&self) -> Result<Vec<Currency>, LookupError>;
}

/// Serves a fixed snapshot, the built-in defaults unless told otherwise.
#[derive(Clone, Debug)]
pub struct StaticLookupSource {
    tables: LookupTables,
}

impl StaticLookupSource {
    pub fn new(tables: LookupTables) -> Self {
        Self { tables }
    }
}

impl Default for StaticLookupSource {
    fn default() -> Self {
        Self::new(LookupTables::defaults())
    }
}

#[async_trait]
impl LookupSource for StaticLookupSource {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn regions(&self) -> Result<Vec<Region>, LookupError> {
        Ok(self.tables.regions.clone())
    }

    async fn roles(&self) -> Result<Vec<Role>, LookupError> {
        Ok(self.tables.roles.clone())
    }

    async fn seniority_levels(&self) -> Result<Vec<SeniorityLevel>, LookupError> {
        Ok(self.tables.seniority_levels.clone())
    }

    async fn workload_options(&self) -> Result<Vec<WorkloadOption>, LookupError> {
        Ok(self.tables.workload_options.clone())
    }

    async fn duration_options(&self) -> Result<Vec<DurationOption>, LookupError> {
        Ok(self.tables.duration_options.clone())
    }

    async fn currencies(&self) -> Result<Vec<Currency>, LookupError> {
        Ok(self.tables.currencies.clone())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableWarning {
    pub table: TableName,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadedTables {
    pub tables: LookupTables,
    pub warnings: Vec<TableWarning>,
}

impl LoadedTables {
    pub fn used_fallback(&self, table: TableName) -> bool {
        self.warnings.iter().any(|warning| warning.table == table)
    }
}

/// Loads every table from `primary`, substituting the built-in rows for any table
/// that fails, comes back empty, or breaks a record invariant.
pub struct FallbackLookupSource<P> {
    primary: P,
}

impl<P: LookupSource> FallbackLookupSource<P> {
    pub fn new(primary: P) -> Self {
        Self { primary }
    }

    pub async fn load(&self) -> LoadedTables {
        let source = self.primary.name();
        let mut warnings = Vec::new();

        let regions = resolve(
            TableName::Regions,
            source,
            self.primary.regions().await.and_then(|rows| {
                check(TableName::Regions, rows, |row: &Region| row.validate().map_err(|e| e.to_string()))
            }),
            defaults::regions,
            &mut warnings,
        );
        let roles = resolve(
            TableName::Roles,
            source,
            self.primary.roles().await.and_then(|rows| {
                check(TableName::Roles, rows, |row: &Role| row.validate().map_err(|e| e.to_string()))
            }),
            defaults::roles,
            &mut warnings,
        );
        let seniority_levels = resolve(
            TableName::SeniorityLevels,
            source,
            self.primary.seniority_levels().await.and_then(|rows| {
                check(TableName::SeniorityLevels, rows, |row: &SeniorityLevel| {
                    row.validate().map_err(|e| e.to_string())
                })
            }),
            defaults::seniority_levels,
            &mut warnings,
        );
        let workload_options = resolve(
            TableName::WorkloadOptions,
            source,
            self.primary.workload_options().await.and_then(|rows| {
                check(TableName::WorkloadOptions, rows, |row: &WorkloadOption| {
                    row.validate().map_err(|e| e.to_string())
                })
            }),
            defaults::workload_options,
            &mut warnings,
        );
        let duration_options = resolve(
            TableName::DurationOptions,
            source,
            self.primary.duration_options().await.and_then(|rows| {
                check(TableName::DurationOptions, rows, |row: &DurationOption| {
                    row.validate().map_err(|e| e.to_string())
                })
            }),
            defaults::duration_options,
            &mut warnings,
        );
        let currencies = resolve(
            TableName::Currencies,
            source,
            self.primary.currencies().await.and_then(|rows| {
                check(TableName::Currencies, rows, |row: &Currency| {
                    row.validate().map_err(|e| e.to_string())
                })
            }),
            defaults::currencies,
            &mut warnings,
        );

        LoadedTables {
            tables: LookupTables {
                regions,
                roles,
                seniority_levels,
                workload_options,
                duration_options,
                currencies,
            },
            warnings,
        }
    }
}

fn check<T>(
    table: TableName,
    rows: Vec<T>,
    validate: impl Fn(&T) -> Result<(), String>,
) -> Result<Vec<T>, LookupError> {
    rows.iter()
        .try_for_each(&validate)
        .map_err(|reason| LookupError::Decode { table, reason })?;
    Ok(rows)
}

fn resolve<T>(
    table: TableName,
    source: &str,
    loaded: Result<Vec<T>, LookupError>,
    fallback: fn() -> Vec<T>,
    warnings: &mut Vec<TableWarning>,
) -> Vec<T> {
    let reason = match loaded {
        Ok(rows) if !rows.is_empty() => return rows,
        Ok(_) => format!("{source} source returned no `{table}` rows"),
        Err(error) => error.to_string(),
    };

    warn!(
        event_name = "tables.fallback_applied",
        correlation_id = "tables",
        table = %table,
        source,
        reason = %reason,
        "lookup table unavailable, using built-in rows"
    );
    warnings.push(TableWarning {
        table,
        message: format!("Failed to load {}. Using fallback data.", table.as_str().replace('_', " ")),
    });
    fallback()
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use rust_decimal::Decimal;

    use super::{FallbackLookupSource, LookupSource, StaticLookupSource};
    use crate::domain::lookup::{
        Currency, DurationOption, Region, RegionId, Role, SeniorityLevel, WorkloadOption,
    };
    use crate::errors::LookupError;
    use crate::tables::{LookupTables, TableName};

    /// Serves custom regions, fails roles, returns nothing for currencies.
    struct FlakySource;

    #[async_trait]
    impl LookupSource for FlakySource {
        fn name(&self) -> &'static str {
            "flaky"
        }

        async fn regions(&self) -> Result<Vec<Region>, LookupError> {
            Ok(vec![Region {
                id: RegionId("mars".to_owned()),
                name: "Mars".to_owned(),
                multiplier: Decimal::new(300, 2),
            }])
        }

        async fn roles(&self) -> Result<Vec<Role>, LookupError> {
            Err(LookupError::SourceUnavailable {
                table: TableName::Roles,
                reason: "connection refused".to_owned(),
            })
        }

        async fn seniority_levels(&self) -> Result<Vec<SeniorityLevel>, LookupError> {
            StaticLookupSource::default().seniority_levels().await
        }

        async fn workload_options(&self) -> Result<Vec<WorkloadOption>, LookupError> {
            let mut rows = StaticLookupSource::default().workload_options().await?;
            rows[0].percentage = Decimal::from(150);
            Ok(rows)
        }

        async fn duration_options(&self) -> Result<Vec<DurationOption>, LookupError> {
            StaticLookupSource::default().duration_options().await
        }

        async fn currencies(&self) -> Result<Vec<Currency>, LookupError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn static_source_loads_without_warnings() {
        let loaded = FallbackLookupSource::new(StaticLookupSource::default()).load().await;

        assert!(loaded.warnings.is_empty());
        assert_eq!(loaded.tables, LookupTables::defaults());
    }

    #[tokio::test]
    async fn failing_tables_fall_back_individually() {
        let loaded = FallbackLookupSource::new(FlakySource).load().await;

        assert_eq!(loaded.tables.regions.len(), 1, "healthy table keeps source rows");
        assert!(!loaded.used_fallback(TableName::Regions));

        assert!(loaded.used_fallback(TableName::Roles));
        assert_eq!(loaded.tables.roles.len(), 10);

        assert!(loaded.used_fallback(TableName::Currencies), "empty table falls back");
        assert!(loaded.used_fallback(TableName::WorkloadOptions), "invalid row falls back");
        assert_eq!(loaded.tables.workload_options[0].percentage, Decimal::from(40));

        let roles_warning = loaded
            .warnings
            .iter()
            .find(|warning| warning.table == TableName::Roles)
            .expect("roles warning");
        assert_eq!(roles_warning.message, "Failed to load roles. Using fallback data.");
    }
}
