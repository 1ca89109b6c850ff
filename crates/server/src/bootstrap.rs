use std::sync::Arc;
use std::time::Duration;

use ratecard_core::config::{AppConfig, ConfigError, LoadOptions, TableSource};
use ratecard_core::errors::DeliveryError;
use ratecard_core::{
    CurrencyError, ExchangeRates, FallbackLookupSource, LoadedTables, RateBook, RateFeed,
    StaticLookupSource,
};
use ratecard_db::repositories::{
    CurrencyRepository, QuoteRepository, SqlCurrencyRepository, SqlLookupSource,
    SqlQuoteRepository,
};
use ratecard_db::{connect_with_config, migrations, DbPool};
use thiserror::Error;
use tracing::{info, warn};

use crate::mail::{mailer_from_config, QuoteEmailRenderer, QuoteMailer};
use crate::rates::HttpRateFeed;

const MAIL_TIMEOUT: Duration = Duration::from_secs(30);

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub tables: Arc<LoadedTables>,
    pub rate_book: RateBook,
    pub rate_feed: Arc<dyn RateFeed>,
    pub quotes: Arc<dyn QuoteRepository>,
    pub currencies: Arc<dyn CurrencyRepository>,
    pub renderer: Arc<QuoteEmailRenderer>,
    pub mailer: Arc<dyn QuoteMailer>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("mail setup failed: {0}")]
    Mail(#[source] DeliveryError),
    #[error("rate feed setup failed: {0}")]
    RateFeed(#[source] CurrencyError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        table_source = ?config.pricing.table_source,
        mail_transport = ?config.mail.transport,
        "starting application bootstrap"
    );

    let db_pool =
        connect_with_config(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let tables = load_tables(config.pricing.table_source, &db_pool).await;
    let rate_book = RateBook::new(ExchangeRates::from_currencies(
        config.reference_currency(),
        &tables.tables.currencies,
    ));

    let rate_feed = HttpRateFeed::new(
        config.rates.feed_url.clone(),
        Duration::from_secs(config.rates.timeout_secs),
    )
    .map_err(BootstrapError::RateFeed)?;
    let renderer = QuoteEmailRenderer::new(&config.mail, config.pricing.quote_validity_days)
        .map_err(BootstrapError::Mail)?;
    let mailer = mailer_from_config(&config.mail, MAIL_TIMEOUT).map_err(BootstrapError::Mail)?;
    info!(
        event_name = "system.bootstrap.ready",
        correlation_id = "bootstrap",
        mail_transport = mailer.name(),
        reference_currency = %rate_book.reference(),
        "application services initialized"
    );

    Ok(Application {
        quotes: Arc::new(SqlQuoteRepository::new(db_pool.clone())),
        currencies: Arc::new(SqlCurrencyRepository::new(db_pool.clone())),
        config,
        db_pool,
        tables: Arc::new(tables),
        rate_book,
        rate_feed: Arc::new(rate_feed),
        renderer: Arc::new(renderer),
        mailer: Arc::from(mailer),
    })
}

/// Loads lookup tables from the configured source, falling back per table to the
/// built-in rows.
pub async fn load_tables(source: TableSource, pool: &DbPool) -> LoadedTables {
    let loaded = match source {
        TableSource::Database => FallbackLookupSource::new(SqlLookupSource::new(pool.clone())).load().await,
        TableSource::Static => FallbackLookupSource::new(StaticLookupSource::default()).load().await,
    };

    for warning in &loaded.warnings {
        warn!(
            event_name = "system.bootstrap.table_fallback",
            correlation_id = "bootstrap",
            table = %warning.table,
            message = %warning.message,
            "lookup table replaced by built-in rows; run `ratecard seed` to populate it"
        );
    }
    loaded
}
