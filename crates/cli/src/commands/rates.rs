use ratecard_core::tables::defaults;
use ratecard_core::{Currency, ExchangeRates};
use ratecard_db::repositories::{CurrencyRepository, SqlCurrencyRepository};

use crate::commands::{build_runtime, load_config, open_database, CommandFailure, CommandResult};

/// Lists the stored exchange rates. Refreshing them is the server's job.
pub fn run() -> CommandResult {
    let config = match load_config("rates") {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match build_runtime("rates") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let pool = open_database(&config).await?;
        let stored: Result<Vec<Currency>, CommandFailure> = SqlCurrencyRepository::new(pool.clone())
            .list()
            .await
            .map_err(|error| ("currency_query", error.to_string(), 4u8));
        pool.close().await;
        stored
    });

    match result {
        Ok(stored) => {
            let (currencies, from_defaults) =
                if stored.is_empty() { (defaults::currencies(), true) } else { (stored, false) };
            let rates = ExchangeRates::from_currencies(config.reference_currency(), &currencies);
            CommandResult::success_with_data(
                "rates",
                summary(&currencies, &rates, from_defaults),
                serde_json::to_value(&currencies).ok(),
            )
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("rates", error_class, message, exit_code)
        }
    }
}

fn summary(currencies: &[Currency], rates: &ExchangeRates, from_defaults: bool) -> String {
    let updated = rates
        .last_updated
        .map(|at| format!("last updated {}", at.to_rfc3339()))
        .unwrap_or_else(|| "never refreshed".to_string());
    let mut lines = vec![format!(
        "{} currencies against {}, {}{}",
        currencies.len(),
        rates.reference,
        updated,
        if from_defaults { " (built-in defaults; run `ratecard seed`)" } else { "" }
    )];
    lines.extend(currencies.iter().map(|currency| {
        format!("  - {} {}: {}", currency.code, currency.symbol, currency.exchange_rate.normalize())
    }));
    lines.join("\n")
}
