use ratecard_core::{
    format_exchange_rate, price_selection, CurrencyCode, ExchangeRates, RateQuote, Selection,
};

use crate::commands::{build_runtime, load_config, load_tables, CommandResult};

/// Prices one selection against the configured tables and the stored exchange rates.
pub fn run(selection: Selection, currency: Option<String>) -> CommandResult {
    let config = match load_config("quote") {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match build_runtime("quote") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let loaded = load_tables(&config).await?;
        let settings = config.pricing_settings();
        let currency = currency
            .as_deref()
            .map(CurrencyCode::new)
            .unwrap_or_else(|| settings.reference_currency.clone());
        let rates = ExchangeRates::from_currencies(
            settings.reference_currency.clone(),
            &loaded.tables.currencies,
        );

        let mut quote = price_selection(&selection, &currency, &loaded.tables, &rates, &settings)
            .map_err(|error| ("pricing", error.to_string(), 7u8))?;
        quote.warnings.extend(loaded.warnings.iter().map(|warning| {
            format!("{} table uses built-in rows: {}", warning.table, warning.message)
        }));
        Ok::<RateQuote, (&'static str, String, u8)>(quote)
    });

    match result {
        Ok(quote) if !quote.computable => CommandResult::failure(
            "quote",
            "incomplete_selection",
            format!("selection is incomplete: missing {}", quote.missing.join(", ")),
            7,
        ),
        Ok(quote) => CommandResult::success_with_data(
            "quote",
            summary(&quote),
            serde_json::to_value(&quote).ok(),
        ),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("quote", error_class, message, exit_code)
        }
    }
}

fn summary(quote: &RateQuote) -> String {
    if quote.currency == quote.reference_currency {
        format!("{} rate: {} per month", quote.calculator_type.label(), quote.formatted_rate)
    } else {
        format!(
            "{} rate: {} per month ({} {} at 1 {} = {} {})",
            quote.calculator_type.label(),
            quote.formatted_rate,
            quote.base_rate.normalize(),
            quote.reference_currency,
            quote.reference_currency,
            format_exchange_rate(quote.exchange_rate),
            quote.currency
        )
    }
}
