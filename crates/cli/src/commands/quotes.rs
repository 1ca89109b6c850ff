use ratecard_core::tables::defaults;
use ratecard_core::{format_currency, QuoteId, QuoteRecord};
use ratecard_db::repositories::{QuoteRepository, SqlQuoteRepository};

use crate::commands::{build_runtime, load_config, open_database, CommandFailure, CommandResult};

pub const DEFAULT_LIMIT: u32 = 20;

/// Lists stored quotes newest first, or shows one quote when `id` is given.
pub fn run(limit: u32, id: Option<i64>) -> CommandResult {
    let config = match load_config("quotes") {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match build_runtime("quotes") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let pool = open_database(&config).await?;
        let repository = SqlQuoteRepository::new(pool.clone());
        let found: Result<Vec<QuoteRecord>, CommandFailure> = match id {
            Some(id) => match repository.find_by_id(QuoteId(id)).await {
                Ok(Some(record)) => Ok(vec![record]),
                Ok(None) => Err(("quote_not_found", format!("no stored quote with id {id}"), 8u8)),
                Err(error) => Err(("quote_query", error.to_string(), 4u8)),
            },
            None => repository
                .list_recent(limit)
                .await
                .map_err(|error| ("quote_query", error.to_string(), 4u8)),
        };
        pool.close().await;
        found
    });

    match result {
        Ok(records) => CommandResult::success_with_data(
            "quotes",
            summary(&records),
            serde_json::to_value(&records).ok(),
        ),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("quotes", error_class, message, exit_code)
        }
    }
}

fn summary(records: &[QuoteRecord]) -> String {
    let currencies = defaults::currencies();
    let mut lines = vec![format!("{} stored quotes", records.len())];
    lines.extend(records.iter().map(|record| {
        let id = record.id.map(|id| format!("#{}", id.0)).unwrap_or_else(|| "#?".to_string());
        format!(
            "  - {id} {} {}, {} {}: {} per month for {}",
            record.created_at.format("%Y-%m-%d"),
            record.calculator_type.label(),
            record.labels.seniority,
            record.labels.role,
            format_currency(record.final_rate, &record.currency, &currencies),
            record.contact.email
        )
    }));
    lines.join("\n")
}
