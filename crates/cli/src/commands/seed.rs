use ratecard_db::LookupSeedDataset;

use crate::commands::{build_runtime, load_config, open_database, CommandResult};

pub fn run() -> CommandResult {
    let config = match load_config("seed") {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match build_runtime("seed") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let pool = open_database(&config).await?;

        let seed_result = LookupSeedDataset::load(&pool)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;
        let verification = LookupSeedDataset::verify(&pool)
            .await
            .map_err(|error| ("seed_verification", error.to_string(), 6u8))?;

        let run_result = if verification.all_present {
            Ok(seed_result.row_counts)
        } else {
            let failed = verification
                .checks
                .iter()
                .filter_map(|(table, passed)| (!passed).then(|| table.to_string()))
                .collect::<Vec<_>>();
            Err(("seed_verification", verification_message(&failed), 6u8))
        };

        pool.close().await;
        run_result
    });

    match result {
        Ok(row_counts) => {
            let lines: Vec<String> =
                row_counts.iter().map(|(table, count)| format!("  - {table}: {count} rows")).collect();
            CommandResult::success(
                "seed",
                format!("lookup tables seeded with the built-in rows:\n{}", lines.join("\n")),
            )
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}

/// Rows edited by an operator are kept by the seed, so they show up here.
fn verification_message(failed_tables: &[String]) -> String {
    if failed_tables.is_empty() {
        "some lookup rows failed to load".to_string()
    } else {
        format!(
            "seed verification failed for tables: {} (edited rows are never overwritten)",
            failed_tables.join(", ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::verification_message;

    #[test]
    fn verification_message_names_failed_tables() {
        let failed = vec!["roles".to_string(), "currencies".to_string()];

        assert_eq!(
            verification_message(&failed),
            "seed verification failed for tables: roles, currencies (edited rows are never overwritten)"
        );
    }

    #[test]
    fn verification_message_falls_back_to_generic_text() {
        assert_eq!(verification_message(&[]), "some lookup rows failed to load");
    }
}
