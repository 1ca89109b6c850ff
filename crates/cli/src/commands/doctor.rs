use ratecard_core::config::{AppConfig, LoadOptions, MailTransport, TableSource};
use ratecard_core::ExchangeRates;
use serde::Serialize;

use crate::commands::{load_tables, open_database};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Warn,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> String {
    let report = build_report();

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
    }

    render_human(&report)
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_mail_transport(&config));
            checks.extend(check_database(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["mail_transport", "database_connectivity", "lookup_tables", "exchange_rates"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    summarize(checks)
}

fn summarize(checks: Vec<DoctorCheck>) -> DoctorReport {
    let failed = checks.iter().any(|check| check.status == CheckStatus::Fail);
    let warned = checks.iter().any(|check| check.status != CheckStatus::Pass);
    let (overall_status, summary) = if failed {
        (CheckStatus::Fail, "doctor: one or more readiness checks failed")
    } else if warned {
        (CheckStatus::Warn, "doctor: ready, with fallbacks in use")
    } else {
        (CheckStatus::Pass, "doctor: all readiness checks passed")
    };

    DoctorReport { overall_status, summary: summary.to_string(), checks }
}

fn check_mail_transport(config: &AppConfig) -> DoctorCheck {
    let details = match (config.mail.transport, &config.mail.relay_url, &config.mail.smtp_host) {
        (MailTransport::Http, Some(url), _) => format!("Http transport via {url}"),
        (MailTransport::Smtp, _, Some(host)) => {
            format!("Smtp transport via {host}:{}", config.mail.smtp_port)
        }
        (transport, _, _) => format!("{transport:?} transport"),
    };
    DoctorCheck { name: "mail_transport", status: CheckStatus::Pass, details }
}

fn check_database(config: &AppConfig) -> Vec<DoctorCheck> {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return vec![DoctorCheck {
                name: "database_connectivity",
                status: CheckStatus::Fail,
                details: format!("failed to initialize async runtime: {error}"),
            }];
        }
    };

    runtime.block_on(async {
        let connectivity = match open_database(config).await {
            Ok(pool) => {
                pool.close().await;
                DoctorCheck {
                    name: "database_connectivity",
                    status: CheckStatus::Pass,
                    details: format!("connected and migrated using `{}`", config.database.url),
                }
            }
            Err((_, message, _)) => {
                return vec![DoctorCheck {
                    name: "database_connectivity",
                    status: CheckStatus::Fail,
                    details: message,
                }];
            }
        };

        let loaded = match load_tables(config).await {
            Ok(loaded) => loaded,
            Err((_, message, _)) => {
                return vec![
                    connectivity,
                    DoctorCheck { name: "lookup_tables", status: CheckStatus::Fail, details: message },
                ];
            }
        };

        let tables = if loaded.warnings.is_empty() {
            let source = match config.pricing.table_source {
                TableSource::Database => "database",
                TableSource::Static => "built-in static rows",
            };
            DoctorCheck {
                name: "lookup_tables",
                status: CheckStatus::Pass,
                details: format!("all tables loaded from {source}"),
            }
        } else {
            let names =
                loaded.warnings.iter().map(|warning| warning.table.to_string()).collect::<Vec<_>>();
            DoctorCheck {
                name: "lookup_tables",
                status: CheckStatus::Warn,
                details: format!(
                    "built-in rows used for {}; run `ratecard seed`",
                    names.join(", ")
                ),
            }
        };

        let rates =
            ExchangeRates::from_currencies(config.reference_currency(), &loaded.tables.currencies);
        let exchange_rates = match rates.last_updated {
            Some(updated) => DoctorCheck {
                name: "exchange_rates",
                status: CheckStatus::Pass,
                details: format!("{} rates, last updated {}", rates.rates.len(), updated.to_rfc3339()),
            },
            None => DoctorCheck {
                name: "exchange_rates",
                status: CheckStatus::Warn,
                details: format!("{} default rates, never refreshed", rates.rates.len()),
            },
        };

        vec![connectivity, tables, exchange_rates]
    })
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Warn => "warn",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
