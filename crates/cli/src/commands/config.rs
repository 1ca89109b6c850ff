use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use ratecard_core::config::{AppConfig, LoadOptions};
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key_path, value) in effective_values(&config) {
        lines.push(render_line(
            key_path,
            &value,
            field_source(
                key_path,
                &env_key(key_path),
                config_file_doc.as_ref(),
                config_file_path.as_deref(),
            ),
        ));
    }
    lines.join("\n")
}

fn effective_values(config: &AppConfig) -> Vec<(&'static str, String)> {
    vec![
        ("database.url", config.database.url.clone()),
        ("database.max_connections", config.database.max_connections.to_string()),
        ("database.timeout_secs", config.database.timeout_secs.to_string()),
        ("server.bind_address", config.server.bind_address.clone()),
        ("server.port", config.server.port.to_string()),
        ("server.graceful_shutdown_secs", config.server.graceful_shutdown_secs.to_string()),
        ("pricing.reference_currency", config.pricing.reference_currency.clone()),
        ("pricing.swat_discount", config.pricing.swat_discount.to_string()),
        ("pricing.quote_validity_days", config.pricing.quote_validity_days.to_string()),
        ("pricing.table_source", format!("{:?}", config.pricing.table_source)),
        ("rates.feed_url", config.rates.feed_url.clone()),
        ("rates.refresh_interval_secs", config.rates.refresh_interval_secs.to_string()),
        ("rates.timeout_secs", config.rates.timeout_secs.to_string()),
        ("rates.tracked_currencies", config.rates.tracked_currencies.join(",")),
        ("mail.transport", format!("{:?}", config.mail.transport)),
        ("mail.relay_url", config.mail.relay_url.clone().unwrap_or_else(|| "<unset>".to_string())),
        (
            "mail.api_key",
            if config.mail.api_key.is_some() { "<redacted>" } else { "<unset>" }.to_string(),
        ),
        ("mail.smtp_host", config.mail.smtp_host.clone().unwrap_or_else(|| "<unset>".to_string())),
        ("mail.smtp_port", config.mail.smtp_port.to_string()),
        (
            "mail.smtp_username",
            config.mail.smtp_username.clone().unwrap_or_else(|| "<unset>".to_string()),
        ),
        (
            "mail.smtp_password",
            if config.mail.smtp_password.is_some() { "<redacted>" } else { "<unset>" }.to_string(),
        ),
        ("mail.from_address", config.mail.from_address.clone()),
        ("mail.company_name", config.mail.company_name.clone()),
        ("logging.level", config.logging.level.clone()),
        ("logging.format", format!("{:?}", config.logging.format)),
    ]
}

/// `rates.feed_url` is read from `RATECARD_RATES_FEED_URL`.
fn env_key(key_path: &str) -> String {
    format!("RATECARD_{}", key_path.replace('.', "_").to_ascii_uppercase())
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("ratecard.toml"), PathBuf::from("config/ratecard.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: &str,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if env::var_os(env_key).is_some() {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
