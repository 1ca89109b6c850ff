use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::assembly::PricingSettings;
use crate::domain::lookup::CurrencyCode;
use crate::domain::quote::is_valid_email;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub pricing: PricingConfig,
    pub rates: RatesConfig,
    pub mail: MailConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct PricingConfig {
    pub reference_currency: String,
    /// Fraction of the SWAT subtotal taken off, 0.20 for 20%.
    pub swat_discount: Decimal,
    pub quote_validity_days: u32,
    pub table_source: TableSource,
}

#[derive(Clone, Debug)]
pub struct RatesConfig {
    /// Base URL; the reference currency code is appended as the last path segment.
    pub feed_url: String,
    pub refresh_interval_secs: u64,
    pub timeout_secs: u64,
    pub tracked_currencies: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct MailConfig {
    pub transport: MailTransport,
    pub relay_url: Option<String>,
    pub api_key: Option<SecretString>,
    pub smtp_host: Option<String>,
    /// 465 connects over implicit TLS; any other port upgrades with STARTTLS when offered.
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<SecretString>,
    pub from_address: String,
    pub company_name: String,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableSource {
    Database,
    Static,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MailTransport {
    Log,
    Http,
    Smtp,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
    pub table_source: Option<TableSource>,
    pub mail_transport: Option<MailTransport>,
    pub server_port: Option<u16>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

/// Every environment variable the loader reads, in section order.
pub const ENV_KEYS: &[&str] = &[
    "RATECARD_DATABASE_URL",
    "RATECARD_DATABASE_MAX_CONNECTIONS",
    "RATECARD_DATABASE_TIMEOUT_SECS",
    "RATECARD_SERVER_BIND_ADDRESS",
    "RATECARD_SERVER_PORT",
    "RATECARD_SERVER_GRACEFUL_SHUTDOWN_SECS",
    "RATECARD_PRICING_REFERENCE_CURRENCY",
    "RATECARD_PRICING_SWAT_DISCOUNT",
    "RATECARD_PRICING_QUOTE_VALIDITY_DAYS",
    "RATECARD_PRICING_TABLE_SOURCE",
    "RATECARD_RATES_FEED_URL",
    "RATECARD_RATES_REFRESH_INTERVAL_SECS",
    "RATECARD_RATES_TIMEOUT_SECS",
    "RATECARD_RATES_TRACKED_CURRENCIES",
    "RATECARD_MAIL_TRANSPORT",
    "RATECARD_MAIL_RELAY_URL",
    "RATECARD_MAIL_API_KEY",
    "RATECARD_MAIL_SMTP_HOST",
    "RATECARD_MAIL_SMTP_PORT",
    "RATECARD_MAIL_SMTP_USERNAME",
    "RATECARD_MAIL_SMTP_PASSWORD",
    "RATECARD_MAIL_FROM_ADDRESS",
    "RATECARD_MAIL_COMPANY_NAME",
    "RATECARD_LOGGING_LEVEL",
    "RATECARD_LOGGING_FORMAT",
];

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://ratecard.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            pricing: PricingConfig {
                reference_currency: "AED".to_string(),
                swat_discount: Decimal::new(20, 2),
                quote_validity_days: 30,
                table_source: TableSource::Database,
            },
            rates: RatesConfig {
                feed_url: "https://api.exchangerate-api.com/v4/latest".to_string(),
                refresh_interval_secs: 3_600,
                timeout_secs: 10,
                tracked_currencies: ["AED", "USD", "EUR", "GBP", "PKR"]
                    .into_iter()
                    .map(str::to_string)
                    .collect(),
            },
            mail: MailConfig {
                transport: MailTransport::Log,
                relay_url: None,
                api_key: None,
                smtp_host: None,
                smtp_port: 587,
                smtp_username: None,
                smtp_password: None,
                from_address: "quotes@ratecard.local".to_string(),
                company_name: "YouPal Group".to_string(),
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl FromStr for TableSource {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "database" => Ok(Self::Database),
            "static" => Ok(Self::Static),
            other => Err(ConfigError::Validation(format!(
                "unsupported table source `{other}` (expected database|static)"
            ))),
        }
    }
}

impl FromStr for MailTransport {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "log" => Ok(Self::Log),
            "http" => Ok(Self::Http),
            "smtp" => Ok(Self::Smtp),
            other => Err(ConfigError::Validation(format!(
                "unsupported mail transport `{other}` (expected log|http|smtp)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("ratecard.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    pub fn reference_currency(&self) -> CurrencyCode {
        CurrencyCode::new(&self.pricing.reference_currency)
    }

    pub fn pricing_settings(&self) -> PricingSettings {
        PricingSettings {
            reference_currency: self.reference_currency(),
            swat_discount: self.pricing.swat_discount,
        }
    }

    /// Tracked codes, normalized, always including the reference currency.
    pub fn tracked_currencies(&self) -> Vec<CurrencyCode> {
        let mut codes = vec![self.reference_currency()];
        for code in self.rates.tracked_currencies.iter().map(CurrencyCode::new) {
            if !codes.contains(&code) {
                codes.push(code);
            }
        }
        codes
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(pricing) = patch.pricing {
            if let Some(reference_currency) = pricing.reference_currency {
                self.pricing.reference_currency = reference_currency;
            }
            if let Some(swat_discount) = pricing.swat_discount {
                self.pricing.swat_discount = swat_discount;
            }
            if let Some(quote_validity_days) = pricing.quote_validity_days {
                self.pricing.quote_validity_days = quote_validity_days;
            }
            if let Some(table_source) = pricing.table_source {
                self.pricing.table_source = table_source;
            }
        }

        if let Some(rates) = patch.rates {
            if let Some(feed_url) = rates.feed_url {
                self.rates.feed_url = feed_url;
            }
            if let Some(refresh_interval_secs) = rates.refresh_interval_secs {
                self.rates.refresh_interval_secs = refresh_interval_secs;
            }
            if let Some(timeout_secs) = rates.timeout_secs {
                self.rates.timeout_secs = timeout_secs;
            }
            if let Some(tracked_currencies) = rates.tracked_currencies {
                self.rates.tracked_currencies = tracked_currencies;
            }
        }

        if let Some(mail) = patch.mail {
            if let Some(transport) = mail.transport {
                self.mail.transport = transport;
            }
            if let Some(relay_url) = mail.relay_url {
                self.mail.relay_url = Some(relay_url);
            }
            if let Some(mail_api_key_value) = mail.api_key {
                self.mail.api_key = Some(secret_value(mail_api_key_value));
            }
            if let Some(smtp_host) = mail.smtp_host {
                self.mail.smtp_host = Some(smtp_host);
            }
            if let Some(smtp_port) = mail.smtp_port {
                self.mail.smtp_port = smtp_port;
            }
            if let Some(smtp_username) = mail.smtp_username {
                self.mail.smtp_username = Some(smtp_username);
            }
            if let Some(smtp_password_value) = mail.smtp_password {
                self.mail.smtp_password = Some(secret_value(smtp_password_value));
            }
            if let Some(from_address) = mail.from_address {
                self.mail.from_address = from_address;
            }
            if let Some(company_name) = mail.company_name {
                self.mail.company_name = company_name;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("RATECARD_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("RATECARD_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_env("RATECARD_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("RATECARD_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_env("RATECARD_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("RATECARD_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("RATECARD_SERVER_PORT") {
            self.server.port = parse_env("RATECARD_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("RATECARD_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_env("RATECARD_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        if let Some(value) = read_env("RATECARD_PRICING_REFERENCE_CURRENCY") {
            self.pricing.reference_currency = value;
        }
        if let Some(value) = read_env("RATECARD_PRICING_SWAT_DISCOUNT") {
            self.pricing.swat_discount = parse_env("RATECARD_PRICING_SWAT_DISCOUNT", &value)?;
        }
        if let Some(value) = read_env("RATECARD_PRICING_QUOTE_VALIDITY_DAYS") {
            self.pricing.quote_validity_days =
                parse_env("RATECARD_PRICING_QUOTE_VALIDITY_DAYS", &value)?;
        }
        if let Some(value) = read_env("RATECARD_PRICING_TABLE_SOURCE") {
            self.pricing.table_source = value.parse()?;
        }

        if let Some(value) = read_env("RATECARD_RATES_FEED_URL") {
            self.rates.feed_url = value;
        }
        if let Some(value) = read_env("RATECARD_RATES_REFRESH_INTERVAL_SECS") {
            self.rates.refresh_interval_secs =
                parse_env("RATECARD_RATES_REFRESH_INTERVAL_SECS", &value)?;
        }
        if let Some(value) = read_env("RATECARD_RATES_TIMEOUT_SECS") {
            self.rates.timeout_secs = parse_env("RATECARD_RATES_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("RATECARD_RATES_TRACKED_CURRENCIES") {
            self.rates.tracked_currencies = value
                .split(',')
                .map(str::trim)
                .filter(|code| !code.is_empty())
                .map(str::to_string)
                .collect();
        }

        if let Some(value) = read_env("RATECARD_MAIL_TRANSPORT") {
            self.mail.transport = value.parse()?;
        }
        if let Some(value) = read_env("RATECARD_MAIL_RELAY_URL") {
            self.mail.relay_url = Some(value);
        }
        if let Some(value) = read_env("RATECARD_MAIL_API_KEY") {
            self.mail.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("RATECARD_MAIL_SMTP_HOST") {
            self.mail.smtp_host = Some(value);
        }
        if let Some(value) = read_env("RATECARD_MAIL_SMTP_PORT") {
            self.mail.smtp_port = parse_env("RATECARD_MAIL_SMTP_PORT", &value)?;
        }
        if let Some(value) = read_env("RATECARD_MAIL_SMTP_USERNAME") {
            self.mail.smtp_username = Some(value);
        }
        if let Some(value) = read_env("RATECARD_MAIL_SMTP_PASSWORD") {
            self.mail.smtp_password = Some(secret_value(value));
        }
        if let Some(value) = read_env("RATECARD_MAIL_FROM_ADDRESS") {
            self.mail.from_address = value;
        }
        if let Some(value) = read_env("RATECARD_MAIL_COMPANY_NAME") {
            self.mail.company_name = value;
        }

        let log_level =
            read_env("RATECARD_LOGGING_LEVEL").or_else(|| read_env("RATECARD_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("RATECARD_LOGGING_FORMAT").or_else(|| read_env("RATECARD_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(log_format) = overrides.log_format {
            self.logging.format = log_format;
        }
        if let Some(table_source) = overrides.table_source {
            self.pricing.table_source = table_source;
        }
        if let Some(mail_transport) = overrides.mail_transport {
            self.mail.transport = mail_transport;
        }
        if let Some(server_port) = overrides.server_port {
            self.server.port = server_port;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_server(&self.server)?;
        validate_pricing(&self.pricing)?;
        validate_rates(&self.rates)?;
        validate_mail(&self.mail)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("ratecard.toml"), PathBuf::from("config/ratecard.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_pricing(pricing: &PricingConfig) -> Result<(), ConfigError> {
    if !is_currency_code(&pricing.reference_currency) {
        return Err(ConfigError::Validation(format!(
            "pricing.reference_currency must be a three-letter code (got `{}`)",
            pricing.reference_currency
        )));
    }

    if pricing.swat_discount < Decimal::ZERO || pricing.swat_discount >= Decimal::ONE {
        return Err(ConfigError::Validation(
            "pricing.swat_discount must be a fraction in range 0..1 (0.20 means 20%)".to_string(),
        ));
    }

    if pricing.quote_validity_days == 0 {
        return Err(ConfigError::Validation(
            "pricing.quote_validity_days must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_rates(rates: &RatesConfig) -> Result<(), ConfigError> {
    if !is_http_url(&rates.feed_url) {
        return Err(ConfigError::Validation(
            "rates.feed_url must start with http:// or https://".to_string(),
        ));
    }

    if rates.refresh_interval_secs < 60 {
        return Err(ConfigError::Validation(
            "rates.refresh_interval_secs must be at least 60".to_string(),
        ));
    }

    if rates.timeout_secs == 0 || rates.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "rates.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if rates.tracked_currencies.is_empty() {
        return Err(ConfigError::Validation(
            "rates.tracked_currencies must list at least one currency".to_string(),
        ));
    }
    if let Some(bad) = rates.tracked_currencies.iter().find(|code| !is_currency_code(code)) {
        return Err(ConfigError::Validation(format!(
            "rates.tracked_currencies contains `{bad}`, expected three-letter codes"
        )));
    }

    Ok(())
}

fn validate_mail(mail: &MailConfig) -> Result<(), ConfigError> {
    if !is_valid_email(mail.from_address.trim()) {
        return Err(ConfigError::Validation(format!(
            "mail.from_address `{}` is not a valid email address",
            mail.from_address
        )));
    }

    if mail.company_name.trim().is_empty() {
        return Err(ConfigError::Validation("mail.company_name must not be empty".to_string()));
    }

    if let Some(relay_url) = &mail.relay_url {
        if !is_http_url(relay_url) {
            return Err(ConfigError::Validation(
                "mail.relay_url must start with http:// or https://".to_string(),
            ));
        }
    }

    if mail.transport == MailTransport::Http {
        if mail.relay_url.is_none() {
            return Err(ConfigError::Validation(
                "mail.relay_url is required when mail.transport is `http`".to_string(),
            ));
        }
        let missing_key =
            mail.api_key.as_ref().map(|value| value.expose_secret().trim().is_empty()).unwrap_or(true);
        if missing_key {
            return Err(ConfigError::Validation(
                "mail.api_key is required when mail.transport is `http`".to_string(),
            ));
        }
    }

    if mail.transport == MailTransport::Smtp {
        let missing_host =
            mail.smtp_host.as_deref().map(|host| host.trim().is_empty()).unwrap_or(true);
        if missing_host {
            return Err(ConfigError::Validation(
                "mail.smtp_host is required when mail.transport is `smtp`".to_string(),
            ));
        }
        if mail.smtp_port == 0 {
            return Err(ConfigError::Validation("mail.smtp_port must be > 0".to_string()));
        }
    }

    if mail.smtp_username.is_some() != mail.smtp_password.is_some() {
        return Err(ConfigError::Validation(
            "mail.smtp_username and mail.smtp_password must be set together".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn is_currency_code(value: &str) -> bool {
    let value = value.trim();
    value.len() == 3 && value.chars().all(|ch| ch.is_ascii_alphabetic())
}

fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_env<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse::<T>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    server: Option<ServerPatch>,
    pricing: Option<PricingPatch>,
    rates: Option<RatesPatch>,
    mail: Option<MailPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct PricingPatch {
    reference_currency: Option<String>,
    swat_discount: Option<Decimal>,
    quote_validity_days: Option<u32>,
    table_source: Option<TableSource>,
}

#[derive(Debug, Default, Deserialize)]
struct RatesPatch {
    feed_url: Option<String>,
    refresh_interval_secs: Option<u64>,
    timeout_secs: Option<u64>,
    tracked_currencies: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct MailPatch {
    transport: Option<MailTransport>,
    relay_url: Option<String>,
    api_key: Option<String>,
    smtp_host: Option<String>,
    smtp_port: Option<u16>,
    smtp_username: Option<String>,
    smtp_password: Option<String>,
    from_address: Option<String>,
    company_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use rust_decimal::Decimal;
    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{
        AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat, MailTransport,
        TableSource,
    };
    use crate::domain::lookup::CurrencyCode;

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn defaults_pass_validation() -> Result<(), String> {
        let config = AppConfig::default();
        config.validate().map_err(|err| err.to_string())?;

        ensure(config.pricing.swat_discount == Decimal::new(2, 1), "default swat discount is 20%")?;
        ensure(config.pricing.quote_validity_days == 30, "quotes are valid for 30 days")?;
        ensure(
            config.tracked_currencies().first() == Some(&CurrencyCode::new("AED")),
            "reference currency is tracked first",
        )
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_MAIL_RELAY_KEY", "relay-key-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("ratecard.toml");
            fs::write(
                &path,
                r#"
[mail]
transport = "http"
relay_url = "https://mail.example.com/v1/send"
api_key = "${TEST_MAIL_RELAY_KEY}"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.mail.transport == MailTransport::Http, "transport comes from file")?;
            ensure(
                config.mail.api_key.as_ref().map(|key| key.expose_secret() == "relay-key-from-env")
                    == Some(true),
                "api key should be interpolated from environment",
            )
        })();

        clear_vars(&["TEST_MAIL_RELAY_KEY"]);
        result
    }

    #[test]
    fn smtp_settings_load_from_file_and_env() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_SMTP_PASSWORD", "smtp-password-from-env");
        env::set_var("RATECARD_MAIL_SMTP_PORT", "465");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("ratecard.toml");
            fs::write(
                &path,
                r#"
[mail]
transport = "smtp"
smtp_host = "smtp.example.com"
smtp_port = 587
smtp_username = "quotes"
smtp_password = "${TEST_SMTP_PASSWORD}"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.mail.transport == MailTransport::Smtp, "transport comes from file")?;
            ensure(
                config.mail.smtp_host.as_deref() == Some("smtp.example.com"),
                "host comes from file",
            )?;
            ensure(config.mail.smtp_port == 465, "env port wins over file port")?;
            ensure(
                config.mail.smtp_password.as_ref().map(|value| value.expose_secret() == "smtp-password-from-env")
                    == Some(true),
                "password should be interpolated from environment",
            )?;
            ensure(
                !format!("{config:?}").contains("smtp-password-from-env"),
                "debug output should not contain the smtp password",
            )
        })();

        clear_vars(&["TEST_SMTP_PASSWORD", "RATECARD_MAIL_SMTP_PORT"]);
        result
    }

    #[test]
    fn smtp_transport_requires_host_and_paired_credentials() -> Result<(), String> {
        let mut config = AppConfig::default();
        config.mail.transport = MailTransport::Smtp;

        let error = match config.validate() {
            Ok(()) => return Err("smtp without a host should not validate".to_string()),
            Err(error) => error,
        };
        ensure(
            matches!(error, ConfigError::Validation(ref message) if message.contains("mail.smtp_host")),
            "validation failure should mention mail.smtp_host",
        )?;

        config.mail.smtp_host = Some("smtp.example.com".to_string());
        config.mail.smtp_username = Some("quotes".to_string());
        let error = match config.validate() {
            Ok(()) => return Err("username without password should not validate".to_string()),
            Err(error) => error,
        };
        ensure(
            matches!(error, ConfigError::Validation(ref message) if message.contains("mail.smtp_password")),
            "validation failure should mention mail.smtp_password",
        )?;

        config.mail.smtp_password = Some("secret".to_string().into());
        config.validate().map_err(|err| err.to_string())
    }

    #[test]
    fn missing_interpolation_variable_is_reported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        env::remove_var("TEST_RATECARD_UNSET_VAR");

        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let path = dir.path().join("ratecard.toml");
        fs::write(&path, "[database]\nurl = \"${TEST_RATECARD_UNSET_VAR}\"\n")
            .map_err(|err| err.to_string())?;

        let error = match AppConfig::load(LoadOptions {
            config_path: Some(path),
            ..LoadOptions::default()
        }) {
            Ok(_) => return Err("expected interpolation failure".to_string()),
            Err(error) => error,
        };
        ensure(
            matches!(error, ConfigError::MissingEnvInterpolation { ref var } if var == "TEST_RATECARD_UNSET_VAR"),
            "error should name the missing variable",
        )
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("RATECARD_LOG_LEVEL", "warn");
        env::set_var("RATECARD_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "pretty logging format should be set from env var",
            )?;
            Ok(())
        })();

        clear_vars(&["RATECARD_LOG_LEVEL", "RATECARD_LOG_FORMAT"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("RATECARD_DATABASE_URL", "sqlite://from-env.db");
        env::set_var("RATECARD_PRICING_SWAT_DISCOUNT", "0.25");
        env::set_var("RATECARD_RATES_TRACKED_CURRENCIES", "usd, eur");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("ratecard.toml");
            fs::write(
                &path,
                r#"
[database]
url = "sqlite://from-file.db"

[pricing]
swat_discount = "0.10"
table_source = "static"

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    database_url: Some("sqlite://from-override.db".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.database.url == "sqlite://from-override.db",
                "override database url should win",
            )?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(
                config.pricing.swat_discount == Decimal::new(25, 2),
                "env swat discount should win over file",
            )?;
            ensure(
                config.pricing.table_source == TableSource::Static,
                "file table source should win over defaults",
            )?;
            ensure(
                config.tracked_currencies()
                    == vec![CurrencyCode::new("AED"), CurrencyCode::new("USD"), CurrencyCode::new("EUR")],
                "env tracked currencies are normalized and keep the reference",
            )?;
            Ok(())
        })();

        clear_vars(&[
            "RATECARD_DATABASE_URL",
            "RATECARD_PRICING_SWAT_DISCOUNT",
            "RATECARD_RATES_TRACKED_CURRENCIES",
        ]);
        result
    }

    #[test]
    fn invalid_env_override_names_the_variable() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("RATECARD_SERVER_PORT", "eighty");

        let result = match AppConfig::load(LoadOptions::default()) {
            Ok(_) => Err("expected invalid override failure".to_string()),
            Err(error) => ensure(
                matches!(error, ConfigError::InvalidEnvOverride { ref key, .. } if key == "RATECARD_SERVER_PORT"),
                "error should name RATECARD_SERVER_PORT",
            ),
        };

        clear_vars(&["RATECARD_SERVER_PORT"]);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("RATECARD_MAIL_TRANSPORT", "http");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("mail.relay_url")
            );
            ensure(has_message, "validation failure should mention mail.relay_url")
        })();

        clear_vars(&["RATECARD_MAIL_TRANSPORT"]);
        result
    }

    #[test]
    fn swat_discount_must_be_a_fraction() -> Result<(), String> {
        let mut config = AppConfig::default();
        config.pricing.swat_discount = Decimal::from(20);

        let error = match config.validate() {
            Ok(()) => return Err("20 is a percentage, not a fraction".to_string()),
            Err(error) => error,
        };
        ensure(
            matches!(error, ConfigError::Validation(ref message) if message.contains("pricing.swat_discount")),
            "validation failure should mention pricing.swat_discount",
        )
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("RATECARD_MAIL_API_KEY", "relay-secret-value");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(!debug.contains("relay-secret-value"), "debug output should not contain api key")?;
            ensure(
                matches!(config.logging.format, LogFormat::Compact),
                "default logging format should be compact",
            )?;
            Ok(())
        })();

        clear_vars(&["RATECARD_MAIL_API_KEY"]);
        result
    }
}
