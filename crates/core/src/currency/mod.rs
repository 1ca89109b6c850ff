//! Exchange-rate snapshots and the conversion rule.
//!
//! Rates are stored as units of a currency per one unit of the reference currency,
//! so converting between two non-reference currencies pivots through the reference.

pub mod book;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::lookup::{Currency, CurrencyCode};
use crate::errors::CurrencyError;
use crate::pricing::{round_to_cents, round_to_unit};
use crate::tables::defaults;

pub use book::{MergedRates, RateBook, RateFeed};

/// One complete, immutable rate table. Refreshes build a new value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeRates {
    pub reference: CurrencyCode,
    pub rates: BTreeMap<CurrencyCode, Decimal>,
    pub last_updated: Option<DateTime<Utc>>,
}

impl ExchangeRates {
    pub fn new(reference: CurrencyCode) -> Self {
        Self { reference, rates: BTreeMap::new(), last_updated: None }
    }

    /// Built-in rates relative to the default reference currency.
    pub fn defaults() -> Self {
        Self::from_currencies(CurrencyCode::new(defaults::REFERENCE_CURRENCY), &defaults::currencies())
    }

    /// Collects rates from currency rows. Rows with a non-positive rate are skipped;
    /// the newest `last_updated` among the rows becomes the snapshot timestamp.
    pub fn from_currencies(reference: CurrencyCode, currencies: &[Currency]) -> Self {
        let mut snapshot = Self::new(reference);
        for currency in currencies {
            if currency.validate().is_err() {
                continue;
            }
            snapshot.rates.insert(currency.code.clone(), currency.exchange_rate);
            snapshot.last_updated = snapshot.last_updated.max(currency.last_updated);
        }
        snapshot
    }

    pub fn with_rate(mut self, code: CurrencyCode, rate: Decimal) -> Result<Self, CurrencyError> {
        if rate <= Decimal::ZERO {
            return Err(CurrencyError::NonPositiveRate { code: code.0 });
        }
        self.rates.insert(code, rate);
        Ok(self)
    }

    /// Units of `code` per one reference unit. The reference itself is always 1.
    pub fn rate(&self, code: &CurrencyCode) -> Option<Decimal> {
        if code == &self.reference {
            return Some(Decimal::ONE);
        }
        self.rates.get(code).copied()
    }

    fn require(&self, code: &CurrencyCode) -> Result<Decimal, CurrencyError> {
        match self.rate(code) {
            Some(rate) if rate > Decimal::ZERO => Ok(rate),
            Some(_) => Err(CurrencyError::NonPositiveRate { code: code.0.clone() }),
            None => Err(CurrencyError::MissingRate { code: code.0.clone() }),
        }
    }

    pub fn contains(&self, code: &CurrencyCode) -> bool {
        self.rate(code).is_some()
    }

    /// Effective multiplier from `from` to `to`, unrounded.
    pub fn cross_rate(&self, from: &CurrencyCode, to: &CurrencyCode) -> Result<Decimal, CurrencyError> {
        if from == to {
            return Ok(Decimal::ONE);
        }
        let from_rate = self.require(from)?;
        let to_rate = self.require(to)?;
        to_rate.checked_div(from_rate).ok_or_else(|| CurrencyError::Overflow { code: to.0.clone() })
    }

    /// Converts `amount` between two currencies.
    ///
    /// Identical codes return `amount` untouched. Otherwise the amount is divided by
    /// the source rate (unless it is the reference), multiplied by the target rate
    /// (unless it is the reference) and rounded to cents, halves away from zero.
    /// A result outside the decimal range is `CurrencyError::Overflow`.
    pub fn convert(
        &self,
        amount: Decimal,
        from: &CurrencyCode,
        to: &CurrencyCode,
    ) -> Result<Decimal, CurrencyError> {
        if from == to {
            return Ok(amount);
        }

        let overflow = |code: &CurrencyCode| CurrencyError::Overflow { code: code.0.clone() };
        let mut value = amount;
        if from != &self.reference {
            value = value.checked_div(self.require(from)?).ok_or_else(|| overflow(from))?;
        }
        if to != &self.reference {
            value = value.checked_mul(self.require(to)?).ok_or_else(|| overflow(to))?;
        }
        Ok(round_to_cents(value))
    }

    /// Overlays this snapshot's rates onto currency rows, keeping name and symbol.
    pub fn apply_to(&self, currencies: &[Currency]) -> Vec<Currency> {
        currencies
            .iter()
            .cloned()
            .map(|mut currency| {
                if let Some(rate) = self.rate(&currency.code) {
                    currency.exchange_rate = rate;
                    currency.last_updated = self.last_updated.or(currency.last_updated);
                }
                currency
            })
            .collect()
    }
}

pub fn convert(
    amount: Decimal,
    from: &CurrencyCode,
    to: &CurrencyCode,
    rates: &ExchangeRates,
) -> Result<Decimal, CurrencyError> {
    rates.convert(amount, from, to)
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversion {
    pub amount: Decimal,
    /// Units of the target per unit of the source that produced `amount`.
    pub exchange_rate: Decimal,
    pub warning: Option<String>,
}

/// Converts with the live snapshot, retrying against the built-in rates when a code
/// is missing. The retry is reported in `warning`.
pub fn convert_with_fallback(
    amount: Decimal,
    from: &CurrencyCode,
    to: &CurrencyCode,
    rates: &ExchangeRates,
) -> Result<Conversion, CurrencyError> {
    match rates.convert(amount, from, to) {
        Ok(converted) => {
            Ok(Conversion { amount: converted, exchange_rate: rates.cross_rate(from, to)?, warning: None })
        }
        Err(CurrencyError::MissingRate { code }) => {
            let fallback = ExchangeRates::defaults();
            if fallback.reference != rates.reference {
                return Err(CurrencyError::MissingRate { code });
            }

            let converted = fallback.convert(amount, from, to)?;
            warn!(
                event_name = "currency.default_rates_applied",
                correlation_id = "currency",
                currency = %code,
                "exchange rate missing from snapshot, using default rates"
            );
            Ok(Conversion {
                amount: converted,
                exchange_rate: fallback.cross_rate(from, to)?,
                warning: Some(format!(
                    "No current exchange rate for {code}. Using default exchange rates."
                )),
            })
        }
        Err(error) => Err(error),
    }
}

/// Exchange rate with exactly four decimals, e.g. `0.2700`.
pub fn format_exchange_rate(rate: Decimal) -> String {
    let mut rounded = rate.round_dp_with_strategy(4, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(4);
    rounded.to_string()
}

/// Display symbol for `code`, or the code itself when no row knows it.
pub fn currency_symbol(code: &CurrencyCode, currencies: &[Currency]) -> String {
    currencies
        .iter()
        .find(|currency| &currency.code == code)
        .map(|currency| currency.symbol.clone())
        .unwrap_or_else(|| code.0.clone())
}

/// Symbol followed by the amount rounded to whole units with thousands separators,
/// e.g. `$3,881`.
pub fn format_currency(amount: Decimal, code: &CurrencyCode, currencies: &[Currency]) -> String {
    let symbol = currency_symbol(code, currencies);
    let rounded = round_to_unit(amount);
    let sign = if rounded.is_sign_negative() && !rounded.is_zero() { "-" } else { "" };
    format!("{sign}{symbol}{}", group_thousands(&rounded.abs().trunc().to_string()))
}

fn group_thousands(digits: &str) -> String {
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, digit) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    grouped
}
