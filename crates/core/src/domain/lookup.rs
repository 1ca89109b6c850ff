use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::{CurrencyError, DomainError};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegionId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoleId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SeniorityId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkloadId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DurationId(pub String);

/// ISO-style currency code, normalized to upper case.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CurrencyCode(pub String);

impl CurrencyCode {
    pub fn new(code: impl AsRef<str>) -> Self {
        Self(code.as_ref().trim().to_ascii_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub id: RegionId,
    pub name: String,
    pub multiplier: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    /// Monthly rate in the reference currency.
    pub base_rate: Decimal,
    pub category: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeniorityLevel {
    pub id: SeniorityId,
    pub name: String,
    pub multiplier: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadOption {
    pub id: WorkloadId,
    pub label: String,
    /// Share of a full-time engagement, 0 to 100.
    pub percentage: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DurationOption {
    pub id: DurationId,
    pub label: String,
    pub months: u32,
    /// Engagement-wide discount, 0 to 100.
    pub discount: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Currency {
    pub code: CurrencyCode,
    pub name: String,
    pub symbol: String,
    /// Units of this currency per one unit of the reference currency.
    pub exchange_rate: Decimal,
    pub last_updated: Option<DateTime<Utc>>,
}

impl Region {
    pub fn validate(&self) -> Result<(), DomainError> {
        non_negative("region multiplier", &self.id.0, self.multiplier)
    }
}

impl Role {
    pub fn validate(&self) -> Result<(), DomainError> {
        non_negative("role base rate", &self.id.0, self.base_rate)
    }
}

impl SeniorityLevel {
    pub fn validate(&self) -> Result<(), DomainError> {
        non_negative("seniority multiplier", &self.id.0, self.multiplier)
    }
}

impl WorkloadOption {
    pub fn validate(&self) -> Result<(), DomainError> {
        percentage("workload percentage", &self.id.0, self.percentage)
    }
}

impl DurationOption {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.months == 0 {
            return Err(DomainError::InvariantViolation(format!(
                "duration `{}` must last at least one month",
                self.id.0
            )));
        }
        percentage("duration discount", &self.id.0, self.discount)
    }
}

impl Currency {
    pub fn validate(&self) -> Result<(), CurrencyError> {
        if self.exchange_rate <= Decimal::ZERO {
            return Err(CurrencyError::NonPositiveRate { code: self.code.0.clone() });
        }
        Ok(())
    }
}

fn non_negative(field: &str, id: &str, value: Decimal) -> Result<(), DomainError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(DomainError::InvariantViolation(format!(
            "{field} for `{id}` must not be negative (got {value})"
        )));
    }
    Ok(())
}

fn percentage(field: &str, id: &str, value: Decimal) -> Result<(), DomainError> {
    non_negative(field, id, value)?;
    if value > Decimal::ONE_HUNDRED {
        return Err(DomainError::InvariantViolation(format!(
            "{field} for `{id}` must be at most 100 (got {value})"
        )));
    }
    Ok(())
}
