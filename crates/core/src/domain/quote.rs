use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::lookup::{CurrencyCode, DurationId, RegionId, RoleId, SeniorityId, WorkloadId};
use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct QuoteId(pub i64);

impl fmt::Display for QuoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalculatorType {
    CustomResource,
    SwatTeam,
}

impl CalculatorType {
    /// Display label used in summaries and email subjects.
    pub fn label(self) -> &'static str {
        match self {
            Self::CustomResource => "Custom Resource",
            Self::SwatTeam => "SWAT Team",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::CustomResource => "custom_resource",
            Self::SwatTeam => "swat_team",
        }
    }
}

impl std::str::FromStr for CalculatorType {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "custom_resource" => Ok(Self::CustomResource),
            "swat_team" => Ok(Self::SwatTeam),
            other => Err(DomainError::InvariantViolation(format!(
                "unknown calculator type `{other}` (expected custom_resource|swat_team)"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub email: String,
    pub name: String,
    pub company: Option<String>,
}

impl Contact {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.name.trim().is_empty() || self.email.trim().is_empty() {
            return Err(DomainError::InvalidContact(
                "name and email address are required".to_owned(),
            ));
        }
        if !is_valid_email(self.email.trim()) {
            return Err(DomainError::InvalidContact(format!(
                "`{}` is not a valid email address",
                self.email.trim()
            )));
        }
        Ok(())
    }
}

/// Accepts `local@host.tld` with no whitespace and exactly one `@`. The domain needs
/// a `.` with at least one character on each side; any dot qualifies, so `a@b.c.`
/// passes while `jane@.com` does not.
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    domain.char_indices().any(|(index, ch)| ch == '.' && index > 0 && index + 1 < domain.len())
}

/// Identifier side of a quote, kept alongside the denormalized labels.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteSelectionIds {
    pub role_id: RoleId,
    pub seniority_id: SeniorityId,
    pub region_id: Option<RegionId>,
    pub workload_id: Option<WorkloadId>,
    pub duration_id: Option<DurationId>,
}

/// Human-readable labels, resolved when the quote is packaged.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteLabels {
    pub role: String,
    pub seniority: String,
    pub region: Option<String>,
    pub workload: Option<String>,
    pub duration: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteRecord {
    pub id: Option<QuoteId>,
    pub calculator_type: CalculatorType,
    pub contact: Contact,
    pub selection: QuoteSelectionIds,
    pub labels: QuoteLabels,
    pub currency: CurrencyCode,
    pub reference_currency: CurrencyCode,
    pub base_rate: Decimal,
    pub final_rate: Decimal,
    pub exchange_rate: Decimal,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl QuoteRecord {
    /// Quote records are write-once; the only change allowed is recording the
    /// identifier the store assigned.
    pub fn with_id(mut self, id: QuoteId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn is_converted(&self) -> bool {
        self.currency != self.reference_currency
    }
}
