//! Lookup tables that resolve selection identifiers into pricing factors.
//!
//! A [`LookupTables`] value is an immutable snapshot: calculators borrow it, and a
//! reload produces a new snapshot instead of editing this one.

pub mod defaults;
pub mod source;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::lookup::{
    Currency, DurationOption, Region, Role, SeniorityLevel, WorkloadOption,
};
use crate::errors::ApplicationError;

pub use source::{
    FallbackLookupSource, LoadedTables, LookupSource, StaticLookupSource, TableWarning,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableName {
    Regions,
    Roles,
    SeniorityLevels,
    WorkloadOptions,
    DurationOptions,
    Currencies,
}

impl TableName {
    pub const ALL: [TableName; 6] = [
        Self::Regions,
        Self::Roles,
        Self::SeniorityLevels,
        Self::WorkloadOptions,
        Self::DurationOptions,
        Self::Currencies,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Regions => "regions",
            Self::Roles => "roles",
            Self::SeniorityLevels => "seniority_levels",
            Self::WorkloadOptions => "workload_options",
            Self::DurationOptions => "duration_options",
            Self::Currencies => "currencies",
        }
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupTables {
    pub regions: Vec<Region>,
    pub roles: Vec<Role>,
    pub seniority_levels: Vec<SeniorityLevel>,
    pub workload_options: Vec<WorkloadOption>,
    pub duration_options: Vec<DurationOption>,
    pub currencies: Vec<Currency>,
}

impl LookupTables {
    /// Built-in reference data, used when no table store is reachable.
    pub fn defaults() -> Self {
        Self {
            regions: defaults::regions(),
            roles: defaults::roles(),
            seniority_levels: defaults::seniority_levels(),
            workload_options: defaults::workload_options(),
            duration_options: defaults::duration_options(),
            currencies: defaults::currencies(),
        }
    }

    // Empty identifiers never match; an unselected field is the same as an unknown one.

    pub fn region(&self, id: &str) -> Option<&Region> {
        non_empty(id).and_then(|id| self.regions.iter().find(|region| region.id.0 == id))
    }

    pub fn role(&self, id: &str) -> Option<&Role> {
        non_empty(id).and_then(|id| self.roles.iter().find(|role| role.id.0 == id))
    }

    pub fn seniority(&self, id: &str) -> Option<&SeniorityLevel> {
        non_empty(id).and_then(|id| self.seniority_levels.iter().find(|level| level.id.0 == id))
    }

    pub fn workload(&self, id: &str) -> Option<&WorkloadOption> {
        non_empty(id).and_then(|id| self.workload_options.iter().find(|option| option.id.0 == id))
    }

    pub fn duration(&self, id: &str) -> Option<&DurationOption> {
        non_empty(id).and_then(|id| self.duration_options.iter().find(|option| option.id.0 == id))
    }

    pub fn currency(&self, code: &str) -> Option<&Currency> {
        let code = non_empty(code)?;
        self.currencies.iter().find(|currency| currency.code.0.eq_ignore_ascii_case(code))
    }

    /// Checks every record's invariants; the first violation wins.
    pub fn validate(&self) -> Result<(), ApplicationError> {
        self.regions.iter().try_for_each(Region::validate)?;
        self.roles.iter().try_for_each(Role::validate)?;
        self.seniority_levels.iter().try_for_each(SeniorityLevel::validate)?;
        self.workload_options.iter().try_for_each(WorkloadOption::validate)?;
        self.duration_options.iter().try_for_each(DurationOption::validate)?;
        self.currencies.iter().try_for_each(Currency::validate)?;
        Ok(())
    }

    pub fn row_count(&self, table: TableName) -> usize {
        match table {
            TableName::Regions => self.regions.len(),
            TableName::Roles => self.roles.len(),
            TableName::SeniorityLevels => self.seniority_levels.len(),
            TableName::WorkloadOptions => self.workload_options.len(),
            TableName::DurationOptions => self.duration_options.len(),
            TableName::Currencies => self.currencies.len(),
        }
    }
}

fn non_empty(id: &str) -> Option<&str> {
    let trimmed = id.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}
