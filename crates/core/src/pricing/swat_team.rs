use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::lookup::{DurationOption, Role, SeniorityLevel, WorkloadOption};
use crate::domain::quote::CalculatorType;
use crate::errors::DomainError;
use crate::pricing::{calculate_percentage, multiply, round_to_unit, step, RateCalculation};
use crate::tables::LookupTables;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwatTeamSelection {
    pub role_id: String,
    pub seniority_id: String,
    pub workload_id: String,
    pub duration_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedSwatTeam<'a> {
    pub role: &'a Role,
    pub seniority: &'a SeniorityLevel,
    pub workload: &'a WorkloadOption,
    pub duration: &'a DurationOption,
}

/// Intermediate amounts of the SWAT formula; nothing is rounded before `base_rate`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct SwatBreakdown {
    with_seniority: Decimal,
    with_workload: Decimal,
    with_duration: Decimal,
    with_swat: Decimal,
    base_rate: Decimal,
}

fn breakdown(
    base_rate: Decimal,
    seniority_multiplier: Decimal,
    workload_percentage: Decimal,
    duration_discount: Decimal,
    swat_discount: Decimal,
) -> Result<SwatBreakdown, DomainError> {
    let with_seniority = multiply("seniority", base_rate, seniority_multiplier)?;
    let with_workload =
        multiply("workload", with_seniority, workload_percentage / Decimal::ONE_HUNDRED)?;
    let with_duration = multiply(
        "duration",
        with_workload,
        Decimal::ONE - duration_discount / Decimal::ONE_HUNDRED,
    )?;
    let with_swat = multiply("swat_discount", with_duration, Decimal::ONE - swat_discount)?;

    Ok(SwatBreakdown {
        with_seniority,
        with_workload,
        with_duration,
        with_swat,
        base_rate: round_to_unit(with_swat),
    })
}

/// `round(base × seniority × workload% × (1 − duration discount%) × (1 − swat discount))`
///
/// `swat_discount` is a fraction (0.20 for 20%), the two percentages are 0 to 100.
pub fn swat_team_rate(
    base_rate: Decimal,
    seniority_multiplier: Decimal,
    workload_percentage: Decimal,
    duration_discount: Decimal,
    swat_discount: Decimal,
) -> Result<Decimal, DomainError> {
    breakdown(base_rate, seniority_multiplier, workload_percentage, duration_discount, swat_discount)
        .map(|amounts| amounts.base_rate)
}

/// Monthly base rate for the selection, or zero while the selection is incomplete
/// or cannot be priced.
pub fn calculate_swat_team_rate(
    selection: &SwatTeamSelection,
    tables: &LookupTables,
    swat_discount: Decimal,
) -> Decimal {
    selection
        .resolve(tables)
        .and_then(|resolved| resolved.base_rate(swat_discount))
        .unwrap_or(Decimal::ZERO)
}

impl SwatTeamSelection {
    pub fn resolve<'a>(&self, tables: &'a LookupTables) -> Result<ResolvedSwatTeam<'a>, DomainError> {
        let role = tables.role(&self.role_id);
        let seniority = tables.seniority(&self.seniority_id);
        let workload = tables.workload(&self.workload_id);
        let duration = tables.duration(&self.duration_id);

        match (role, seniority, workload, duration) {
            (Some(role), Some(seniority), Some(workload), Some(duration)) => {
                Ok(ResolvedSwatTeam { role, seniority, workload, duration })
            }
            _ => {
                let missing = [
                    ("role", role.is_none()),
                    ("seniority", seniority.is_none()),
                    ("workload", workload.is_none()),
                    ("duration", duration.is_none()),
                ]
                .into_iter()
                .filter_map(|(field, absent)| absent.then_some(field))
                .collect();
                Err(DomainError::IncompleteSelection { missing })
            }
        }
    }
}

impl ResolvedSwatTeam<'_> {
    fn breakdown(&self, swat_discount: Decimal) -> Result<SwatBreakdown, DomainError> {
        breakdown(
            self.role.base_rate,
            self.seniority.multiplier,
            self.workload.percentage,
            self.duration.discount,
            swat_discount,
        )
    }

    pub fn base_rate(&self, swat_discount: Decimal) -> Result<Decimal, DomainError> {
        self.breakdown(swat_discount).map(|amounts| amounts.base_rate)
    }

    /// Full trace of the formula. The duration and team steps also state what each
    /// discount saves, in whole units.
    pub fn calculation(&self, swat_discount: Decimal) -> Result<RateCalculation, DomainError> {
        let amounts = self.breakdown(swat_discount)?;
        let swat_percentage = multiply("swat_discount", swat_discount, Decimal::ONE_HUNDRED)?;
        let duration_saving = calculate_percentage(amounts.with_workload, self.duration.discount)?;
        let team_saving = calculate_percentage(amounts.with_duration, swat_percentage)?;

        Ok(RateCalculation {
            calculator_type: CalculatorType::SwatTeam,
            base_rate: amounts.base_rate,
            steps: vec![
                step("role", format!("{} base rate", self.role.name), self.role.base_rate),
                step(
                    "seniority",
                    format!("× {} ({})", self.seniority.multiplier, self.seniority.name),
                    amounts.with_seniority,
                ),
                step(
                    "workload",
                    format!("× {}% ({})", self.workload.percentage, self.workload.label),
                    amounts.with_workload,
                ),
                step(
                    "duration",
                    format!(
                        "− {}% ({}), saves {}",
                        self.duration.discount, self.duration.label, duration_saving
                    ),
                    amounts.with_duration,
                ),
                step(
                    "swat_discount",
                    format!(
                        "− {}% team discount, saves {}",
                        swat_percentage.normalize(),
                        team_saving
                    ),
                    amounts.with_swat,
                ),
                step("rounded", "nearest whole unit".to_owned(), amounts.base_rate),
            ],
        })
    }
}
