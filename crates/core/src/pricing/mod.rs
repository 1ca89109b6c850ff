pub mod custom_resource;
pub mod swat_team;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::domain::quote::{CalculatorType, QuoteLabels, QuoteSelectionIds};
use crate::errors::DomainError;
use crate::tables::LookupTables;

pub use custom_resource::{
    calculate_custom_resource_rate, custom_resource_rate, CustomResourceSelection,
    ResolvedCustomResource,
};
pub use swat_team::{
    calculate_swat_team_rate, swat_team_rate, ResolvedSwatTeam, SwatTeamSelection,
};

/// Pre-negotiated team discount applied to every SWAT engagement (20%).
pub const DEFAULT_SWAT_DISCOUNT: Decimal = Decimal::from_parts(20, 0, 0, false, 2);

/// Rounds to whole reference-currency units, halves away from zero.
pub fn round_to_unit(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
}

/// Rounds to cents, halves away from zero.
pub fn round_to_cents(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// `left × right`, or `RateOverflow` naming the step whose product left the decimal range.
pub(crate) fn multiply(
    stage: &'static str,
    left: Decimal,
    right: Decimal,
) -> Result<Decimal, DomainError> {
    left.checked_mul(right).ok_or(DomainError::RateOverflow { stage })
}

/// `percentage`% of `value`, rounded to whole units.
pub fn calculate_percentage(value: Decimal, percentage: Decimal) -> Result<Decimal, DomainError> {
    multiply("percentage", value, percentage / Decimal::ONE_HUNDRED).map(round_to_unit)
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateTraceStep {
    pub stage: String,
    pub detail: String,
    pub amount: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateCalculation {
    pub calculator_type: CalculatorType,
    pub base_rate: Decimal,
    pub steps: Vec<RateTraceStep>,
}

impl RateCalculation {
    /// Result for a selection that cannot be priced yet.
    pub fn incomplete(calculator_type: CalculatorType) -> Self {
        Self { calculator_type, base_rate: Decimal::ZERO, steps: Vec::new() }
    }

    pub fn is_computable(&self) -> bool {
        self.base_rate > Decimal::ZERO
    }
}

fn step(stage: &str, detail: String, amount: Decimal) -> RateTraceStep {
    RateTraceStep { stage: stage.to_owned(), detail, amount }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "calculator_type", rename_all = "snake_case")]
pub enum Selection {
    CustomResource(CustomResourceSelection),
    SwatTeam(SwatTeamSelection),
}

impl Selection {
    pub fn calculator_type(&self) -> CalculatorType {
        match self {
            Self::CustomResource(_) => CalculatorType::CustomResource,
            Self::SwatTeam(_) => CalculatorType::SwatTeam,
        }
    }

    pub fn resolve<'a>(&self, tables: &'a LookupTables) -> Result<ResolvedSelection<'a>, DomainError> {
        match self {
            Self::CustomResource(selection) => {
                selection.resolve(tables).map(ResolvedSelection::CustomResource)
            }
            Self::SwatTeam(selection) => selection.resolve(tables).map(ResolvedSelection::SwatTeam),
        }
    }

    /// Base rate for this selection, zero when any identifier is unresolved or the
    /// factors multiply past the decimal range.
    pub fn calculate(&self, tables: &LookupTables, swat_discount: Decimal) -> RateCalculation {
        self.resolve(tables)
            .and_then(|resolved| resolved.calculation(swat_discount))
            .unwrap_or_else(|_| RateCalculation::incomplete(self.calculator_type()))
    }
}

/// A selection whose identifiers all resolved against one table snapshot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResolvedSelection<'a> {
    CustomResource(ResolvedCustomResource<'a>),
    SwatTeam(ResolvedSwatTeam<'a>),
}

impl ResolvedSelection<'_> {
    pub fn calculator_type(&self) -> CalculatorType {
        match self {
            Self::CustomResource(_) => CalculatorType::CustomResource,
            Self::SwatTeam(_) => CalculatorType::SwatTeam,
        }
    }

    pub fn calculation(&self, swat_discount: Decimal) -> Result<RateCalculation, DomainError> {
        match self {
            Self::CustomResource(resolved) => resolved.calculation(),
            Self::SwatTeam(resolved) => resolved.calculation(swat_discount),
        }
    }

    pub fn ids(&self) -> QuoteSelectionIds {
        match self {
            Self::CustomResource(resolved) => QuoteSelectionIds {
                role_id: resolved.role.id.clone(),
                seniority_id: resolved.seniority.id.clone(),
                region_id: Some(resolved.region.id.clone()),
                workload_id: None,
                duration_id: None,
            },
            Self::SwatTeam(resolved) => QuoteSelectionIds {
                role_id: resolved.role.id.clone(),
                seniority_id: resolved.seniority.id.clone(),
                region_id: None,
                workload_id: Some(resolved.workload.id.clone()),
                duration_id: Some(resolved.duration.id.clone()),
            },
        }
    }

    pub fn labels(&self) -> QuoteLabels {
        match self {
            Self::CustomResource(resolved) => QuoteLabels {
                role: resolved.role.name.clone(),
                seniority: resolved.seniority.name.clone(),
                region: Some(resolved.region.name.clone()),
                workload: None,
                duration: None,
            },
            Self::SwatTeam(resolved) => QuoteLabels {
                role: resolved.role.name.clone(),
                seniority: resolved.seniority.name.clone(),
                region: None,
                workload: Some(resolved.workload.label.clone()),
                duration: Some(resolved.duration.label.clone()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{
        calculate_percentage, round_to_cents, round_to_unit, CustomResourceSelection, Selection,
        SwatTeamSelection, DEFAULT_SWAT_DISCOUNT,
    };
    use crate::errors::DomainError;
    use crate::domain::quote::CalculatorType;
    use crate::tables::LookupTables;

    #[test]
    fn rounding_takes_halves_away_from_zero() {
        assert_eq!(round_to_unit(Decimal::new(145, 1)), Decimal::from(15));
        assert_eq!(round_to_unit(Decimal::new(155, 1)), Decimal::from(16));
        assert_eq!(round_to_unit(Decimal::new(1449, 2)), Decimal::from(14));
        assert_eq!(round_to_cents(Decimal::new(10005, 3)), Decimal::new(1001, 2));
        assert_eq!(round_to_cents(Decimal::new(38812500, 4)), Decimal::new(388125, 2));
    }

    #[test]
    fn default_swat_discount_is_twenty_percent() {
        assert_eq!(DEFAULT_SWAT_DISCOUNT, Decimal::new(2, 1));
    }

    #[test]
    fn percentage_helper_rounds_to_units() {
        assert_eq!(calculate_percentage(Decimal::from(9_999), Decimal::from(40)), Ok(Decimal::from(4_000)));
        assert_eq!(calculate_percentage(Decimal::from(9_500), Decimal::from(10)), Ok(Decimal::from(950)));
        assert_eq!(
            calculate_percentage(Decimal::MAX, Decimal::from(200)),
            Err(DomainError::RateOverflow { stage: "percentage" })
        );
    }

    #[test]
    fn overflowing_factors_price_to_zero_instead_of_panicking() {
        let mut tables = LookupTables::defaults();
        for role in &mut tables.roles {
            role.base_rate = Decimal::MAX;
        }
        let custom = Selection::CustomResource(CustomResourceSelection {
            region_id: "north-america".to_owned(),
            role_id: "devops-engineer".to_owned(),
            seniority_id: "expert".to_owned(),
        });

        let resolved = custom.resolve(&tables).expect("identifiers resolve");
        assert_eq!(
            resolved.calculation(DEFAULT_SWAT_DISCOUNT),
            Err(DomainError::RateOverflow { stage: "region" })
        );
        assert!(!custom.calculate(&tables, DEFAULT_SWAT_DISCOUNT).is_computable());
    }

    #[test]
    fn selection_dispatches_to_the_matching_calculator() {
        let tables = LookupTables::defaults();

        let custom = Selection::CustomResource(CustomResourceSelection {
            region_id: "middle-east".to_owned(),
            role_id: "full-stack-developer".to_owned(),
            seniority_id: "advanced".to_owned(),
        });
        let calculation = custom.calculate(&tables, DEFAULT_SWAT_DISCOUNT);
        assert_eq!(calculation.calculator_type, CalculatorType::CustomResource);
        assert_eq!(calculation.base_rate, Decimal::from(14_375));

        let swat = Selection::SwatTeam(SwatTeamSelection {
            role_id: "backend-developer".to_owned(),
            seniority_id: "advanced".to_owned(),
            workload_id: "4-days".to_owned(),
            duration_id: "3-months".to_owned(),
        });
        let calculation = swat.calculate(&tables, DEFAULT_SWAT_DISCOUNT);
        assert_eq!(calculation.calculator_type, CalculatorType::SwatTeam);
        assert_eq!(calculation.base_rate, Decimal::from(6_840));
        assert!(calculation.is_computable());
    }

    #[test]
    fn incomplete_selection_yields_zero_without_steps() {
        let tables = LookupTables::defaults();
        let swat = Selection::SwatTeam(SwatTeamSelection {
            role_id: "backend-developer".to_owned(),
            seniority_id: String::new(),
            workload_id: "4-days".to_owned(),
            duration_id: "3-months".to_owned(),
        });

        let calculation = swat.calculate(&tables, DEFAULT_SWAT_DISCOUNT);
        assert_eq!(calculation.base_rate, Decimal::ZERO);
        assert!(calculation.steps.is_empty());
        assert!(!calculation.is_computable());
    }

    #[test]
    fn selection_deserializes_from_tagged_json() {
        let selection: Selection = serde_json::from_str(
            r#"{"calculator_type":"custom_resource","region_id":"europe","role_id":"ui-ux-designer","seniority_id":"expert"}"#,
        )
        .expect("tagged selection");

        assert_eq!(selection.calculator_type(), CalculatorType::CustomResource);
    }
}
