use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::lookup::{Region, Role, SeniorityLevel};
use crate::domain::quote::CalculatorType;
use crate::errors::DomainError;
use crate::pricing::{multiply, round_to_unit, step, RateCalculation};
use crate::tables::LookupTables;

/// Raw identifiers as chosen by the caller; any of them may still be blank.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomResourceSelection {
    pub region_id: String,
    pub role_id: String,
    pub seniority_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedCustomResource<'a> {
    pub region: &'a Region,
    pub role: &'a Role,
    pub seniority: &'a SeniorityLevel,
}

/// `round(base rate × regional multiplier × seniority multiplier)`
pub fn custom_resource_rate(
    base_rate: Decimal,
    regional_multiplier: Decimal,
    seniority_multiplier: Decimal,
) -> Result<Decimal, DomainError> {
    let with_region = multiply("region", base_rate, regional_multiplier)?;
    multiply("seniority", with_region, seniority_multiplier).map(round_to_unit)
}

/// Monthly base rate for the selection, or zero while the selection is incomplete
/// or cannot be priced.
pub fn calculate_custom_resource_rate(
    selection: &CustomResourceSelection,
    tables: &LookupTables,
) -> Decimal {
    selection.resolve(tables).and_then(|resolved| resolved.base_rate()).unwrap_or(Decimal::ZERO)
}

impl CustomResourceSelection {
    pub fn resolve<'a>(
        &self,
        tables: &'a LookupTables,
    ) -> Result<ResolvedCustomResource<'a>, DomainError> {
        let region = tables.region(&self.region_id);
        let role = tables.role(&self.role_id);
        let seniority = tables.seniority(&self.seniority_id);

        match (region, role, seniority) {
            (Some(region), Some(role), Some(seniority)) => {
                Ok(ResolvedCustomResource { region, role, seniority })
            }
            _ => {
                let missing = [
                    ("region", region.is_none()),
                    ("role", role.is_none()),
                    ("seniority", seniority.is_none()),
                ]
                .into_iter()
                .filter_map(|(field, absent)| absent.then_some(field))
                .collect();
                Err(DomainError::IncompleteSelection { missing })
            }
        }
    }
}

impl ResolvedCustomResource<'_> {
    pub fn base_rate(&self) -> Result<Decimal, DomainError> {
        custom_resource_rate(self.role.base_rate, self.region.multiplier, self.seniority.multiplier)
    }

    pub fn calculation(&self) -> Result<RateCalculation, DomainError> {
        let with_region = multiply("region", self.role.base_rate, self.region.multiplier)?;
        let with_seniority = multiply("seniority", with_region, self.seniority.multiplier)?;
        let base_rate = round_to_unit(with_seniority);

        Ok(RateCalculation {
            calculator_type: CalculatorType::CustomResource,
            base_rate,
            steps: vec![
                step("role", format!("{} base rate", self.role.name), self.role.base_rate),
                step(
                    "region",
                    format!("× {} ({})", self.region.multiplier, self.region.name),
                    with_region,
                ),
                step(
                    "seniority",
                    format!("× {} ({})", self.seniority.multiplier, self.seniority.name),
                    with_seniority,
                ),
                step("rounded", "nearest whole unit".to_owned(), base_rate),
            ],
        })
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{calculate_custom_resource_rate, custom_resource_rate, CustomResourceSelection};
    use crate::errors::DomainError;
    use crate::tables::LookupTables;

    fn selection(region: &str, role: &str, seniority: &str) -> CustomResourceSelection {
        CustomResourceSelection {
            region_id: region.to_owned(),
            role_id: role.to_owned(),
            seniority_id: seniority.to_owned(),
        }
    }

    #[test]
    fn formula_multiplies_then_rounds_once() {
        let rate = custom_resource_rate(
            Decimal::from(10_000),
            Decimal::new(115, 2),
            Decimal::new(125, 2),
        );
        assert_eq!(rate, Ok(Decimal::from(14_375)));
    }

    #[test]
    fn products_past_the_decimal_range_are_errors() {
        assert_eq!(
            custom_resource_rate(Decimal::MAX, Decimal::new(14, 1), Decimal::ONE),
            Err(DomainError::RateOverflow { stage: "region" })
        );
        assert_eq!(
            custom_resource_rate(Decimal::MAX, Decimal::ONE, Decimal::new(16, 1)),
            Err(DomainError::RateOverflow { stage: "seniority" })
        );
    }

    #[test]
    fn resolves_every_factor_from_tables() {
        let tables = LookupTables::defaults();

        let rate = calculate_custom_resource_rate(
            &selection("north-america", "devops-engineer", "expert"),
            &tables,
        );
        // 11000 × 1.4 × 1.6 = 24640
        assert_eq!(rate, Decimal::from(24_640));

        let rate = calculate_custom_resource_rate(
            &selection("europe", "quality-assurance", "advanced"),
            &tables,
        );
        // 7000 × 1.3 × 1.25 = 11375
        assert_eq!(rate, Decimal::from(11_375));
    }

    #[test]
    fn fractional_products_round_to_nearest_unit() {
        let rate = custom_resource_rate(Decimal::from(8_500), Decimal::new(115, 2), Decimal::new(160, 2));
        // 8500 × 1.15 × 1.6 = 15640
        assert_eq!(rate, Ok(Decimal::from(15_640)));

        let rate = custom_resource_rate(Decimal::from(9_001), Decimal::new(115, 2), Decimal::new(125, 2));
        // 12938.9375
        assert_eq!(rate, Ok(Decimal::from(12_939)));
    }

    #[test]
    fn blank_or_unknown_identifiers_yield_zero() {
        let tables = LookupTables::defaults();

        for incomplete in [
            selection("", "backend-developer", "advanced"),
            selection("europe", "", "advanced"),
            selection("europe", "backend-developer", ""),
            selection("atlantis", "backend-developer", "advanced"),
            selection("europe", "backend-developer", "grandmaster"),
        ] {
            assert_eq!(calculate_custom_resource_rate(&incomplete, &tables), Decimal::ZERO);
        }
    }

    #[test]
    fn resolve_names_every_missing_field() {
        let tables = LookupTables::defaults();
        let error = selection("", "backend-developer", "grandmaster")
            .resolve(&tables)
            .expect_err("selection is incomplete");

        assert_eq!(error, DomainError::IncompleteSelection { missing: vec!["region", "seniority"] });
    }

    #[test]
    fn calculation_trace_ends_at_the_base_rate() {
        let tables = LookupTables::defaults();
        let resolved = selection("middle-east", "full-stack-developer", "advanced")
            .resolve(&tables)
            .expect("complete selection");

        let calculation = resolved.calculation().expect("in range");
        assert_eq!(Ok(calculation.base_rate), resolved.base_rate());
        assert_eq!(calculation.steps.len(), 4);
        assert_eq!(calculation.steps[1].amount, Decimal::from(11_500));
        assert_eq!(calculation.steps.last().map(|step| step.amount), Some(Decimal::from(14_375)));
    }
}
