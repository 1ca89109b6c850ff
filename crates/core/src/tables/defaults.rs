//! Built-in reference data.
//!
//! These rows seed a fresh database and stand in for any table the store cannot
//! serve. Each list is already in display order.

use rust_decimal::Decimal;

use crate::domain::lookup::{
    Currency, CurrencyCode, DurationId, DurationOption, Region, RegionId, Role, RoleId,
    SeniorityId, SeniorityLevel, WorkloadId, WorkloadOption,
};

pub const REFERENCE_CURRENCY: &str = "AED";

pub fn regions() -> Vec<Region> {
    [
        ("euro-asia", "Euro Asia", Decimal::new(100, 2)),
        ("europe", "Europe", Decimal::new(130, 2)),
        ("middle-east", "Middle East", Decimal::new(115, 2)),
        ("north-america", "North America", Decimal::new(140, 2)),
    ]
    .into_iter()
    .map(|(id, name, multiplier)| Region {
        id: RegionId(id.to_owned()),
        name: name.to_owned(),
        multiplier,
    })
    .collect()
}

pub fn roles() -> Vec<Role> {
    [
        ("backend-developer", "Backend Developer", 9_500),
        ("business-analyst", "Business Analyst", 9_000),
        ("database-developer", "Database Developer", 8_000),
        ("devops-engineer", "DevOps Engineer", 11_000),
        ("frontend-developer", "Frontend Developer", 9_000),
        ("full-stack-developer", "Full Stack Developer", 10_000),
        ("mobile-developer", "Mobile Developer", 9_500),
        ("project-manager", "Project Manager", 12_000),
        ("quality-assurance", "Quality Assurance", 7_000),
        ("ui-ux-designer", "UI/UX Designer", 8_500),
    ]
    .into_iter()
    .map(|(id, name, base_rate)| Role {
        id: RoleId(id.to_owned()),
        name: name.to_owned(),
        base_rate: Decimal::from(base_rate),
        category: None,
    })
    .collect()
}

pub fn seniority_levels() -> Vec<SeniorityLevel> {
    [
        ("intermediate", "Intermediate", Decimal::new(100, 2)),
        ("advanced", "Advanced", Decimal::new(125, 2)),
        ("expert", "Expert", Decimal::new(160, 2)),
    ]
    .into_iter()
    .map(|(id, name, multiplier)| SeniorityLevel {
        id: SeniorityId(id.to_owned()),
        name: name.to_owned(),
        multiplier,
    })
    .collect()
}

pub fn workload_options() -> Vec<WorkloadOption> {
    [
        ("2-days", "2 days/week (40%)", 40),
        ("3-days", "3 days/week (60%)", 60),
        ("4-days", "4 days/week (80%)", 80),
        ("full-time", "Full-time (100%)", 100),
    ]
    .into_iter()
    .map(|(id, label, percentage)| WorkloadOption {
        id: WorkloadId(id.to_owned()),
        label: label.to_owned(),
        percentage: Decimal::from(percentage),
    })
    .collect()
}

pub fn duration_options() -> Vec<DurationOption> {
    [
        ("1-month", "1 month", 1, 0),
        ("2-months", "2 months", 2, 5),
        ("3-months", "3 months", 3, 10),
        ("4-months", "4 months", 4, 15),
        ("6-months", "6 months", 6, 15),
        ("12-months", "12 months", 12, 15),
    ]
    .into_iter()
    .map(|(id, label, months, discount)| DurationOption {
        id: DurationId(id.to_owned()),
        label: label.to_owned(),
        months,
        discount: Decimal::from(discount),
    })
    .collect()
}

pub fn currencies() -> Vec<Currency> {
    [
        ("AED", "UAE Dirham", "د.إ", Decimal::ONE),
        ("EUR", "Euro", "€", Decimal::new(25, 2)),
        ("GBP", "British Pound", "£", Decimal::new(21, 2)),
        ("PKR", "Pakistani Rupee", "₨", Decimal::new(765, 1)),
        ("USD", "US Dollar", "$", Decimal::new(27, 2)),
    ]
    .into_iter()
    .map(|(code, name, symbol, exchange_rate)| Currency {
        code: CurrencyCode::new(code),
        name: name.to_owned(),
        symbol: symbol.to_owned(),
        exchange_rate,
        last_updated: None,
    })
    .collect()
}

/// Default rate for a tracked currency, used when a feed omits it.
pub fn default_rate(code: &CurrencyCode) -> Option<Decimal> {
    currencies().into_iter().find(|currency| &currency.code == code).map(|c| c.exchange_rate)
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{default_rate, duration_options, regions, seniority_levels};
    use crate::domain::lookup::CurrencyCode;

    #[test]
    fn tables_are_in_display_order() {
        let names: Vec<_> = regions().into_iter().map(|region| region.name).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);

        let multipliers: Vec<_> =
            seniority_levels().into_iter().map(|level| level.multiplier).collect();
        assert!(multipliers.windows(2).all(|pair| pair[0] <= pair[1]));

        let months: Vec<_> = duration_options().into_iter().map(|option| option.months).collect();
        assert!(months.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn default_rates_cover_tracked_currencies() {
        assert_eq!(default_rate(&CurrencyCode::new("PKR")), Some(Decimal::new(765, 1)));
        assert_eq!(default_rate(&CurrencyCode::new("AED")), Some(Decimal::ONE));
        assert_eq!(default_rate(&CurrencyCode::new("JPY")), None);
    }
}
