pub mod assembly;
pub mod config;
pub mod currency;
pub mod domain;
pub mod errors;
pub mod pricing;
pub mod tables;

pub use assembly::{build_quote, price_selection, AssembledQuote, PricingSettings, QuoteRequest, RateQuote};
pub use currency::{
    convert, convert_with_fallback, format_currency, format_exchange_rate, ExchangeRates, RateBook,
    RateFeed,
};
pub use domain::lookup::{
    Currency, CurrencyCode, DurationOption, Region, Role, SeniorityLevel, WorkloadOption,
};
pub use domain::quote::{CalculatorType, Contact, QuoteId, QuoteRecord};
pub use errors::{
    ApplicationError, CurrencyError, DeliveryError, DomainError, InterfaceError, LookupError,
};
pub use pricing::{
    calculate_custom_resource_rate, calculate_swat_team_rate, CustomResourceSelection,
    RateCalculation, Selection, SwatTeamSelection, DEFAULT_SWAT_DISCOUNT,
};
pub use tables::{FallbackLookupSource, LoadedTables, LookupSource, LookupTables, StaticLookupSource, TableName};
