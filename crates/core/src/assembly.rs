//! Turns a selection into a priced, converted quote record.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::currency::{
    convert_with_fallback, format_currency, format_exchange_rate, Conversion, ExchangeRates,
};
use crate::domain::lookup::CurrencyCode;
use crate::domain::quote::{CalculatorType, Contact, QuoteRecord};
use crate::errors::{ApplicationError, DomainError};
use crate::pricing::{RateCalculation, RateTraceStep, ResolvedSelection, Selection};
use crate::tables::LookupTables;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PricingSettings {
    pub reference_currency: CurrencyCode,
    /// Fraction, 0.20 for 20%.
    pub swat_discount: Decimal,
}

/// Priced selection without contact details, as shown by the calculators.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateQuote {
    pub calculator_type: CalculatorType,
    pub computable: bool,
    pub missing: Vec<String>,
    pub base_rate: Decimal,
    pub final_rate: Decimal,
    pub currency: CurrencyCode,
    pub reference_currency: CurrencyCode,
    pub exchange_rate: Decimal,
    pub formatted_rate: String,
    pub steps: Vec<RateTraceStep>,
    pub warnings: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct QuoteRequest {
    pub selection: Selection,
    pub currency: CurrencyCode,
    pub contact: Contact,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AssembledQuote {
    pub record: QuoteRecord,
    pub calculation: RateCalculation,
    pub formatted_final_rate: String,
    pub formatted_base_rate: String,
    pub warnings: Vec<String>,
}

/// Prices `selection` and converts the result into `currency`.
///
/// An incomplete selection is not an error here: the quote comes back with a zero
/// rate, `computable == false` and the missing fields listed.
pub fn price_selection(
    selection: &Selection,
    currency: &CurrencyCode,
    tables: &LookupTables,
    rates: &ExchangeRates,
    settings: &PricingSettings,
) -> Result<RateQuote, ApplicationError> {
    let reference = &settings.reference_currency;
    let (calculation, missing) = match selection.resolve(tables) {
        Ok(resolved) => (resolved.calculation(settings.swat_discount)?, Vec::new()),
        Err(DomainError::IncompleteSelection { missing }) => (
            RateCalculation::incomplete(selection.calculator_type()),
            missing.into_iter().map(str::to_owned).collect(),
        ),
        Err(error) => return Err(error.into()),
    };

    let conversion = convert_with_fallback(calculation.base_rate, reference, currency, rates)?;

    Ok(RateQuote {
        calculator_type: calculation.calculator_type,
        computable: calculation.is_computable(),
        missing,
        base_rate: calculation.base_rate,
        final_rate: conversion.amount,
        currency: currency.clone(),
        reference_currency: reference.clone(),
        exchange_rate: conversion.exchange_rate,
        formatted_rate: format_currency(conversion.amount, currency, &tables.currencies),
        steps: calculation.steps,
        warnings: conversion.warning.into_iter().collect(),
    })
}

/// Packages already-computed results into a write-once quote record.
///
/// Labels are copied out of the resolved rows so the record never needs the tables
/// again.
#[allow(clippy::too_many_arguments)]
pub fn assemble(
    resolved: &ResolvedSelection<'_>,
    calculation: &RateCalculation,
    conversion: &Conversion,
    currency: CurrencyCode,
    reference_currency: CurrencyCode,
    contact: Contact,
    message: Option<String>,
    created_at: DateTime<Utc>,
) -> QuoteRecord {
    QuoteRecord {
        id: None,
        calculator_type: resolved.calculator_type(),
        contact,
        selection: resolved.ids(),
        labels: resolved.labels(),
        currency,
        reference_currency,
        base_rate: calculation.base_rate,
        final_rate: conversion.amount,
        exchange_rate: conversion.exchange_rate,
        message: message.map(|text| text.trim().to_owned()).filter(|text| !text.is_empty()),
        created_at,
    }
}

/// Validates the request, prices it and assembles the record.
///
/// Unlike [`price_selection`], a selection that cannot be priced is rejected: no quote
/// is ever built from a zero rate.
pub fn build_quote(
    request: QuoteRequest,
    tables: &LookupTables,
    rates: &ExchangeRates,
    settings: &PricingSettings,
    created_at: DateTime<Utc>,
) -> Result<AssembledQuote, ApplicationError> {
    request.contact.validate()?;

    let resolved = request.selection.resolve(tables)?;
    let calculation = resolved.calculation(settings.swat_discount)?;
    if !calculation.is_computable() {
        return Err(DomainError::InvariantViolation(format!(
            "{} selection prices to zero and cannot be quoted",
            calculation.calculator_type.label()
        ))
        .into());
    }

    let reference = settings.reference_currency.clone();
    let conversion =
        convert_with_fallback(calculation.base_rate, &reference, &request.currency, rates)?;

    let record = assemble(
        &resolved,
        &calculation,
        &conversion,
        request.currency,
        reference,
        Contact {
            email: request.contact.email.trim().to_owned(),
            name: request.contact.name.trim().to_owned(),
            company: request
                .contact
                .company
                .map(|company| company.trim().to_owned())
                .filter(|company| !company.is_empty()),
        },
        request.message,
        created_at,
    );

    Ok(AssembledQuote {
        formatted_final_rate: format_currency(record.final_rate, &record.currency, &tables.currencies),
        formatted_base_rate: format_currency(
            record.base_rate,
            &record.reference_currency,
            &tables.currencies,
        ),
        record,
        calculation,
        warnings: conversion.warning.into_iter().collect(),
    })
}

impl AssembledQuote {
    /// Plain-text summary, one line per fact, in the order the email shows them.
    pub fn summary_lines(&self, validity_days: u32) -> Vec<String> {
        let record = &self.record;
        let mut lines = vec![
            format!("Calculator: {}", record.calculator_type.label()),
            format!("Role: {}", record.labels.role),
            format!("Seniority: {}", record.labels.seniority),
        ];
        if let Some(region) = &record.labels.region {
            lines.push(format!("Region: {region}"));
        }
        if let Some(workload) = &record.labels.workload {
            lines.push(format!("Workload: {workload}"));
        }
        if let Some(duration) = &record.labels.duration {
            lines.push(format!("Duration: {duration}"));
        }
        lines.push(format!("Currency: {}", record.currency));
        lines.push(format!("Monthly rate: {}", self.formatted_final_rate));
        if record.is_converted() {
            lines.push(format!("Base rate: {}", self.formatted_base_rate));
            lines.push(format!(
                "Exchange rate: 1 {} = {} {}",
                record.reference_currency,
                format_exchange_rate(record.exchange_rate),
                record.currency
            ));
        }
        lines.push(format!("Client: {} <{}>", record.contact.name, record.contact.email));
        if let Some(company) = &record.contact.company {
            lines.push(format!("Company: {company}"));
        }
        if let Some(message) = &record.message {
            lines.push(format!("Message: {message}"));
        }
        lines.push(format!("This quote is valid for {validity_days} days."));
        lines
    }
}
