//! JSON API for the calculators, the currency table and quote delivery.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use ratecard_core::pricing::{CustomResourceSelection, SwatTeamSelection};
use ratecard_core::tables::TableWarning;
use ratecard_core::{
    build_quote, price_selection, ApplicationError, Currency, CurrencyCode, InterfaceError,
    LoadedTables, LookupTables, PricingSettings, QuoteRequest, RateBook, RateFeed, RateQuote,
    Selection,
};
use ratecard_db::repositories::{CurrencyRepository, QuoteRepository};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::bootstrap::Application;
use crate::delivery::deliver_quote;
use crate::mail::{QuoteEmailRenderer, QuoteMailer};
use crate::rates::refresh_and_persist;

#[derive(Clone)]
pub struct ApiState {
    pub tables: Arc<LoadedTables>,
    pub rate_book: RateBook,
    pub settings: PricingSettings,
    pub tracked: Arc<Vec<CurrencyCode>>,
    pub rate_feed: Arc<dyn RateFeed>,
    pub quotes: Arc<dyn QuoteRepository>,
    pub currencies: Arc<dyn CurrencyRepository>,
    pub renderer: Arc<QuoteEmailRenderer>,
    pub mailer: Arc<dyn QuoteMailer>,
}

impl ApiState {
    pub fn from_application(app: &Application) -> Self {
        Self {
            tables: app.tables.clone(),
            rate_book: app.rate_book.clone(),
            settings: app.config.pricing_settings(),
            tracked: Arc::new(app.config.tracked_currencies()),
            rate_feed: app.rate_feed.clone(),
            quotes: app.quotes.clone(),
            currencies: app.currencies.clone(),
            renderer: app.renderer.clone(),
            mailer: app.mailer.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    pub correlation_id: String,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

#[derive(Debug, Deserialize)]
pub struct CalculateRequest<S> {
    #[serde(flatten)]
    pub selection: S,
    /// Display currency; the reference currency when omitted.
    #[serde(default)]
    pub currency: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TablesResponse {
    pub tables: LookupTables,
    pub warnings: Vec<TableWarning>,
}

#[derive(Debug, Serialize)]
pub struct CurrenciesResponse {
    pub reference_currency: CurrencyCode,
    pub last_updated: Option<DateTime<Utc>>,
    pub currencies: Vec<Currency>,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    #[serde(flatten)]
    pub current: CurrenciesResponse,
    pub defaulted: Vec<CurrencyCode>,
    pub dropped: Vec<CurrencyCode>,
}

#[derive(Debug, Serialize)]
pub struct SendQuoteResponse {
    pub success: bool,
    pub message: String,
    pub quote_id: Option<i64>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/v1/tables", get(list_tables))
        .route("/api/v1/currencies", get(list_currencies))
        .route("/api/v1/currencies/refresh", post(refresh_currencies))
        .route("/api/v1/calculate/custom-resource", post(calculate_custom_resource))
        .route("/api/v1/calculate/swat-team", post(calculate_swat_team))
        .route("/api/v1/quotes/send", post(send_quote))
        .with_state(state)
}

fn correlation_id() -> String {
    format!("req-{}", Uuid::new_v4())
}

fn status_for(error: &InterfaceError) -> StatusCode {
    match error {
        InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Callers see the detail of their own mistakes; anything else gets the fixed message.
fn error_body(error: &InterfaceError) -> Json<ApiError> {
    let message = match error {
        InterfaceError::BadRequest { message, .. } => message.clone(),
        other => other.user_message().to_string(),
    };
    Json(ApiError { error: message, correlation_id: error.correlation_id().to_string() })
}

fn reject(error: ApplicationError, correlation_id: String) -> (StatusCode, Json<ApiError>) {
    let interface = error.into_interface(correlation_id);
    warn!(
        event_name = "api.request_rejected",
        correlation_id = %interface.correlation_id(),
        error = %interface,
        "request could not be served"
    );
    (status_for(&interface), error_body(&interface))
}

fn display_currency(requested: Option<&str>, settings: &PricingSettings) -> CurrencyCode {
    requested
        .map(CurrencyCode::new)
        .filter(|code| !code.as_str().is_empty())
        .unwrap_or_else(|| settings.reference_currency.clone())
}

fn current_currencies(state: &ApiState) -> CurrenciesResponse {
    let snapshot = state.rate_book.snapshot();
    CurrenciesResponse {
        reference_currency: snapshot.reference.clone(),
        last_updated: snapshot.last_updated,
        currencies: snapshot.apply_to(&state.tables.tables.currencies),
    }
}

async fn list_tables(State(state): State<ApiState>) -> Json<TablesResponse> {
    Json(TablesResponse {
        tables: state.tables.tables.clone(),
        warnings: state.tables.warnings.clone(),
    })
}

async fn list_currencies(State(state): State<ApiState>) -> Json<CurrenciesResponse> {
    Json(current_currencies(&state))
}

async fn refresh_currencies(State(state): State<ApiState>) -> ApiResult<RefreshResponse> {
    let correlation_id = correlation_id();
    let merged = refresh_and_persist(
        &state.rate_book,
        state.rate_feed.as_ref(),
        &state.tracked,
        state.currencies.as_ref(),
    )
    .await
    .map_err(|error| reject(error.into(), correlation_id.clone()))?;

    info!(
        event_name = "api.currencies.refreshed",
        correlation_id = %correlation_id,
        defaulted = merged.defaulted.len(),
        "exchange rates refreshed on request"
    );
    Ok(Json(RefreshResponse {
        current: current_currencies(&state),
        defaulted: merged.defaulted,
        dropped: merged.dropped,
    }))
}

fn calculate(state: &ApiState, selection: Selection, currency: Option<&str>) -> ApiResult<RateQuote> {
    let currency = display_currency(currency, &state.settings);
    let rates = state.rate_book.snapshot();
    price_selection(&selection, &currency, &state.tables.tables, &rates, &state.settings)
        .map(Json)
        .map_err(|error| reject(error, correlation_id()))
}

async fn calculate_custom_resource(
    State(state): State<ApiState>,
    Json(request): Json<CalculateRequest<CustomResourceSelection>>,
) -> ApiResult<RateQuote> {
    calculate(&state, Selection::CustomResource(request.selection), request.currency.as_deref())
}

async fn calculate_swat_team(
    State(state): State<ApiState>,
    Json(request): Json<CalculateRequest<SwatTeamSelection>>,
) -> ApiResult<RateQuote> {
    calculate(&state, Selection::SwatTeam(request.selection), request.currency.as_deref())
}

/// Everything but a caller mistake is reported as a 500 on this route.
async fn send_quote(
    State(state): State<ApiState>,
    Json(mut request): Json<QuoteRequest>,
) -> ApiResult<SendQuoteResponse> {
    let correlation_id = correlation_id();
    request.currency = display_currency(Some(request.currency.as_str()), &state.settings);

    let rates = state.rate_book.snapshot();
    let quote = build_quote(request, &state.tables.tables, &rates, &state.settings, Utc::now())
        .map_err(|error| reject(error, correlation_id.clone()))?;

    let receipt = deliver_quote(
        &quote,
        state.quotes.as_ref(),
        &state.renderer,
        state.mailer.as_ref(),
        &correlation_id,
    )
    .await
    .map_err(|delivery_error| {
        error!(
            event_name = "api.quote_send_failed",
            correlation_id = %correlation_id,
            error = %delivery_error,
            "quote could not be delivered"
        );
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiError {
                error: "Failed to send quote email. Please try again later.".to_string(),
                correlation_id: correlation_id.clone(),
            }),
        )
    })?;

    Ok(Json(SendQuoteResponse {
        success: true,
        message: format!("Quote sent to {}", receipt.recipient),
        quote_id: receipt.quote_id.map(|id| id.0),
    }))
}
