use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use ratecard_core::RateBook;
use ratecard_db::DbPool;
use serde::Serialize;

#[derive(Clone)]
pub struct HealthState {
    db_pool: DbPool,
    rate_book: RateBook,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub database: HealthCheck,
    pub exchange_rates: HealthCheck,
    pub checked_at: String,
}

pub fn router(db_pool: DbPool, rate_book: RateBook) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { db_pool, rate_book })
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let database = database_check(&state.db_pool).await;
    let ready = database.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "ratecard-server runtime initialized".to_string(),
        },
        database,
        exchange_rates: rates_check(&state.rate_book),
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn database_check(pool: &DbPool) -> HealthCheck {
    match sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(pool).await {
        Ok(_) => HealthCheck { status: "ready", detail: "database query succeeded".to_string() },
        Err(error) => {
            HealthCheck { status: "degraded", detail: format!("database query failed: {error}") }
        }
    }
}

// Default rates still price correctly, so a stale snapshot never fails the check.
fn rates_check(book: &RateBook) -> HealthCheck {
    let snapshot = book.snapshot();
    match snapshot.last_updated {
        Some(updated) => HealthCheck {
            status: "ready",
            detail: format!(
                "{} rates against {}, updated {}",
                snapshot.rates.len(),
                snapshot.reference,
                updated.to_rfc3339()
            ),
        },
        None => HealthCheck {
            status: "defaults",
            detail: format!(
                "{} default rates against {}, never refreshed",
                snapshot.rates.len(),
                snapshot.reference
            ),
        },
    }
}

#[cfg(test)]
mod tests {
    use axum::{extract::State, http::StatusCode, Json};
    use chrono::Utc;
    use ratecard_core::{ExchangeRates, RateBook};
    use ratecard_db::connect_with_settings;

    use crate::health::{health, HealthState};

    #[tokio::test]
    async fn health_returns_ready_when_database_is_reachable() {
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("pool should connect");
        let rate_book = RateBook::new(ExchangeRates::defaults());

        let (status, Json(payload)) =
            health(State(HealthState { db_pool: pool.clone(), rate_book })).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.status, "ready");
        assert_eq!(payload.database.status, "ready");
        assert_eq!(payload.exchange_rates.status, "defaults");

        pool.close().await;
    }

    #[tokio::test]
    async fn health_reports_refreshed_rates() {
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("pool should connect");
        let mut rates = ExchangeRates::defaults();
        rates.last_updated = Some(Utc::now());

        let (_, Json(payload)) =
            health(State(HealthState { db_pool: pool, rate_book: RateBook::new(rates) })).await;

        assert_eq!(payload.exchange_rates.status, "ready");
        assert!(payload.exchange_rates.detail.starts_with("5 rates against AED"));
    }

    #[tokio::test]
    async fn health_returns_service_unavailable_when_database_is_unavailable() {
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("pool should connect");
        pool.close().await;

        let (status, Json(payload)) = health(State(HealthState {
            db_pool: pool,
            rate_book: RateBook::new(ExchangeRates::defaults()),
        }))
        .await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(payload.status, "degraded");
        assert_eq!(payload.database.status, "degraded");
        assert_eq!(payload.service.status, "ready");
    }
}
