// =============================================================================
// REST API Endpoints — Axum 0.7
// =============================================================================
//
// All endpoints live under `/api/v1/`.  Health is public; everything else
// requires a valid Bearer token checked via the `AuthBearer` extractor.
//
// A scan runs the full pipeline on a blocking worker and replaces the current
// snapshot.  Records in the batch are decoded one by one, so a malformed record
// becomes a diagnostic rather than a rejected request.  Read endpoints serve
// slices of the latest snapshot.
//
// CORS is configured permissively for development.
// =============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::api::auth::AuthBearer;
use crate::app_state::AppState;
use crate::pipeline::{run_scan, ScanInput};

// =============================================================================
// Router construction
// =============================================================================

/// Build the full REST API router with CORS middleware and shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // ── Public ──────────────────────────────────────────────────
        .route("/api/v1/health", get(health))
        // ── Authenticated ───────────────────────────────────────────
        .route("/api/v1/scan", post(scan))
        .route("/api/v1/report", get(report))
        .route("/api/v1/recommendations/:symbol", get(recommendation))
        .route("/api/v1/option-chain/:symbol", get(option_chain))
        .route("/api/v1/lot-sizes", get(lot_sizes))
        // ── Middleware & State ───────────────────────────────────────
        .layer(cors)
        .with_state(state)
}

fn not_found(message: String) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "error": message })),
    )
        .into_response()
}

// =============================================================================
// Health (public)
// =============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    state_version: u64,
    server_time: i64,
    uptime_secs: u64,
    lot_sizes: usize,
    has_scan: bool,
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let resp = HealthResponse {
        status: "ok",
        state_version: state.current_state_version(),
        server_time: chrono::Utc::now().timestamp_millis(),
        uptime_secs: state.uptime_secs(),
        lot_sizes: state.runtime_config.lot_sizes.len(),
        has_scan: state.latest_scan().is_some(),
    };
    Json(resp)
}

// =============================================================================
// Scan (authenticated)
// =============================================================================

async fn scan(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
    Json(input): Json<ScanInput>,
) -> Response {
    let config = state.config_snapshot();
    info!(
        futures_records = input.futures.len(),
        option_contracts = input.options.len(),
        "scan requested"
    );

    let joined = tokio::task::spawn_blocking(move || run_scan(&input, &config)).await;

    match joined {
        Ok(output) => {
            let snapshot = state.store_scan(output);
            Json(snapshot.as_ref().clone()).into_response()
        }
        Err(e) => {
            error!(error = %e, "scan worker failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "scan failed" })),
            )
                .into_response()
        }
    }
}

// =============================================================================
// Report views (authenticated)
// =============================================================================

async fn report(_auth: AuthBearer, State(state): State<Arc<AppState>>) -> Response {
    match state.latest_scan() {
        Some(snapshot) => Json(snapshot.as_ref().clone()).into_response(),
        None => not_found("no scan has been run yet".to_string()),
    }
}

async fn recommendation(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
) -> Response {
    let Some(snapshot) = state.latest_scan() else {
        return not_found("no scan has been run yet".to_string());
    };
    match snapshot.output.recommendation(&symbol) {
        Some(rec) => Json(rec.clone()).into_response(),
        None => not_found(format!("no recommendation for {symbol}")),
    }
}

async fn option_chain(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
) -> Response {
    let Some(snapshot) = state.latest_scan() else {
        return not_found("no scan has been run yet".to_string());
    };
    match snapshot.output.option_chain(&symbol) {
        Some(analysis) => Json(analysis.clone()).into_response(),
        None => not_found(format!("no option chain for {symbol}")),
    }
}

async fn lot_sizes(_auth: AuthBearer, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let sorted: BTreeMap<String, u32> = state
        .runtime_config
        .lot_sizes
        .as_map()
        .iter()
        .map(|(symbol, lot)| (symbol.clone(), *lot))
        .collect();
    Json(sorted)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime_config::{LotSizeTable, RuntimeConfig};
    use axum::body::Body;
    use axum::http::Request;
    use std::collections::HashMap;
    use tower::ServiceExt;

    const TOKEN: &str = "test-admin-token";

    fn app() -> Router {
        std::env::set_var(crate::api::auth::ADMIN_TOKEN_ENV, TOKEN);
        let mut lots = HashMap::new();
        lots.insert("ABC".to_string(), 100);
        let config = RuntimeConfig {
            lot_sizes: LotSizeTable::new(lots),
            ..RuntimeConfig::default()
        };
        router(Arc::new(AppState::new(config)))
    }

    fn authed(method: &str, uri: &str, body: Body) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("authorization", format!("Bearer {TOKEN}"))
            .header("content-type", "application/json")
            .body(body)
            .unwrap()
    }

    async fn json_body(resp: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn abc_scan_body() -> Body {
        let mut options = Vec::new();
        for (i, strike) in [96.0, 98.0, 100.0, 102.0, 104.0, 106.0].iter().enumerate() {
            options.push(serde_json::json!({
                "symbol": "ABC", "expiry": "MAR", "option_type": "CE", "strike": strike,
                "premium": 6.0 - i as f64, "open_interest": 100.0, "volume": 10.0, "underlying": 101.0
            }));
            options.push(serde_json::json!({
                "symbol": "ABC", "expiry": "MAR", "option_type": "PE", "strike": strike,
                "premium": 1.0 + i as f64, "open_interest": 130.0, "volume": 10.0, "underlying": 101.0
            }));
        }
        let body = serde_json::json!({
            "futures": [
                {"symbol": "ABC", "date": "2025-03-03", "close": 100.0, "open_interest": 1000.0, "volume": 500000.0},
                {"symbol": "ABC", "date": "2025-03-04", "close": 102.0, "open_interest": 1100.0, "volume": 900000.0}
            ],
            "options": options,
        });
        Body::from(body.to_string())
    }

    #[tokio::test]
    async fn health_is_public() {
        let resp = app()
            .oneshot(Request::builder().uri("/api/v1/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = json_body(resp).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["has_scan"], false);
    }

    #[tokio::test]
    async fn report_requires_token() {
        let resp = app()
            .oneshot(Request::builder().uri("/api/v1/report").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let resp = app()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/report")
                    .header("authorization", "Bearer wrong")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn report_before_scan_is_not_found() {
        let resp = app()
            .oneshot(authed("GET", "/api/v1/report", Body::empty()))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn scan_then_read_views() {
        let app = app();

        let resp = app
            .clone()
            .oneshot(authed("POST", "/api/v1/scan", abc_scan_body()))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = json_body(resp).await;
        assert_eq!(json["state_version"], 2);
        assert_eq!(json["recommendations"][0]["strategy"]["kind"], "bull_call_spread");

        let resp = app
            .clone()
            .oneshot(authed("GET", "/api/v1/recommendations/abc", Body::empty()))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = json_body(resp).await;
        assert_eq!(json["symbol"], "ABC");
        assert_eq!(json["lot_size"], 100);

        let resp = app
            .clone()
            .oneshot(authed("GET", "/api/v1/option-chain/ABC", Body::empty()))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = json_body(resp).await;
        assert_eq!(json["ledger"].as_array().unwrap().len(), 6);

        let resp = app
            .clone()
            .oneshot(authed("GET", "/api/v1/recommendations/NOPE", Body::empty()))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn malformed_record_is_skipped_not_rejected() {
        let mut body: serde_json::Value = serde_json::from_slice(
            &axum::body::to_bytes(abc_scan_body(), usize::MAX).await.unwrap(),
        )
        .unwrap();
        body["options"]
            .as_array_mut()
            .unwrap()
            .push(serde_json::json!({"expiry": "MAR", "option_type": "PE", "premium": 1.0}));

        let resp = app()
            .oneshot(authed("POST", "/api/v1/scan", Body::from(body.to_string())))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = json_body(resp).await;
        let diagnostics = json["diagnostics"].as_array().unwrap();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0]["kind"], "INVALID_RECORD");
        assert_eq!(json["recommendations"][0]["strategy"]["kind"], "bull_call_spread");
    }

    #[tokio::test]
    async fn lot_sizes_lists_table() {
        let resp = app()
            .oneshot(authed("GET", "/api/v1/lot-sizes", Body::empty()))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = json_body(resp).await;
        assert_eq!(json["ABC"], 100);
    }
}
