use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use churnwatch_core::batch::{self, BatchOptions, BatchResult};
use churnwatch_core::domain::contract::EvaluationRequest;
use churnwatch_core::domain::{EvaluationError, RecommendationReport};
use churnwatch_core::engine::{RecommendationEngine, RuleSet};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = churnwatch_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    // Invalid rule table is fatal.
    let engine = match settings.build_engine(None) {
        Ok(engine) => engine,
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %e, "failed to load rule table");
            return Err(e);
        }
    };

    let state = AppState {
        engine,
        batch: BatchOptions::from_env(),
    };

    let app = router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/rules", get(get_rules))
        .route("/evaluate", post(evaluate))
        .route("/evaluate/batch", post(evaluate_batch))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Debug, Clone)]
struct AppState {
    engine: RecommendationEngine,
    batch: BatchOptions,
}

#[derive(Debug, Serialize)]
struct ApiError {
    error: String,
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<String>,
}

type ApiRejection = (StatusCode, Json<ApiError>);

#[derive(Debug, Serialize)]
struct ApiEvaluation {
    evaluation_id: Uuid,
    evaluated_at: DateTime<Utc>,
    customer_id: Option<String>,
    report: RecommendationReport,
}

#[derive(Debug, Deserialize)]
struct ApiBatchRequest {
    /// Shaped per item, so one malformed item fails alone.
    items: Vec<serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct ApiBatch {
    batch_id: Uuid,
    evaluated_at: DateTime<Utc>,
    #[serde(flatten)]
    result: BatchResult,
}

async fn get_rules(State(state): State<AppState>) -> Json<RuleSet> {
    Json(state.engine.rules().clone())
}

async fn evaluate(
    State(state): State<AppState>,
    payload: Result<Json<EvaluationRequest>, JsonRejection>,
) -> Result<Json<ApiEvaluation>, ApiRejection> {
    let Json(request) = payload.map_err(invalid_body)?;
    let input = request.validate_and_into_input().map_err(reject)?;
    let report = state.engine.evaluate(&input).map_err(reject)?;

    tracing::info!(
        customer_id = ?input.customer_id,
        tier = %report.tier,
        actions_len = report.actions.len(),
        "evaluated customer"
    );

    Ok(Json(ApiEvaluation {
        evaluation_id: Uuid::new_v4(),
        evaluated_at: Utc::now(),
        customer_id: input.customer_id,
        report,
    }))
}

async fn evaluate_batch(
    State(state): State<AppState>,
    payload: Result<Json<ApiBatchRequest>, JsonRejection>,
) -> Result<Json<ApiBatch>, ApiRejection> {
    let Json(request) = payload.map_err(invalid_body)?;
    if request.items.len() > state.batch.max_records {
        return Err((
            StatusCode::PAYLOAD_TOO_LARGE,
            Json(ApiError {
                error: format!(
                    "batch has {} records (max {})",
                    request.items.len(),
                    state.batch.max_records
                ),
                kind: "batch_too_large",
                field: None,
            }),
        ));
    }

    let result = batch::evaluate_batch(&state.engine, request.items, &state.batch).map_err(|e| {
        match e.downcast_ref::<EvaluationError>() {
            Some(err) => reject(err.clone()),
            None => {
                sentry_anyhow::capture_anyhow(&e);
                tracing::error!(error = %e, "batch evaluation failed");
                internal_error(format!("{e:#}"))
            }
        }
    })?;

    Ok(Json(ApiBatch {
        batch_id: Uuid::new_v4(),
        evaluated_at: Utc::now(),
        result,
    }))
}

fn reject(err: EvaluationError) -> ApiRejection {
    if err.is_input_error() {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ApiError {
                error: err.to_string(),
                kind: err.kind(),
                field: err.field().map(str::to_string),
            }),
        );
    }

    let kind = err.kind();
    let e = anyhow::Error::new(err);
    sentry_anyhow::capture_anyhow(&e);
    tracing::error!(error = %e, kind, "internal evaluation fault");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiError {
            error: e.to_string(),
            kind,
            field: None,
        }),
    )
}

/// Body that is not JSON or not shaped like the request; keeps axum's status code.
fn invalid_body(rejection: JsonRejection) -> ApiRejection {
    let err = EvaluationError::InvalidRequest {
        detail: rejection.body_text(),
    };
    tracing::warn!(status = %rejection.status(), error = %err, "rejected request body");
    (
        rejection.status(),
        Json(ApiError {
            error: err.to_string(),
            kind: err.kind(),
            field: None,
        }),
    )
}

fn internal_error(message: String) -> ApiRejection {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiError {
            error: message,
            kind: "internal",
            field: None,
        }),
    )
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &churnwatch_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::extract::FromRequest;
    use axum::http::Request;
    use churnwatch_core::domain::RiskTier;
    use serde_json::json;

    fn state() -> AppState {
        AppState {
            engine: RecommendationEngine::default(),
            batch: BatchOptions::default(),
        }
    }

    fn request(p: f64) -> EvaluationRequest {
        serde_json::from_value(body(p)).unwrap()
    }

    fn body(p: f64) -> serde_json::Value {
        json!({
            "customer_id": "C-1001",
            "churn_probability": p,
            "features": {
                "age": 25,
                "gender": "Male",
                "subscription_type": "Basic",
                "monthly_charges": 12.99,
                "tenure_in_months": 2,
                "login_frequency": 3,
                "last_login_days": 45,
                "watch_time": 2.5,
                "payment_failures": 2,
                "customer_support_calls": 4
            }
        })
    }

    async fn extract<T>(body: &serde_json::Value) -> Result<Json<T>, JsonRejection>
    where
        T: serde::de::DeserializeOwned,
    {
        let req = Request::builder()
            .method("POST")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        Json::<T>::from_request(req, &()).await
    }

    #[tokio::test]
    async fn evaluate_returns_report() {
        let Json(out) = evaluate(State(state()), Ok(Json(request(0.94)))).await.unwrap();
        assert_eq!(out.customer_id.as_deref(), Some("C-1001"));
        assert_eq!(out.report.tier, RiskTier::High);
        assert!(out.report.status.contains("94%"));
    }

    #[tokio::test]
    async fn evaluate_maps_input_errors_to_422() {
        let (status, Json(body)) = evaluate(State(state()), Ok(Json(request(1.4))))
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body.kind, "invalid_probability");

        let mut missing = request(0.5);
        missing.features.remove("age");
        let (status, Json(body)) = evaluate(State(state()), Ok(Json(missing))).await.unwrap_err();
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body.field.as_deref(), Some("age"));
    }

    #[tokio::test]
    async fn malformed_body_gets_json_error() {
        let mut no_probability = body(0.5);
        no_probability
            .as_object_mut()
            .unwrap()
            .remove("churn_probability");
        let payload = extract::<EvaluationRequest>(&no_probability).await;
        let (status, Json(err)) = evaluate(State(state()), payload).await.unwrap_err();
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.kind, "invalid_request");
        assert!(err.error.contains("churn_probability"));

        let value = serde_json::to_value(&err).unwrap();
        assert_eq!(value["kind"], "invalid_request");
        assert!(value["error"].is_string());
        assert!(value.get("field").is_none());

        let payload = extract::<ApiBatchRequest>(&json!({ "items": "nope" })).await;
        let (status, Json(err)) = evaluate_batch(State(state()), payload).await.unwrap_err();
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.kind, "invalid_request");
    }

    #[tokio::test]
    async fn null_feature_is_missing_feature() {
        let mut null_feature = body(0.5);
        null_feature["features"]["watch_time"] = serde_json::Value::Null;
        let payload = extract::<EvaluationRequest>(&null_feature).await;
        let (status, Json(err)) = evaluate(State(state()), payload).await.unwrap_err();
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.kind, "missing_feature");
        assert_eq!(err.field.as_deref(), Some("watch_time"));
    }

    #[tokio::test]
    async fn batch_reports_per_item_failures() {
        let mut bad = body(0.5);
        bad["features"].as_object_mut().unwrap().remove("gender");
        let mut malformed = body(0.5);
        malformed.as_object_mut().unwrap().remove("churn_probability");
        let payload = extract::<ApiBatchRequest>(&json!({
            "items": [body(0.9), bad, malformed, body(0.1)]
        }))
        .await;
        let Json(out) = evaluate_batch(State(state()), payload).await.unwrap();
        assert_eq!(out.result.summary.total, 4);
        assert_eq!(out.result.summary.failed, 2);
        assert_eq!(out.result.summary.high, 1);
        assert_eq!(out.result.summary.low, 1);
        assert_eq!(
            out.result.entries[2].error.as_ref().unwrap().kind,
            "invalid_request"
        );
    }

    #[tokio::test]
    async fn batch_size_is_capped() {
        let mut s = state();
        s.batch.max_records = 1;
        let batch = ApiBatchRequest {
            items: vec![body(0.9), body(0.1)],
        };
        let (status, _) = evaluate_batch(State(s), Ok(Json(batch))).await.unwrap_err();
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn rules_endpoint_serves_active_table() {
        let Json(rules) = get_rules(State(state())).await;
        assert_eq!(rules, RuleSet::default());
    }

    #[test]
    fn internal_faults_map_to_500() {
        let (status, Json(body)) = reject(EvaluationError::UnknownTier {
            tier: "HIGH".to_string(),
        });
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.kind, "unknown_tier");
    }

    #[test]
    fn router_builds() {
        let _ = router(state());
    }
}
