use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::error::PriceError;
use crate::predictor::PricePredictor;
use crate::types::{Estimate, ForecastPoint, PredictionQuery};

// ---------- Request types ----------

#[derive(Deserialize, Debug)]
pub struct PredictRequest {
    #[serde(flatten)]
    pub query: PredictionQuery,
    pub years: Option<u32>,
    pub rate: Option<f64>,
}

#[derive(Deserialize, Debug)]
pub struct ForecastRequest {
    pub price: f64,
    pub years: Option<u32>,
    pub rate: Option<f64>,
}

type ApiError = (StatusCode, Json<serde_json::Value>);

fn api_error(e: PriceError) -> ApiError {
    let status = match &e {
        PriceError::ValidationRejected(_) => StatusCode::UNPROCESSABLE_ENTITY,
        PriceError::MalformedInput(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!("request failed: {}", e);
    }
    (status, Json(json!({ "error": e.to_string() })))
}

// ---------- Handlers ----------

async fn brands(State(p): State<Arc<PricePredictor>>) -> Json<Vec<String>> {
    Json(p.get_clean_brands())
}

async fn predict(
    State(p): State<Arc<PricePredictor>>,
    Json(req): Json<PredictRequest>,
) -> Result<Json<Estimate>, ApiError> {
    let est = p.estimate(&req.query, req.years, req.rate).map_err(api_error)?;
    tracing::info!(
        "predict brand={} year={} mileage={} -> {:.0}",
        req.query.brand,
        req.query.year,
        req.query.mileage,
        est.price
    );
    Ok(Json(est))
}

async fn forecast(
    State(p): State<Arc<PricePredictor>>,
    Json(req): Json<ForecastRequest>,
) -> Result<Json<Vec<ForecastPoint>>, ApiError> {
    let curve = p.calculate_future_value(req.price, req.years, req.rate).map_err(api_error)?;
    Ok(Json(curve))
}

pub fn router(predictor: Arc<PricePredictor>) -> Router {
    Router::new()
        .route("/brands", get(brands))
        .route("/predict", post(predict))
        .route("/forecast", post(forecast))
        .with_state(predictor)
}

pub async fn serve(predictor: Arc<PricePredictor>, addr: std::net::SocketAddr) -> std::io::Result<()> {
    let app = router(predictor);
    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await
}
