use crate::errors::{Error, ErrorKind};
use crate::model::{Crop, CropInput, Reading};
use crate::service::QueryService;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tracing::{error, warn};

#[derive(Clone)]
struct AppState {
    service: QueryService,
}

pub fn create_router(service: QueryService) -> Router {
    let state = AppState { service };

    Router::new()
        .route("/api/crops", get(list_crops).post(create_crop))
        .route("/api/moisture", get(list_moisture))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn create_crop(
    State(state): State<AppState>,
    payload: Result<Json<CropInput>, JsonRejection>,
) -> Result<(StatusCode, Json<Crop>), AppError> {
    let Json(input) = payload?;
    let crop = state.service.create_crop(input).await?;
    Ok((StatusCode::CREATED, Json(crop)))
}

async fn list_crops(State(state): State<AppState>) -> Result<Json<Vec<Crop>>, AppError> {
    Ok(Json(state.service.list_crops().await?))
}

async fn list_moisture(State(state): State<AppState>) -> Result<Json<Vec<Reading>>, AppError> {
    Ok(Json(state.service.list_recent_readings().await?))
}

/// Error response rendered as `{"error": message}`
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
}

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        let status = match err.kind() {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::Transport | ErrorKind::Storage => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: rejection.body_text(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!("API error: {}", self.message);
        } else {
            warn!("Rejected request: {}", self.message);
        }
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}
