//! OpenAPI routes: GET /swagger (YAML) and GET /swagger.json.

use crate::docs::build_openapi;
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
    routing::get,
    Router,
};

async fn swagger_yaml(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let yaml = build_openapi(&state.catalog)
        .to_yaml()
        .map_err(|e| AppError::Internal(format!("openapi yaml: {}", e)))?;
    Ok(([(header::CONTENT_TYPE, "application/yaml")], yaml))
}

async fn swagger_json(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let json = build_openapi(&state.catalog)
        .to_pretty_json()
        .map_err(|e| AppError::Internal(format!("openapi json: {}", e)))?;
    Ok(([(header::CONTENT_TYPE, "application/json")], json))
}

pub fn docs_routes(state: AppState) -> Router {
    Router::new()
        .route("/swagger", get(swagger_yaml))
        .route("/swagger.json", get(swagger_json))
        .with_state(state)
}
