use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;

use crate::api::ApiState;
use crate::core::db::{Detection, DetectionRepository, DetectionUpdate, NewDetection};
use crate::error::StoreError;

const DEFAULT_LIMIT: u32 = 10;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub skip: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    DEFAULT_LIMIT
}

#[derive(Debug)]
pub enum ApiError {
    NotFound,
    Invalid(String),
    /// Details stay in the log; clients get a generic message.
    Internal,
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Invalid(e) => ApiError::Invalid(e.to_string()),
            other => {
                tracing::error!(error = %other, "record service failure");
                ApiError::Internal
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::NotFound => (StatusCode::NOT_FOUND, "Detection not found".to_string()),
            ApiError::Invalid(detail) => (StatusCode::UNPROCESSABLE_ENTITY, detail),
            ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Invalid(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::Invalid(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::Invalid(rejection.body_text())
    }
}

pub async fn health() -> impl IntoResponse {
    "OK"
}

pub async fn create_detection(
    State(st): State<ApiState>,
    body: Result<Json<NewDetection>, JsonRejection>,
) -> Result<(StatusCode, Json<Detection>), ApiError> {
    let Json(body) = body?;
    let detection = st.db.add_detection(&body).await?;
    Ok((StatusCode::CREATED, Json(detection)))
}

pub async fn get_detection(
    State(st): State<ApiState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<Detection>, ApiError> {
    let Path(id) = id?;
    st.db
        .get_detection_by_id(id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

pub async fn list_detections(
    State(st): State<ApiState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<Json<Vec<Detection>>, ApiError> {
    let Query(query) = query?;
    Ok(Json(st.db.get_detections(query.skip, query.limit).await?))
}

pub async fn update_detection(
    State(st): State<ApiState>,
    id: Result<Path<i64>, PathRejection>,
    update: Result<Json<DetectionUpdate>, JsonRejection>,
) -> Result<Json<Detection>, ApiError> {
    let Path(id) = id?;
    let Json(update) = update?;
    st.db
        .update_detection(id, &update)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound)
}
