use crate::model_service::InferenceError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ShapeError {
    #[error("setting an array element with a sequence: inhomogeneous shape after {depth} dimensions")]
    Ragged { depth: usize },
    #[error("cannot reshape array of size {size} into shape (-1, {width})")]
    Reshape { size: usize, width: usize },
    #[error("cannot run inference on an empty batch")]
    EmptyBatch,
}

/// Every way a `/predict` request can fail. All variants answer 400.
#[derive(Error, Debug)]
pub enum PredictError {
    #[error("{0}")]
    InvalidRequest(String),
    #[error(transparent)]
    Shape(#[from] ShapeError),
    #[error(transparent)]
    Inference(#[from] InferenceError),
}

impl PredictError {
    pub fn missing_data() -> Self {
        PredictError::InvalidRequest("Missing 'data' field".to_string())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            PredictError::InvalidRequest(_) => "invalid_request",
            PredictError::Shape(_) => "shape",
            PredictError::Inference(_) => "inference",
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for PredictError {
    fn into_response(self) -> Response {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}
