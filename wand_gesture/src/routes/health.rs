use crate::{model_service::ModelService, server::SharedState};
use axum::{extract::State, response::IntoResponse, response::Json};
use serde::{Deserialize, Serialize};

const HOME_MESSAGE: &str = "Wand Gesture API is running!";

#[derive(Serialize, Deserialize)]
pub struct Status {
    status: String,
}

pub async fn home<M: ModelService>(State(state): State<SharedState<M>>) -> &'static str {
    state.metrics.record_request("/");
    HOME_MESSAGE
}

pub async fn healthcheck<M: ModelService>(
    State(state): State<SharedState<M>>,
) -> impl IntoResponse {
    state.metrics.record_request("/health");
    Json(Status {
        status: "Available".into(),
    })
}
