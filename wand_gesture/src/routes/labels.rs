use crate::{model_service::ModelService, server::SharedState};
use axum::{extract::State, response::Json};
use serde::Serialize;

#[derive(Serialize)]
pub struct GestureLabels {
    labels: Vec<String>,
    input_width: usize,
}

pub async fn labels<M: ModelService>(State(state): State<SharedState<M>>) -> Json<GestureLabels> {
    state.metrics.record_request("/labels");
    Json(GestureLabels {
        labels: state.inference_service.labels().to_vec(),
        input_width: state.inference_service.input_width(),
    })
}
