use crate::{
    error::PredictError,
    inference_service::GesturePrediction,
    model_service::ModelService,
    server::SharedState,
};
use axum::{
    extract::{rejection::JsonRejection, State},
    response::Json,
};
use serde::Deserialize;
use serde_json::Value;
use std::time::Instant;
use tracing::instrument;

#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    #[serde(default)]
    data: Option<Value>,
}

#[instrument(skip_all)]
pub async fn predict<M: ModelService>(
    State(state): State<SharedState<M>>,
    payload: Result<Json<PredictRequest>, JsonRejection>,
) -> Result<Json<GesturePrediction>, PredictError> {
    state.metrics.record_request("/predict");
    let started = Instant::now();

    let result = match payload {
        Ok(Json(request)) => state.inference_service.predict(request.data.as_ref()).await,
        Err(rejection) => Err(PredictError::InvalidRequest(rejection.body_text())),
    };

    state
        .metrics
        .record_inference_duration(started.elapsed().as_micros() as u64);

    match result {
        Ok(prediction) => {
            state.metrics.record_prediction(&prediction.gesture);
            Ok(Json(prediction))
        }
        Err(e) => {
            tracing::error!("Prediction error: {}", e);
            state.metrics.record_error(e.kind());
            Err(e)
        }
    }
}
