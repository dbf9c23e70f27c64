mod error;
mod features;
mod inference_service;
mod model_service;
mod ort_service;
mod routes;
mod server;
mod telemetry;

pub mod app;
pub mod config;
pub mod topology;

pub use app::start_app;
pub use error::{PredictError, ShapeError};
pub use inference_service::{GesturePrediction, InferenceService};
pub use model_service::{InferenceError, ModelService};
pub use ort_service::{ModelLoadError, OrtModelService};
pub use server::build_router;
pub use telemetry::Metrics;
