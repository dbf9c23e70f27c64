use crate::{
    config::Config, inference_service::InferenceService, ort_service::OrtModelService,
    server::HttpServer, topology::ModelTopology,
};
use std::error::Error;
use tokio::{signal, sync::broadcast};

pub async fn start_app(config: Config) -> Result<(), Box<dyn Error>> {
    let topology = match config.model.get_topology_path() {
        Some(path) => {
            tracing::info!("Loading topology from {:?}", path);
            ModelTopology::from_file(&path).map_err(|e| {
                tracing::error!("Error loading topology: {}", e);
                e
            })?
        }
        None => ModelTopology::default(),
    };
    topology.log_summary();

    tracing::info!("Loading model from {:?}", config.model.get_path());
    let model_service = match OrtModelService::new(&config.model, topology) {
        Ok(service) => service,
        Err(e) => {
            tracing::error!("Error loading model: {}", e);
            return Err(Box::new(e));
        }
    };
    tracing::info!("Model loaded successfully");

    let inference_service = InferenceService::new(model_service);
    let server = HttpServer::new(inference_service, &config.server.get_address()).await?;

    let (shutdown_tx, _) = broadcast::channel(1);
    let server_handle = server.run(shutdown_tx.subscribe()).await?;

    shutdown_signal().await;
    tracing::info!("Shutdown signal received, starting graceful shutdown.");

    let _ = shutdown_tx.send(());
    server_handle.await??;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
