use ehr_directory::config;
use ehr_directory::service::UserService;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ehr_directory=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    let config = match config::load_config_with_fallback() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let service = match UserService::from_config(&config).await {
        Ok(service) => service,
        Err(e) => {
            tracing::error!("Failed to start user service: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!(
        "{}/{} running with {} audit delivery",
        config.application_name,
        config.component_name,
        service.audit().mode().as_str()
    );

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }

    tracing::info!("Shutting down, flushing audit trail");
    service.shutdown().await;
}
