use agency_service::config::AgencyConfig;
use agency_service::services::metrics::init_metrics;
use agency_service::startup::{shutdown_signal, Application};
use service_core::observability::logging::init_tracing;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Load configuration - fail fast if invalid
    let config = AgencyConfig::from_env().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        std::io::Error::other(format!("Configuration error: {}", e))
    })?;

    // Initialize tracing/logging using shared logic
    init_tracing(
        &config.service_name,
        &config.log_level,
        config.otlp_endpoint.as_deref(),
    );

    // Initialize metrics recorder (must be before any metrics are recorded)
    init_metrics();

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        "Starting agency service"
    );

    let app = Application::build(config).await.map_err(|e| {
        tracing::error!("Failed to build application: {}", e);
        std::io::Error::other(format!("Startup error: {}", e))
    })?;

    tokio::select! {
        result = app.run_until_stopped() => {
            if let Err(e) = result {
                tracing::error!("Server error: {}", e);
                return Err(e);
            }
        }
        _ = shutdown_signal() => {}
    }

    Ok(())
}
