use chatflow_server::{app, config::ServerConfig, telemetry};
use std::process::ExitCode;
use std::sync::Arc;

#[tokio::main]
async fn main() -> ExitCode {
    let config = ServerConfig::from_env();
    let log = Arc::new(telemetry::init(
        config
            .as_ref()
            .map_or("info", |config| config.log_filter.as_str()),
    ));

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "failed to load configuration");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(flows = config.flows.len(), "Loaded configuration");

    match app::run(config, log).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(report) => {
            tracing::error!(error = %report, "server stopped with an error");
            ExitCode::FAILURE
        }
    }
}
