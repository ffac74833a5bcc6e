//! Composition root: builds every component and runs the server.

use crate::config::{FlowSource, ServerConfig};
use crate::error::ServerError;
use crate::gateway::ChatGateway;
use crate::messenger::LogMessenger;
use crate::routes::{self, AppState};
use crate::system::SystemListener;
use crate::telemetry::LogSwitch;
use axum::Router;
use chatflow_conversation::event::FLOW_CONFIG_UPLOADED;
use chatflow_conversation::{AppEvent, FlowConfigUploaded, InMemoryRepository, MessengerListener};
use chatflow_flow::{FlowEngine, FlowListener};
use chatflow_mediator::Dispatcher;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

/// Everything the server runs, wired together.
pub struct Services {
    pub dispatcher: Arc<Dispatcher<AppEvent>>,
    pub engine: Arc<FlowEngine<InMemoryRepository>>,
    pub repository: Arc<InMemoryRepository>,
    pub messenger: Arc<LogMessenger>,
    pub router: Router,
    /// Flips to `true` when an `app.exit` event is handled.
    pub shutdown: watch::Receiver<bool>,
}

/// Builds the dispatcher and registers every listener on it.
///
/// Must be called inside a Tokio runtime.
///
/// # Errors
///
/// Returns `Mediator` if two listeners claim the same event.
pub fn build(config: &ServerConfig, log: Arc<dyn LogSwitch>) -> Result<Services, ServerError> {
    let dispatcher = Arc::new(Dispatcher::new(config.mediator.clone()));
    let repository = Arc::new(InMemoryRepository::new());
    let messenger = Arc::new(LogMessenger::new());

    let engine = Arc::new(FlowEngine::new(
        config.engine.clone(),
        Arc::clone(&repository),
        Arc::clone(&dispatcher),
    ));
    FlowListener::register(Arc::clone(&engine), &dispatcher)?;
    MessengerListener::register(Arc::clone(&messenger), &dispatcher)?;

    let (system, shutdown) = SystemListener::new(log);
    system.register(&dispatcher)?;

    let gateway = Arc::new(ChatGateway::new(
        Arc::clone(&messenger),
        Arc::clone(&dispatcher),
    ));
    let router = routes::router(AppState {
        dispatcher: Arc::clone(&dispatcher),
        gateway,
    });

    info!(
        listeners = dispatcher.listener_count(),
        default_flow = %config.engine.default_flow,
        "services wired"
    );

    Ok(Services {
        dispatcher,
        engine,
        repository,
        messenger,
        router,
        shutdown,
    })
}

/// Reads each flow file and publishes it as an uploaded configuration.
///
/// # Errors
///
/// Returns `FlowFile` if a file cannot be read, or `Mediator` if the upload
/// cannot be enqueued.
pub async fn load_flows(
    dispatcher: &Dispatcher<AppEvent>,
    sources: &[FlowSource],
) -> Result<(), ServerError> {
    for source in sources {
        let config = tokio::fs::read_to_string(&source.path)
            .await
            .map_err(|e| ServerError::FlowFile {
                path: source.path.clone(),
                details: e.to_string(),
            })?;
        info!(flow = %source.flow, path = %source.path.display(), "publishing flow file");
        let upload = FlowConfigUploaded {
            flow: source.flow.clone(),
            config,
        };
        dispatcher.dispatch(FLOW_CONFIG_UPLOADED, upload.into()).await?;
    }
    Ok(())
}

/// Runs the server until Ctrl-C or an `app.exit` event, then drains the
/// dispatcher.
///
/// # Errors
///
/// Returns an error if wiring, flow loading, binding or serving fails.
pub async fn run(
    config: ServerConfig,
    log: Arc<dyn LogSwitch>,
) -> chatflow_core::Result<(), ServerError> {
    let services = build(&config, log)?;
    load_flows(&services.dispatcher, &config.flows).await?;

    let listener = tokio::net::TcpListener::bind(&config.http_addr)
        .await
        .map_err(|e| ServerError::Bind {
            addr: config.http_addr.clone(),
            details: e.to_string(),
        })?;
    info!(addr = %config.http_addr, "listening");

    axum::serve(listener, services.router.clone().into_make_service())
        .with_graceful_shutdown(wait_for_shutdown(services.shutdown.clone()))
        .await
        .map_err(|e| ServerError::Serve {
            details: e.to_string(),
        })?;

    services.dispatcher.shutdown().await;
    info!("server stopped");
    Ok(())
}

async fn wait_for_shutdown(mut requested: watch::Receiver<bool>) {
    let interrupt = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("interrupt received"),
            Err(e) => {
                warn!(error = %e, "cannot listen for interrupts");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        () = interrupt => {}
        _ = requested.wait_for(|exit| *exit) => info!("exit event received"),
    }
}
