//! Process-level control events: shutdown and log level.

use crate::telemetry::LogSwitch;
use async_trait::async_trait;
use chatflow_conversation::AppEvent;
use chatflow_conversation::event::{APP_EXIT, LOG_MODE_DEBUG, LOG_MODE_INFO, SYSTEM_EVENTS};
use chatflow_mediator::{Dispatcher, EventName, Listener, MediatorError};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

/// Handles `app.exit` and `log.mode.*` events.
pub struct SystemListener {
    shutdown: watch::Sender<bool>,
    log: Arc<dyn LogSwitch>,
}

impl SystemListener {
    /// Creates the listener and the receiver that observes shutdown requests.
    #[must_use]
    pub fn new(log: Arc<dyn LogSwitch>) -> (Self, watch::Receiver<bool>) {
        let (shutdown, requested) = watch::channel(false);
        (Self { shutdown, log }, requested)
    }

    /// Binds the listener to every system event.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateRegistration` if a system event is already bound.
    pub fn register(self, dispatcher: &Dispatcher<AppEvent>) -> Result<(), MediatorError> {
        dispatcher.register(Arc::new(self), SYSTEM_EVENTS)
    }

    fn set_level(&self, directive: &str) {
        match self.log.switch(directive) {
            Ok(()) => info!(level = directive, "log level changed"),
            Err(e) => warn!(error = %e, "log level unchanged"),
        }
    }
}

#[async_trait]
impl Listener<AppEvent> for SystemListener {
    async fn listen(&self, name: EventName, _payload: AppEvent) {
        if name == APP_EXIT {
            info!("shutdown requested");
            self.shutdown.send_replace(true);
        } else if name == LOG_MODE_DEBUG {
            self.set_level("debug");
        } else if name == LOG_MODE_INFO {
            self.set_level("info");
        } else {
            warn!(event = %name, "system listener received unknown event");
        }
    }
}
