//! Tracing subscriber setup with a runtime-switchable filter.

use crate::error::ServerError;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry, reload};

/// Something that can replace the active log filter.
pub trait LogSwitch: Send + Sync {
    /// Replaces the active filter with `directive` (e.g. `"debug"`).
    ///
    /// # Errors
    ///
    /// Returns `LogFilter` if the directive is invalid or the subscriber is gone.
    fn switch(&self, directive: &str) -> Result<(), ServerError>;
}

/// Handle to the global subscriber's filter.
pub struct ReloadableFilter {
    handle: reload::Handle<EnvFilter, Registry>,
}

/// Installs the global subscriber. `RUST_LOG` takes precedence over
/// `default_directive`.
#[must_use]
pub fn init(default_directive: &str) -> ReloadableFilter {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    let (filter, handle) = reload::Layer::new(filter);

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    ReloadableFilter { handle }
}

impl LogSwitch for ReloadableFilter {
    fn switch(&self, directive: &str) -> Result<(), ServerError> {
        let filter = EnvFilter::try_new(directive).map_err(|e| ServerError::LogFilter {
            details: e.to_string(),
        })?;
        self.handle
            .reload(filter)
            .map_err(|e| ServerError::LogFilter {
                details: e.to_string(),
            })
    }
}
