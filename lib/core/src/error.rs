//! Shared result alias.
//!
//! Crates keep their own error enums. Operations whose callers want the
//! layered report (flow loading, server startup) return `Report<ThatError>`.

use rootcause::Report;

/// Result carrying a `rootcause` report of context `C`.
pub type Result<T, C = ()> = std::result::Result<T, Report<C>>;
