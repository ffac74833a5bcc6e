//! chatflow server.
//!
//! Wires the dispatcher, flow engine, messenger adapter and system controls
//! together and exposes a thin HTTP ingress that only publishes events.

pub mod app;
pub mod config;
pub mod error;
pub mod gateway;
pub mod messenger;
pub mod routes;
pub mod system;
pub mod telemetry;
