//! # inquest-server
//!
//! Axum HTTP server for the Inquest investigation engine.
//!
//! Routes:
//! - `POST /api/investigate`: start or resume an investigation; the response
//!   is an SSE stream of wire frames, one per engine event
//! - `GET /health`: liveness plus uptime and active session count
//! - `GET /metrics`: Prometheus exposition text
//!
//! The server owns admission control (one slot per concurrent investigation)
//! and graceful shutdown; the investigation loop itself lives in
//! `inquest-runtime`.

#![deny(unsafe_code)]

pub mod error;
pub mod health;
pub mod investigate;
pub mod metrics;
pub mod server;
pub mod shutdown;

pub use error::ApiError;
pub use investigate::InvestigateRequest;
pub use server::{AppState, InquestServer, ServerHandle};
pub use shutdown::ShutdownCoordinator;
