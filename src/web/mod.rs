//! Web server exposing panels over WebSocket plus a small REST API.

pub mod error;
mod handlers;
mod routes;
mod server;
pub mod state;
mod ws;

pub use error::WebError;
pub use server::{build_router, run_server, ServerConfig};
pub use state::WebAppState;
