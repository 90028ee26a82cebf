//! hubsub_transport
//!
//! Network surfaces over the broker core: WebSocket sessions carrying the
//! JSON request/response protocol, and the HTTP management facade for
//! topic administration and introspection. Both are served from a single
//! axum router.

pub mod http;
pub mod server;
pub mod session;
pub mod websocket;

pub use server::{build_router, serve, AppState};

#[cfg(test)]
mod websocket_tests;
