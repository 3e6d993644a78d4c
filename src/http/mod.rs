//! HTTP surface for the gateway.

pub mod handler;
pub mod server;

pub use handler::AppState;
pub use server::{router, HttpServer};
