//! REST/SSE surface: auth middleware, request handlers, and router assembly.

pub mod auth;
pub mod handlers;
pub mod routes;
pub mod sse;

pub use routes::build_router;
