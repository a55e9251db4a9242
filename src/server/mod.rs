//! HTTP surface: routing, request handlers, and the SSE relay.

pub mod handlers;
pub mod relay;
pub mod router;
