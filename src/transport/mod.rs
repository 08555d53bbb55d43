//! Outbound transport: the pooled HTTP client that opens SSE connections.

pub mod http;

pub use http::EventStreamClient;
