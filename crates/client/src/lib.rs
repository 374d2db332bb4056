// crates/client/src/lib.rs
//! Network transport for syncwatch: server-sent events over HTTP.

pub mod http;
pub mod sse;

pub use http::HttpTransport;
pub use sse::SseDecoder;
