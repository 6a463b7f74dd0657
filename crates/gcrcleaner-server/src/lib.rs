//! # gcrcleaner-server
//!
//! Long-running HTTP surface for the cleaning engine, driven by external
//! schedulers or a message bus:
//!
//! - `POST /http`: synchronous clean, JSON request/response
//! - `POST /pubsub`: asynchronous clean from a push-style bus envelope,
//!   deduplicated by `subscription/message_id`
//! - `GET /health`: liveness probe

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod payload;
pub mod router;
pub mod routes;
pub mod state;

pub use error::{ApiError, ErrorResponse};
pub use payload::{CleanResponse, Grace, Payload, PushEnvelope};
pub use router::service_router;
pub use state::AppState;
