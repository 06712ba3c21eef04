//! Client request body ingestion core for an event driven http/1 server.
//!
//! Picks up after the request line and headers have been parsed: acquires
//! the rest of the message body from a non-blocking connection, stages it
//! across memory buffers and an optional temp file spill, feeds the input
//! filter chain with every freshly acquired slice and delivers a single
//! completion callback. A parallel discard path drains bodies no handler
//! wants.
//!
//! The surrounding server reaches the core through two seams: [ClientIo]
//! for the socket and its event loop bookkeeping, and [InputBodyFilter] for
//! the filter chain head. The [dispatcher] module adapts both to tokio.

pub mod body;
pub mod bytes;
pub mod dispatcher;

mod config;
mod error;
mod filter;
mod io;
mod request;

pub use self::body::{
    discard_request_body, read_client_request_body, PostHandler, ReadOutcome, RequestBody,
};
pub use self::config::{BodyConfig, SpillLogLevel};
pub use self::error::Error;
pub use self::filter::{FilterStatus, InputBodyFilter};
pub use self::io::ClientIo;
pub use self::request::{Disposition, Event, HeaderBuf, ReadHandler, Request};

pub use http;
