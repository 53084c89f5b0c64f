//! Streaming reconciliation of a paginated remote user directory against a relational user table.
//!
//! Two producers read both populations in lastname order into bounded queues. The
//! [`merger::StreamMerger`] joins them by lastname, the [`engine::MatchEngine`] pairs users by
//! full name, and the [`sink::BatchSink`] writes the resulting match records in bulk. The
//! [`pipeline::Pipeline`] wires everything together.

pub mod collector;
pub mod concurrency;
pub mod engine;
pub mod error;
mod macros;
pub mod merger;
pub mod metrics;
pub mod pipeline;
pub mod sink;
pub mod source;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod types;
pub mod workers;
