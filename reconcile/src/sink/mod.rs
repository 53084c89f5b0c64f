//! Match record output: the batching sink and its storage backends.

mod base;
mod batch;
pub mod memory;
pub mod mysql;

pub use base::*;
pub use batch::*;
