//! Upstream collaborators: the remote paginated directory and the relational user table.

mod base;
pub mod http;
pub mod memory;
pub mod mysql;

pub use base::*;
