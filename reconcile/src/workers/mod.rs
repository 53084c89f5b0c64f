//! Source producers: one tokio task per source feeding a bounded queue.

mod fetcher;
mod producer;

pub use fetcher::*;
pub use producer::*;
