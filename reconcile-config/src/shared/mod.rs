//! Shared configuration types.

mod base;
mod batch;
mod connection;
mod directory;
mod pipeline;
mod queue;
mod reconciler;

pub use base::ValidationError;
pub use batch::BatchConfig;
pub use connection::MySqlConnectionConfig;
pub use directory::DirectoryConfig;
pub use pipeline::PipelineConfig;
pub use queue::{PageRangeConfig, QueueConfig};
pub use reconciler::{ReconcilerConfig, SinkConfig, SourceConfig};
