//! Configuration types and loading for the reconciler.
//!
//! Configuration is layered: a base file, an environment file selected by `APP_ENVIRONMENT`,
//! then `APP_`-prefixed environment variables. See [`load_config`].

mod environment;
mod load;
pub mod shared;

pub use environment::Environment;
pub use load::{Config, LoadConfigError, load_config, load_config_from};
