//! Coordination primitives shared between the pipeline and its producer tasks.

pub mod stop;
