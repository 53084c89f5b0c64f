//! Record, key and match types shared across the pipeline.
//!
//! Keys are always compared in normalized form. Records flow from the producers through the
//! merger into [`LastnameGroup`]s, and the match engine turns pairs into [`MatchRecord`]s.

mod group;
mod key;
mod match_record;
mod record;
mod report;

pub use group::*;
pub use key::*;
pub use match_record::*;
pub use record::*;
pub use report::*;
