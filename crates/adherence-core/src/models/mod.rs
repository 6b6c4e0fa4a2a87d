//! Domain models for the adherence system.

mod group;
mod prescription;
mod record;
mod report;

pub use group::*;
pub use prescription::*;
pub use record::*;
pub use report::*;

use thiserror::Error;

/// Failure to parse a stored enum value.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelParseError {
    #[error("Unknown timing: {0}")]
    UnknownTiming(String),

    #[error("Unknown record status: {0}")]
    UnknownStatus(String),
}
