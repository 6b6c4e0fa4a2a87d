//! Export of adherence reports.

mod report;

pub use report::*;
