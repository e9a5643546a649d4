//! Subcommand implementations.

pub mod hash;
pub mod query;
pub mod scan;
pub mod stats;
