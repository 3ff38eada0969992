//! CLI subcommands.

pub mod check;
pub mod probe;
