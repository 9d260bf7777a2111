//! Command implementations for the lossreplay CLI.

pub mod replay;
