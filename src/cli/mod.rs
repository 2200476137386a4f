//! CLI Layer
//!
//! Command implementations invoked from the binary entry point.

pub mod commands;
