pub mod config;
pub mod diagnose;
