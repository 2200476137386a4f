//! SOS Agent - AI-assisted Linux system diagnostics
//!
//! Collects recent journal logs and resource metrics, classifies findings
//! into diagnostic categories, and asks an AI provider for a grounded,
//! actionable summary. Providers are tried in a configurable fallback order;
//! when every provider fails, the collected raw findings are still shown.
//!
//! ## Pipeline
//!
//! ```text
//! journalctl / free / df / uptime / os-release
//!        │
//!   collector  ──►  analyzer (classify + dedup)  ──►  DiagnosticContext
//!                                                         │
//!                           PromptAssembler  ◄────────────┘
//!                                 │
//!                        ProviderSelector (openai → gemini → mercury → claude-agent)
//!                                 │
//!                           streamed response
//! ```

pub mod ai;
pub mod analyzer;
pub mod cli;
pub mod collector;
pub mod config;
pub mod types;

pub use config::{Config, ConfigLoader};
pub use types::{Result, SosError};
