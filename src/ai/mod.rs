//! AI Layer
//!
//! Prompt assembly, provider adapters, and the ordered fallback selector.

pub mod prompt;
pub mod provider;
pub mod timeout;

pub use prompt::{PromptAssembler, render_findings};
pub use provider::{
    AiProvider, ChunkStream, FallbackWarning, ProviderKind, ProviderRegistry, ProviderSelector,
    QueryOutcome, SelectionFailure,
};
