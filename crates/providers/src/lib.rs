//! AI provider clients, failure classification and the primary/fallback
//! selector used by the analysis endpoint.

pub mod classify;
pub mod error;
pub mod ollama;
pub mod openai_compat;
pub mod parse;
pub mod prompt;
pub mod provider;
pub mod selector;

pub use classify::{classify, classify_message, should_fallback, ErrorClass};
pub use error::{ProviderError, ProviderErrorKind};
pub use ollama::OllamaProvider;
pub use openai_compat::{OpenAiCompatProvider, Sampling};
pub use provider::AnalysisProvider;
pub use selector::{ProviderExecution, ProviderSelector, SelectorSettings};
