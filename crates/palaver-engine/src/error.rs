//! Error types for the engine

use thiserror::Error;

/// Errors that abort a run before any conversation is touched
///
/// Per-conversation failures never surface here; they are folded into the
/// result set with an `Error` cache status instead.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The processor chain could not be built from the recipe
    #[error("chain configuration error: {0}")]
    Chain(#[from] palaver_features::ChainConfigError),

    /// The prompt template is unusable
    #[error("prompt template error: {0}")]
    Template(String),

    /// Engine configuration is invalid
    #[error("configuration error: {0}")]
    Config(String),
}
