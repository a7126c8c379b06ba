//! Error types for chain configuration and processor runtime failures

use thiserror::Error;

/// Build-time configuration errors
///
/// These are fatal: a run aborts before any conversation is processed.
#[derive(Error, Debug)]
pub enum ChainConfigError {
    /// Processor id not present in the registry
    #[error("unknown processor id: '{0}'")]
    UnknownProcessor(String),

    /// Processor parameters failed to deserialize or validate
    #[error("invalid parameters for processor '{id}': {message}")]
    InvalidParams {
        /// Processor id
        id: String,
        /// What was wrong
        message: String,
    },

    /// Two processors in the chain declare the same output field
    #[error("field '{field}' is declared by both '{first}' and '{second}'")]
    FieldCollision {
        /// The colliding field name
        field: String,
        /// Processor that declared it first
        first: String,
        /// Processor that declared it again
        second: String,
    },
}

/// A processor failed for one conversation
///
/// Recovered locally by the chain: the processor's declared fields become
/// unavailable and the failure is recorded for diagnostics.
#[derive(Error, Debug, Clone)]
#[error("{message}")]
pub struct ProcessorError {
    /// What went wrong
    pub message: String,
}

impl ProcessorError {
    /// Create a processor error from any displayable cause
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
