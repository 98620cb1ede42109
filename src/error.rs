use crate::lifecycle::LifecycleError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, TrellisError>;

/// Errors raised while assembling the application.
///
/// All of these are fatal to startup. Request-time failures never use this
/// type directly; they travel as [`HandlerError`](crate::dispatch::HandlerError).
#[derive(Debug, Error)]
pub enum TrellisError {
    #[error("Missing {what} metadata for {type_name}")]
    MissingMetadata {
        type_name: String,
        what: &'static str,
    },

    #[error("Provider not found: {type_name}")]
    ProviderNotFound { type_name: String },

    #[error("Failed to downcast type: {type_name}")]
    DowncastFailed { type_name: String },

    #[error("Circular dependency detected: {cycle}")]
    CircularDependency { cycle: String },

    #[error("Circular module import detected: {cycle}")]
    CircularImport { cycle: String },

    #[error("Invalid route {path}: {reason}")]
    InvalidRoute { path: String, reason: String },

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error("Transport error: {0}")]
    Transport(#[from] std::io::Error),
}

impl TrellisError {
    pub(crate) fn missing(type_name: impl Into<String>, what: &'static str) -> Self {
        Self::MissingMetadata {
            type_name: type_name.into(),
            what,
        }
    }

    pub(crate) fn not_found(type_name: impl Into<String>) -> Self {
        Self::ProviderNotFound {
            type_name: type_name.into(),
        }
    }

    /// `true` when the error only says that nothing provides the type.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ProviderNotFound { .. })
    }
}
