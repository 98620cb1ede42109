use std::time::Duration;
use strum_macros::Display;
use thiserror::Error;

/// The four hook phases, in the order an application passes through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum Phase {
    OnModuleInit,
    OnApplicationBootstrap,
    OnApplicationShutdown,
    OnModuleDestroy,
}

impl Phase {
    /// Init and bootstrap failures abort startup; the shutdown phases only
    /// count them.
    pub fn is_fatal(self) -> bool {
        matches!(self, Phase::OnModuleInit | Phase::OnApplicationBootstrap)
    }
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    /// Returned by a hook implementation.
    #[error("{0}")]
    Failed(String),

    /// A hook returned an error; `provider` is the provider's type name.
    #[error("{phase} hook of {provider} failed: {reason}")]
    HookFailed {
        phase: Phase,
        provider: String,
        reason: String,
    },

    #[error("{phase} did not complete within {limit:?}")]
    Timeout { phase: Phase, limit: Duration },
}

impl LifecycleError {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed(reason.into())
    }

    /// The phase a failure was raised in, once the manager has tagged it.
    pub fn phase(&self) -> Option<Phase> {
        match self {
            Self::Failed(_) => None,
            Self::HookFailed { phase, .. } | Self::Timeout { phase, .. } => Some(*phase),
        }
    }
}

pub type Result<T> = std::result::Result<T, LifecycleError>;
