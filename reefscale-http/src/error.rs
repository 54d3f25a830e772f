use thiserror::Error;

/// The error taxonomy carried across every control-plane call. Every
/// endpoint wrapper and the scheduler's tick loop matches on this single
/// enum: one variant per named failure category.
#[derive(Debug, Error)]
pub enum ControlPlaneError {
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("rate limited by the control plane, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("server error (status {status})")]
    Server { status: u16 },

    #[error("failed to decode response from {endpoint}: {message}")]
    Decode { endpoint: String, message: String },

    #[error("request cancelled while waiting for a rate-limiter slot")]
    Cancelled,
}

impl ControlPlaneError {
    /// True for errors the base client retries once internally
    /// (transient transport failures and 5xx).
    pub fn is_retryable(&self) -> bool {
        matches!(self, ControlPlaneError::Transport(_) | ControlPlaneError::Server { .. })
    }
}
