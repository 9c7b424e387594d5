use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("rate limited")]
    RateLimited,

    #[error("rate limited, gave up after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },

    #[error("invalid request ({status}): {message}")]
    RequestInvalid { status: u16, message: String },

    #[error("provider error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("empty response from {provider}")]
    EmptyResponse { provider: &'static str },

    #[error("no API key: set {env_var}")]
    MissingApiKey { env_var: String },
}

impl ProviderError {
    /// Whether a batch can move on to the next item after this error.
    /// Transport failures and missing credentials stop the batch.
    pub fn is_skippable(&self) -> bool {
        !matches!(
            self,
            ProviderError::Http(_) | ProviderError::MissingApiKey { .. }
        )
    }
}
