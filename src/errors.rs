//! Typed errors for the fetch layer.
//!
//! Identity gaps are not errors: peers lacking a mapping for a source are
//! excluded by the reconciliation step and reported as data. Everything
//! that stops a fetch is one of the variants below.

use thiserror::Error;

/// Errors surfaced by the fetch orchestrator and the API clients.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Missing token or missing repository/project configuration.
    /// Surfaced as a setup prompt, never retried.
    #[error("Not configured: {0}")]
    Configuration(String),

    /// Network-level failure (connect, timeout) on a request.
    #[error("Request to {endpoint} failed: {source}")]
    Transient {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    /// The API answered with a non-success status.
    #[error("{endpoint} returned {status}: {body}")]
    Api {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// The response body could not be decoded into the expected shape.
    #[error("Failed to decode response from {endpoint}: {message}")]
    Decode { endpoint: String, message: String },

    /// A GraphQL response carried an `errors` array (possibly alongside
    /// partial data). Triggers the REST fallback on the GitHub path.
    #[error("GraphQL query failed: {0}")]
    GraphQl(String),
}

impl FetchError {
    /// True for failures of the primary GitHub strategy that should make
    /// the orchestrator fall back to REST rather than abort.
    pub fn triggers_fallback(&self) -> bool {
        !matches!(self, FetchError::Configuration(_))
    }
}
