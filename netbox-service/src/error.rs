use thiserror::Error;

/// Failures of a converge run. None of them are retried.
#[derive(Debug, Error)]
pub enum ConvergeError {
    /// Arguments are missing or malformed; raised before any network call.
    #[error("{0}")]
    Validation(String),

    #[error("Could not resolve id of {field}: {value}")]
    NotFound { field: &'static str, value: String },

    #[error("More than one result returned for {field}: {value}")]
    Ambiguous { field: &'static str, value: String },

    #[error("{method} {url} returned {status}: {body}")]
    Api {
        method: String,
        url: String,
        status: u16,
        body: String,
    },

    #[error("Request to {url} failed")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Unexpected response from {context}")]
    Decode {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ConvergeError {
    pub fn validation(msg: impl Into<String>) -> Self {
        ConvergeError::Validation(msg.into())
    }
}
