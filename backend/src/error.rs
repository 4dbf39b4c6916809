use thiserror::Error;

use crate::models::ErrorKind;

#[derive(Debug, Error)]
pub enum RouteError {
    #[error("{provider} HTTP {status}: {message}")]
    UpstreamStatus {
        provider: &'static str,
        status: u16,
        message: String,
    },
    #[error("{provider} request failed: {source}")]
    Transport {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("could not geocode address {address:?}: {details}")]
    UnresolvableAddress { address: String, details: String },
    #[error("directions provider returned no route")]
    RouteNotFound,
    #[error("malformed directions response: {0}")]
    MalformedRoute(String),
    #[error("failed to build GPX document: {0}")]
    Gpx(#[from] gpx::errors::GpxError),
}

impl RouteError {
    pub fn transport(provider: &'static str) -> impl FnOnce(reqwest::Error) -> Self {
        move |source| RouteError::Transport { provider, source }
    }

    /// Where this failure sits in the caller-facing taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RouteError::UpstreamStatus { .. } | RouteError::Transport { .. } => {
                ErrorKind::UpstreamUnavailable
            }
            RouteError::UnresolvableAddress { .. } | RouteError::RouteNotFound => {
                ErrorKind::UnresolvableInput
            }
            RouteError::MalformedRoute(_) | RouteError::Gpx(_) => ErrorKind::Unexpected,
        }
    }
}
