use std::time::Duration;

use crate::api;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Api(#[from] api::Error),

    #[error("Transport error: {0:#}")]
    Transport(#[from] anyhow::Error),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("No post is currently loaded")]
    NotLoaded,
}

impl Error {
    /// Returns the API error the store answered with, if any
    pub fn api(&self) -> Option<&api::Error> {
        match self {
            Error::Api(e) => Some(e),
            _ => None,
        }
    }
}
