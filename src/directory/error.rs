use thiserror::Error;

use crate::security::token_issuer::TokenIssuanceError;

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error(transparent)]
    Token(#[from] TokenIssuanceError),
    /// Non-success response; the body usually embeds a JSON error object.
    #[error("Google API {status} {body}")]
    Upstream { status: u16, body: String },
    #[error("directory request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected directory response: {0}")]
    Decode(String),
    #[error("invalid directory URL: {0}")]
    InvalidUrl(String),
}

impl DirectoryError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Upstream { status, .. } => Some(*status),
            Self::Token(TokenIssuanceError::Rejected { status, .. }) => Some(*status),
            _ => None,
        }
    }
}
