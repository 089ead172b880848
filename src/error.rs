use crate::results::Stage;
use std::io;
use thiserror::Error;

/// Failures surfaced by a portal session
#[derive(Debug, Error)]
pub enum PortalError {
    #[error("could not connect to WebDriver at {url}: {reason}")]
    Connect { url: String, reason: String },
    #[error("login failed: {0}")]
    Login(String),
    #[error("navigation failed: {0}")]
    Navigation(String),
    #[error("could not read page content: {0}")]
    Fetch(String),
    #[error("browser session is closed")]
    Closed,
}

impl PortalError {
    /// Stage this error belongs to
    pub fn stage(&self) -> Stage {
        match self {
            PortalError::Connect { .. } | PortalError::Closed => Stage::Setup,
            PortalError::Login(_) => Stage::Login,
            PortalError::Navigation(_) => Stage::Navigation,
            PortalError::Fetch(_) => Stage::Fetch,
        }
    }
}

/// Failures loading or resolving configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("error reading config: {0}")]
    Read(#[from] io::Error),
    #[error("error parsing config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid year '{0}', expected a range like 2024-25")]
    InvalidYear(String),
    #[error("invalid course filter pattern: {0}")]
    Pattern(#[from] regex::Error),
    #[error(
        "login_timeout_secs ({login}) must be shorter than stage_timeout_secs ({stage})"
    )]
    LoginTimeout { login: u64, stage: u64 },
    #[error("invalid portal URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

/// Failures reading or updating the stored course list
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("error accessing course store: {0}")]
    Io(#[from] io::Error),
    #[error("course store is corrupt: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("a course with URL '{0}' already exists")]
    DuplicateUrl(String),
    #[error("a course named '{0}' already exists")]
    DuplicateName(String),
    #[error("'{0}' is not a course page URL")]
    InvalidUrl(String),
    #[error("no course matches '{0}'")]
    NotFound(String),
}
