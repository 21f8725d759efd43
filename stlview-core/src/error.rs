//! Error types shared by the viewer and its hosts

use thiserror::Error;

use crate::stl::StlError;

/// Rejected viewer configuration. Raised before any scene work begins.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("{field} must be a positive number, got {value}")]
    InvalidDimension { field: &'static str, value: f64 },

    #[error("rotationSpeeds must hold exactly 3 finite numbers when rotation is enabled, got {0:?}")]
    InvalidRotationSpeeds(Vec<f32>),

    #[error("invalid color for {field}: {value}")]
    InvalidColor { field: &'static str, value: String },

    #[error("{0} must be a finite number")]
    NonFinite(&'static str),

    #[error("mesh url is empty")]
    EmptyUrl,

    #[error("camera position coincides with the model origin")]
    CameraAtTarget,

    #[error("malformed viewer properties: {0}")]
    Malformed(String),
}

/// Coarse classification of a failed mesh load, surfaced to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadErrorKind {
    NotFound,
    ParseError,
    NetworkError,
}

impl LoadErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadErrorKind::NotFound => "NotFound",
            LoadErrorKind::ParseError => "ParseError",
            LoadErrorKind::NetworkError => "NetworkError",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LoadError {
    #[error("mesh not found: {0}")]
    NotFound(String),

    #[error("failed to parse mesh: {0}")]
    Parse(#[from] StlError),

    #[error("network error: {0}")]
    Network(String),
}

impl LoadError {
    pub fn kind(&self) -> LoadErrorKind {
        match self {
            LoadError::NotFound(_) => LoadErrorKind::NotFound,
            LoadError::Parse(_) => LoadErrorKind::ParseError,
            LoadError::Network(_) => LoadErrorKind::NetworkError,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("surface error: {0}")]
pub struct SurfaceError(pub String);

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ViewerError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Surface(#[from] SurfaceError),

    #[error("viewer has already been initialized")]
    AlreadyInitialized,

    #[error("viewer has been destroyed")]
    Destroyed,
}

pub type Result<T> = std::result::Result<T, ViewerError>;
