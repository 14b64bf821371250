// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the capture and render pipeline

use crate::backends::camera::Resolution;
use std::fmt;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Main pipeline error type
#[derive(Debug, Clone, PartialEq)]
pub enum AppError {
    /// Camera negotiation and stream errors
    Camera(CameraError),
    /// Rendering errors (fatal for the session)
    Render(RenderError),
    /// Configuration errors
    Config(String),
    /// A foreground activity is already running
    Busy(String),
    /// Generic error with message
    Other(String),
}

/// Camera-specific errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CameraError {
    /// The device refused this resolution
    ResolutionNotSupported(Resolution),
    /// Every entry of the resolution ladder was refused
    NoCameraFound,
    /// The stream stopped while a session was live
    Disconnected,
    /// The device is locked and cannot be negotiated right now
    Locked,
    /// Backend error
    BackendError(String),
}

/// Rendering errors
///
/// None of these are recoverable: there is no fallback rendering path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// The rendering context cannot be created for this session
    ContextUnavailable(String),
    /// A processor was constructed with an unusable binding
    InvalidBinding(String),
    /// A processor ran before its input texture was populated
    EmptyTexture(&'static str),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Camera(e) => write!(f, "Camera error: {}", e),
            AppError::Render(e) => write!(f, "Render error: {}", e),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Busy(msg) => write!(f, "Busy: {}", msg),
            AppError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for CameraError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraError::ResolutionNotSupported(res) => {
                write!(f, "Resolution {} not supported", res)
            }
            CameraError::NoCameraFound => write!(f, "No camera found"),
            CameraError::Disconnected => write!(f, "Camera disconnected"),
            CameraError::Locked => write!(f, "Camera is locked"),
            CameraError::BackendError(msg) => write!(f, "Backend error: {}", msg),
        }
    }
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::ContextUnavailable(msg) => {
                write!(f, "Rendering context unavailable: {}", msg)
            }
            RenderError::InvalidBinding(msg) => write!(f, "Invalid processor binding: {}", msg),
            RenderError::EmptyTexture(slot) => write!(f, "Texture '{}' has no frame", slot),
        }
    }
}

impl std::error::Error for AppError {}
impl std::error::Error for CameraError {}
impl std::error::Error for RenderError {}

impl From<CameraError> for AppError {
    fn from(err: CameraError) -> Self {
        AppError::Camera(err)
    }
}

impl From<RenderError> for AppError {
    fn from(err: RenderError) -> Self {
        AppError::Render(err)
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Other(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Other(msg.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<image::ImageError> for AppError {
    fn from(err: image::ImageError) -> Self {
        AppError::Other(format!("Image error: {}", err))
    }
}
