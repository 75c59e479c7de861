//! Error types for the docshot-core library.
//!
//! This module provides granular error variants for different failure modes,
//! enabling precise error handling and user-friendly error messages.

use thiserror::Error;

/// Errors that can occur within the docshot-core library.
///
/// Each variant represents a specific failure mode with contextual information
/// to help diagnose and handle errors appropriately. Fallback policies differ
/// by variant: crop and capture failures are recovered inside the pipeline,
/// probe and encoding failures are propagated to the caller.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors (missing keys, invalid values).
    #[error("Configuration error: {0}")]
    Config(String),

    /// An image location or geometry input was empty or malformed.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Persisted settings failed validation.
    #[error("Settings error: {0}")]
    Settings(String),

    /// Image metadata or byte-size probe failed.
    #[error("Probe failed: {0}")]
    Probe(String),

    /// The crop codec rejected the request or failed mid-operation.
    #[error("Crop codec failed: {0}")]
    CropCodec(String),

    /// The adaptive compression codec failed.
    #[error("Compression codec failed: {0}")]
    CompressionCodec(String),

    /// The resize codec failed.
    #[error("Resize codec failed: {0}")]
    ResizeCodec(String),

    /// The view-capture primitive failed or returned no image.
    #[error("View capture failed: {0}")]
    Capture(String),

    /// Base64 encoding of an image file failed.
    #[error("Encoding failed: {0}")]
    Encoding(String),

    /// The submission endpoint rejected the request.
    #[error("Submission failed: {0}")]
    Submission(String),

    /// Transport-level HTTP error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AppError {
    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates an invalid-input error with the given message.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Creates a settings validation error with the given message.
    pub fn settings(msg: impl Into<String>) -> Self {
        Self::Settings(msg.into())
    }

    /// Creates a probe error with the given message.
    pub fn probe(msg: impl Into<String>) -> Self {
        Self::Probe(msg.into())
    }

    /// Creates a crop codec error with the given message.
    pub fn crop(msg: impl Into<String>) -> Self {
        Self::CropCodec(msg.into())
    }

    /// Creates a compression codec error with the given message.
    pub fn compression(msg: impl Into<String>) -> Self {
        Self::CompressionCodec(msg.into())
    }

    /// Creates a resize codec error with the given message.
    pub fn resize(msg: impl Into<String>) -> Self {
        Self::ResizeCodec(msg.into())
    }

    /// Creates a view-capture error with the given message.
    pub fn capture(msg: impl Into<String>) -> Self {
        Self::Capture(msg.into())
    }

    /// Creates an encoding error with the given message.
    pub fn encoding(msg: impl Into<String>) -> Self {
        Self::Encoding(msg.into())
    }

    /// Creates a submission error with the given message.
    pub fn submission(msg: impl Into<String>) -> Self {
        Self::Submission(msg.into())
    }
}

/// A convenient alias for Result with [`AppError`].
pub type Result<T> = std::result::Result<T, AppError>;
