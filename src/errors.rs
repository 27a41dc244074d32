/*!
 * Error types for the multilingo application.
 *
 * This module contains custom error types for different parts of the application,
 * using the thiserror crate for ergonomic error definitions.
 */

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur when working with provider APIs
#[derive(Error, Debug, Clone)]
pub enum ProviderError {
    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an API response fails
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Error related to rate limiting
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Error with authentication
    #[error("Authentication error: {0}")]
    AuthenticationError(String),

    /// The call did not finish within the per-attempt deadline
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Permanent failure of a provider whose capability does not exist yet
    #[error("{0}: Not Implemented Yet")]
    NotImplemented(String),

    /// The provider produced a result that carries its own error string
    #[error("{0}")]
    Reported(String),
}

/// Target-language validation failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Nothing but whitespace came back
    #[error("translation is empty")]
    EmptyTranslation,

    /// Detected language differs from the requested one
    #[error("expected {expected} but detected {detected}")]
    LanguageMismatch {
        /// Requested target language
        expected: String,
        /// Language reported by the detector
        detected: String,
    },
}

/// Errors that can occur during translation
#[derive(Error, Debug, Clone)]
pub enum TranslationError {
    /// Error from the provider API
    #[error("[{provider}] {source}")]
    Provider {
        /// Name of the failing provider
        provider: String,
        /// Underlying provider error
        #[source]
        source: ProviderError,
    },

    /// Output was not written in the requested language
    #[error("[{provider}] validation failed: {source}")]
    Validation {
        /// Name of the provider whose output failed validation
        provider: String,
        /// Underlying validation error
        #[source]
        source: ValidationError,
    },

    /// Cancelled while waiting between attempts
    #[error("translation cancelled")]
    Cancelled,

    /// Orchestrator constructed without any provider
    #[error("no valid providers configured")]
    NoProviders,

    /// Every configured provider failed every attempt
    #[error("all translation providers failed (chunk {chunk}): {}", .errors.join("; "))]
    AllProvidersFailed {
        /// One-based chunk number
        chunk: usize,
        /// Rendered provider errors
        errors: Vec<String>,
    },
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Invalid or inconsistent configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error from the translation memory database
    #[error("Store error: {0}")]
    Store(String),

    /// Error from translation
    #[error("Translation error: {0}")]
    Translation(#[from] TranslationError),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

// Utility functions for error conversion
impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(error: rusqlite::Error) -> Self {
        Self::Store(error.to_string())
    }
}

impl From<ProviderError> for AppError {
    fn from(error: ProviderError) -> Self {
        Self::Translation(TranslationError::Provider {
            provider: "unknown".to_string(),
            source: error,
        })
    }
}
