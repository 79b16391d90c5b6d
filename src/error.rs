//! Error types for rabbitmq-collectd
//!
//! This module defines the error types used throughout the application.

use thiserror::Error;

/// Management API client errors
#[derive(Error, Debug)]
pub enum ClientError {
    /// HTTP client initialization failed
    #[error("Failed to initialize HTTP client: {0}")]
    HttpClientInit(#[source] reqwest::Error),

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    HttpRequest(#[source] reqwest::Error),

    /// Failed to read the HTTP response
    #[error("Failed to read HTTP response: {0}")]
    HttpResponse(#[source] reqwest::Error),

    /// HTTP error status
    #[error("HTTP error status: {0}")]
    HttpStatus(u16),

    /// Malformed management API URL
    #[error("Invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// JSON parse error
    #[error("JSON parse error: {0}")]
    JsonParse(String),

    /// Request timed out
    #[error("Request timed out")]
    Timeout,

    /// Connection failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClientError::Timeout
        } else if err.is_connect() {
            ClientError::ConnectionFailed(err.to_string())
        } else if err.is_decode() {
            ClientError::JsonParse(err.to_string())
        } else if err.is_request() {
            ClientError::HttpRequest(err)
        } else {
            ClientError::HttpResponse(err)
        }
    }
}

/// Metric sink errors
///
/// The sink is a fallible external boundary; these errors are caught and
/// logged at the dispatch adapter, never propagated into a poll cycle.
#[derive(Error, Debug)]
pub enum SinkError {
    /// I/O error while writing a metric
    #[error("I/O error writing metric: {0}")]
    Io(#[from] std::io::Error),

    /// The sink rejected the metric
    #[error("Sink rejected metric: {0}")]
    Rejected(String),
}
