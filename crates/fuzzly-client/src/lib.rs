//! fuzz.ly client library
//!
//! This crate provides the HTTP plumbing shared by the fuzz.ly SDK: per-environment
//! service hosts, request/response types, and a gateway client that maps HTTP
//! failures onto typed errors.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod gateway;
pub mod hosts;

pub use gateway::{
    ClientConfig, GatewayClient, GatewayError, GatewayRequest, GatewayResponse, HttpErrorKind,
};
pub use hosts::{Environment, Service, ServiceHosts};

/// Result type for client setup operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for client setup operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The underlying HTTP client could not be constructed
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Unrecognized deployment environment name
    #[error("Unknown environment: {0}")]
    UnknownEnvironment(String),
}
