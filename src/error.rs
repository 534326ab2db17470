//! Error types.

use trust_dns_server::proto::error::ProtoError;

/// Error enumerates the possible Stateless DNS error states.
///
/// None of these are produced while answering queries: a question that can't be answered
/// simply gets no records. They surface while loading configuration or running the server.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Returned when a token service is configured without any signing secrets.
    #[error("at least one signing secret is required")]
    NoSecrets,

    /// Returned when one of the configured signing secrets is the empty string.
    #[error("signing secrets must not be empty")]
    EmptySecret,

    /// Returned when the configured domain isn't a valid DNS name.
    #[error("invalid domain \"{0}\"")]
    InvalidDomain(String, #[source] ProtoError),

    /// Returned when a required environment variable is missing while
    /// [loading configuration from the environment][crate::config::Config::try_from_env].
    #[error("environment variable {0} is not set")]
    MissingEnv(&'static str),

    /// Returned when an environment variable can't be parsed.
    #[error("environment variable {var} has an invalid value: \"{value}\"")]
    InvalidEnv { var: &'static str, value: String },

    /// Returned when a generic IO error occurs.
    #[error("an IO error occurred")]
    IO(#[from] std::io::Error),

    /// Returned when [trying to load a `Config`][crate::config::Config::try_from_file] fails
    /// due to invalid JSON content.
    #[error("invalid JSON")]
    InvalidJSON(#[from] serde_json::Error),

    /// Returned when the DNS server encounters a generic DNS protocol error.
    #[error("DNS error")]
    DNSError(#[from] ProtoError),
}
