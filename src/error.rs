//! Error types for xmlcatalog
//!
//! This module defines all error types used throughout the library.
//!
//! A catalog miss is never an error: lookup returns an unresolved
//! [`CatalogLookup`](crate::response::CatalogLookup) and resolution returns
//! an unresolved [`ResourceResponse`](crate::response::ResourceResponse).
//! The variants here cover genuinely exceptional conditions: unusable URIs,
//! unloadable catalogs, denied or failed retrievals.

use thiserror::Error;

/// Result type alias using the xmlcatalog Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for catalog resolution operations
#[derive(Error, Debug)]
pub enum Error {
    /// A URI could not be parsed or combined with its base
    #[error("malformed URI: {0}")]
    MalformedUri(String),

    /// A catalog document could not be parsed (always fatal for that
    /// catalog; individual bad entries are only fatal in strict mode)
    #[error("catalog parse error: {0}")]
    CatalogParse(String),

    /// The URI's scheme is not on the configured allow-list
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// Redirect following revisited a URI it had already seen
    #[error("redirect loop at {0}")]
    RedirectLoop(String),

    /// Redirect following exceeded the hop limit
    #[error("too many redirects at {0}")]
    TooManyRedirects(String),

    /// A resource limit was exceeded
    #[error("limit exceeded: {0}")]
    LimitExceeded(String),

    /// Configuration error (bad environment variable or property file)
    #[error("configuration error: {0}")]
    Config(String),

    /// A RDDL document could not be fetched or scanned
    #[error("RDDL error: {0}")]
    Rddl(String),

    /// The URI scheme has no fetch backend
    #[error("unsupported scheme: {0}")]
    Unsupported(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// URL parsing error
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}
