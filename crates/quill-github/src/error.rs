//! Error types for quill-github.

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during GitHub API operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Authentication failed or token rejected.
    #[error("GitHub authentication failed - run `gh auth login` or set GITHUB_TOKEN")]
    AuthenticationFailed,

    /// Token not found.
    #[error("no GitHub token found - run `gh auth login` or set GITHUB_TOKEN")]
    NoToken,

    /// API rate limit exceeded.
    #[error("GitHub API rate limit exceeded - wait and try again")]
    RateLimited,

    /// Requested object, ref, or repository does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Ref creation collided with an existing ref of the same name.
    #[error("reference already exists: {0}")]
    ReferenceExists(String),

    /// Ref update rejected because it is not a fast-forward.
    #[error("ref update is not a fast-forward: {0}")]
    NotFastForward(String),

    /// Request was well-formed but semantically rejected (HTTP 422).
    #[error("GitHub rejected the request: {message}")]
    Unprocessable { message: String },

    /// API error with status code.
    #[error("GitHub API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    /// Network error.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// JSON parsing error.
    #[error("failed to parse GitHub response: {0}")]
    Parse(#[from] serde_json::Error),

    /// IO error (e.g., reading gh CLI token).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
