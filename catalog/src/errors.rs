//! Catalog error types
//!
//! Every failure falls in one of four buckets: the catalog call itself
//! failed (transport), it answered in a shape we do not understand (parse),
//! the request named something we do not support (config), or the
//! persistent cache misbehaved. An empty search is never an error.

use thiserror::Error;

/// Error category for structured logging and behavior mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The external catalog command failed (spawn, non-zero exit)
    TransportError,
    /// Catalog output did not match the expected line/column/JSON shape
    ParseError,
    /// Unsupported scope/tier, malformed input name, or bad config file
    ConfigError,
    /// The persistent cache store could not be opened, read or written
    CacheError,
    /// Unexpected logic bugs (poisoned locks)
    InternalError,
}

impl ErrorCategory {
    /// Machine-readable code for logging
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TransportError => "TRANSPORT_ERROR",
            Self::ParseError => "PARSE_ERROR",
            Self::ConfigError => "CONFIG_ERROR",
            Self::CacheError => "CACHE_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Whether a caller-side retry has any chance of succeeding.
    ///
    /// Nothing in this crate retries; this is advisory for callers that wrap
    /// the transport.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransportError)
    }
}

/// Catalog error with category and context
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog command failed: {message}{}", render_stderr(.stderr))]
    Transport {
        message: String,
        /// Captured stderr of the failed command, if any
        stderr: Option<String>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("unexpected catalog output: {message}")]
    Parse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("config error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("cache error: {message}")]
    Cache {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("internal error: {message}")]
    Internal { message: String },
}

impl CatalogError {
    /// Get the error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Transport { .. } => ErrorCategory::TransportError,
            Self::Parse { .. } => ErrorCategory::ParseError,
            Self::Config { .. } => ErrorCategory::ConfigError,
            Self::Cache { .. } => ErrorCategory::CacheError,
            Self::Internal { .. } => ErrorCategory::InternalError,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    /// Create a transport error carrying the command's stderr
    pub fn transport(message: impl Into<String>, stderr: impl Into<String>) -> Self {
        let stderr = stderr.into();
        Self::Transport {
            message: message.into(),
            stderr: (!stderr.trim().is_empty()).then_some(stderr),
            source: None,
        }
    }

    /// Create a transport error with source
    pub fn transport_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Transport {
            message: message.into(),
            stderr: None,
            source: Some(Box::new(source)),
        }
    }

    /// Create a parse error
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
            source: None,
        }
    }

    /// Create a parse error with source
    pub fn parse_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Parse {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    /// Create a config error with source
    pub fn config_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a cache error with source
    pub fn cache_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Cache {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

fn render_stderr(stderr: &Option<String>) -> String {
    match stderr {
        Some(stderr) => format!("\n{}", stderr.trim_end()),
        None => String::new(),
    }
}

/// Result type for catalog operations
pub type Result<T> = std::result::Result<T, CatalogError>;
