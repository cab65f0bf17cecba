use thiserror::Error;

/// Unified error type for every cfgtree crate.
#[derive(Error, Debug)]
pub enum ConfigError {
    // ── Validation errors ──────────────────────────────────────
    #[error("invalid value: {0}")]
    InvalidValue(String),

    #[error("key already exists: {0}")]
    AlreadyExistsKey(String),

    #[error("no such entry: {0}")]
    NotFound(String),

    // ── Persistence errors ─────────────────────────────────────
    #[error("config version mismatch: found {found:?}, expected {expected}")]
    VersionMismatch {
        found: Option<String>,
        expected: String,
    },

    #[error("parse error at line {line}: {reason}")]
    Parse { line: usize, reason: String },

    // ── Generic wrappers ───────────────────────────────────────
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("version error: {0}")]
    Version(#[from] semver::Error),
}

impl ConfigError {
    pub fn invalid(what: impl std::fmt::Display) -> Self {
        ConfigError::InvalidValue(what.to_string())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ConfigError::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;
