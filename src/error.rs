/*
 * Copyright 2025 Oxide Computer Company
 */

use thiserror::Error;

use crate::client::ClientError;

pub type Result<T> = std::result::Result<T, Error>;

/*
 * Callers generally only care which of these buckets an error falls into:
 * a validation error is a defect in whatever produced the intent, a missing
 * dependency is worth retrying later, and anything else came from the
 * device or the transport.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Dependency,
    Transport,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("unsupported interface format {0:?}")]
    UnsupportedInterface(String),
    #[error("{what} {value} is out of range [{min}, {max}]")]
    OutOfRange { what: &'static str, value: u64, min: u64, max: u64 },
    #[error("invalid {what}: {value:?}")]
    InvalidValue { what: &'static str, value: String },
    #[error("duplicate {what}: {value}")]
    Duplicate { what: &'static str, value: String },
    #[error("overlapping prefixes: {0} and {1}")]
    OverlappingPrefixes(String, String),
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error("certificate: {0}")]
    Certificate(#[from] openssl::error::ErrorStack),
    #[error("{what} does not exist on the device ({path})")]
    MissingDependency { what: String, path: String },
    #[error("transport: {0}")]
    Transport(#[from] ClientError),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::MissingDependency { .. } => ErrorKind::Dependency,
            Error::Transport(_) => ErrorKind::Transport,
            _ => ErrorKind::Validation,
        }
    }

    pub fn is_dependency(&self) -> bool {
        self.kind() == ErrorKind::Dependency
    }

    pub(crate) fn out_of_range(
        what: &'static str,
        value: impl Into<u64>,
        min: u64,
        max: u64,
    ) -> Error {
        Error::OutOfRange { what, value: value.into(), min, max }
    }

    pub(crate) fn invalid_value(what: &'static str, value: &str) -> Error {
        Error::InvalidValue { what, value: value.to_string() }
    }
}
