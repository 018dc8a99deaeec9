#![forbid(unsafe_code)]

//! Error types for the runtime.

use thiserror::Error;

use crate::property::PropertyId;

/// A property chain that cannot be observed from the given root.
///
/// Returned synchronously when a path observer is constructed; a valid
/// chain never fails later.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("property chain is empty")]
    Empty,

    #[error("{property} is not declared on root type {root}")]
    NotOnRootType {
        property: PropertyId,
        root: &'static str,
    },

    #[error("{property} does not refer to a reactive object and cannot be followed")]
    NotALink { property: PropertyId },

    #[error("{property} is not declared on {expected}, the type the previous link refers to")]
    WrongOwner {
        property: PropertyId,
        expected: &'static str,
    },

    #[error("{property} holds {found}, not {expected}")]
    TerminalType {
        property: PropertyId,
        expected: &'static str,
        found: &'static str,
    },
}

/// Invalid runtime configuration value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("unknown store kind {0:?} (expected \"hash\" or \"linear\")")]
    UnknownStore(String),

    #[error("invalid boolean {value:?} for {key}")]
    InvalidBool { key: &'static str, value: String },
}

/// Result alias for chain validation.
pub type ChainResult<T> = Result<T, ChainError>;
