//! Error taxonomy for query option handling.
//!
//! - `Argument`: a required input was absent or empty. Raised where the input is consumed.
//! - `Validation`: untrusted input broke a configured limit or allow-list.
//! - `InvalidOperation`: the API was used in an unsupported combination.
//! - `Parse`: malformed option syntax, propagated from the parser unchanged.
//!
//! Nothing here is retried: every operation is deterministic given its inputs.

use std::fmt;

use crate::kind::QueryOptionKind;

/// Which configured ceiling a [`ValidationError::LimitExceeded`] refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LimitKind {
    MaxTop,
    MaxSkip,
    MaxExpansionDepth,
    LevelsMaxLiteralExpansionDepth,
    MaxNodeCount,
    MaxAnyAllExpressionDepth,
    MaxOrderByNodeCount,
}

impl fmt::Display for LimitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LimitKind::MaxTop => "MaxTop",
            LimitKind::MaxSkip => "MaxSkip",
            LimitKind::MaxExpansionDepth => "MaxExpansionDepth",
            LimitKind::LevelsMaxLiteralExpansionDepth => "LevelsMaxLiteralExpansionDepth",
            LimitKind::MaxNodeCount => "MaxNodeCount",
            LimitKind::MaxAnyAllExpressionDepth => "MaxAnyAllExpressionDepth",
            LimitKind::MaxOrderByNodeCount => "MaxOrderByNodeCount",
        };
        f.write_str(s)
    }
}

/// Structured validation failure. Always carries the offending option.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error(
        "the limit of '{allowed}' for {option} has been exceeded ({limit}); \
         the value from the request is '{observed}'"
    )]
    LimitExceeded {
        option: QueryOptionKind,
        limit: LimitKind,
        observed: u64,
        allowed: u64,
    },

    #[error("query option {option} is not allowed")]
    NotAllowed { option: QueryOptionKind },

    #[error("the value of {option} must not be empty")]
    EmptyValue { option: QueryOptionKind },

    #[error("property '{property}' cannot be used in {option}")]
    PropertyNotAllowed {
        option: QueryOptionKind,
        property: String,
    },

    #[error("{option} is not enabled for '{target}'")]
    Disabled {
        option: QueryOptionKind,
        target: String,
    },
}

impl ValidationError {
    #[must_use]
    pub fn option(&self) -> QueryOptionKind {
        match self {
            ValidationError::LimitExceeded { option, .. }
            | ValidationError::NotAllowed { option }
            | ValidationError::EmptyValue { option }
            | ValidationError::PropertyNotAllowed { option, .. }
            | ValidationError::Disabled { option, .. } => *option,
        }
    }
}

/// Unified error type for parsing, validating and composing query options.
#[derive(thiserror::Error, Debug, Clone)]
pub enum ODataError {
    #[error("argument '{name}' must not be null or empty")]
    Argument { name: &'static str },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("invalid {option}: {message}")]
    Parse {
        option: QueryOptionKind,
        message: String,
    },

    #[error("type '{0}' is not defined in the model")]
    UnknownType(String),

    #[error("binder failed: {0}")]
    Binder(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ODataError {
    pub(crate) fn parse(option: QueryOptionKind, message: impl Into<String>) -> Self {
        ODataError::Parse {
            option,
            message: message.into(),
        }
    }

    /// The validation failure, if this is one.
    #[must_use]
    pub fn as_validation(&self) -> Option<&ValidationError> {
        match self {
            ODataError::Validation(v) => Some(v),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ODataError>;
