//! Mapping from query errors to RFC 9457 Problem Details (pure data).
//!
//! No HTTP framework is involved; hosts add `instance` and trace ids before
//! turning the problem into a response.

use http::StatusCode;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::{ODataError, ValidationError};

/// Content type for Problem Details as per RFC 9457.
pub const APPLICATION_PROBLEM_JSON: &str = "application/problem+json";

#[allow(clippy::trivially_copy_pass_by_ref)] // serde requires &T signature
fn serialize_status_code<S>(status: &StatusCode, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_u16(status.as_u16())
}

fn deserialize_status_code<'de, D>(deserializer: D) -> Result<StatusCode, D::Error>
where
    D: Deserializer<'de>,
{
    let code = u16::deserialize(deserializer)?;
    StatusCode::from_u16(code).map_err(serde::de::Error::custom)
}

/// RFC 9457 Problem Details.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[must_use]
pub struct Problem {
    #[serde(rename = "type")]
    pub type_url: String,
    pub title: String,
    /// Serialized as `u16`.
    #[serde(
        serialize_with = "serialize_status_code",
        deserialize_with = "deserialize_status_code"
    )]
    pub status: StatusCode,
    pub detail: String,
    pub instance: String,
    /// Machine-readable error code.
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<QueryOptionViolation>>,
}

/// One offending query option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryOptionViolation {
    /// `$`-prefixed option name, e.g. `$top`.
    pub option: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl Problem {
    pub fn new(status: StatusCode, title: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            type_url: "about:blank".to_owned(),
            title: title.into(),
            status,
            detail: detail.into(),
            instance: String::new(),
            code: String::new(),
            errors: None,
        }
    }

    pub fn with_type(mut self, type_url: impl Into<String>) -> Self {
        self.type_url = type_url.into();
        self
    }

    pub fn with_instance(mut self, uri: impl Into<String>) -> Self {
        self.instance = uri.into();
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = code.into();
        self
    }

    pub fn with_errors(mut self, errors: Vec<QueryOptionViolation>) -> Self {
        self.errors = Some(errors);
        self
    }
}

fn validation_code(err: &ValidationError) -> &'static str {
    match err {
        ValidationError::LimitExceeded { .. } => "odata.limit_exceeded",
        ValidationError::NotAllowed { .. } => "odata.option_not_allowed",
        ValidationError::EmptyValue { .. } => "odata.empty_value",
        ValidationError::PropertyNotAllowed { .. } => "odata.property_not_allowed",
        ValidationError::Disabled { .. } => "odata.option_disabled",
    }
}

impl From<&ODataError> for Problem {
    fn from(err: &ODataError) -> Self {
        let detail = err.to_string();
        match err {
            ODataError::Validation(v) => {
                let code = validation_code(v);
                Problem::new(StatusCode::BAD_REQUEST, "Invalid Query Option", detail.clone())
                    .with_code(code)
                    .with_errors(vec![QueryOptionViolation {
                        option: v.option().name().to_owned(),
                        message: detail,
                        code: Some(code.to_owned()),
                    }])
            }
            ODataError::Parse { option, .. } => {
                Problem::new(StatusCode::BAD_REQUEST, "Malformed Query Option", detail.clone())
                    .with_code("odata.parse_error")
                    .with_errors(vec![QueryOptionViolation {
                        option: option.name().to_owned(),
                        message: detail,
                        code: None,
                    }])
            }
            ODataError::Argument { .. } => {
                Problem::new(StatusCode::BAD_REQUEST, "Bad Request", detail)
                    .with_code("odata.argument")
            }
            ODataError::UnknownType(_)
            | ODataError::InvalidOperation(_)
            | ODataError::Binder(_)
            | ODataError::Config(_) => {
                tracing::warn!(error = %err, "internal error while composing query");
                Problem::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error",
                    "An internal error occurred while processing the query options",
                )
                .with_code("odata.internal")
            }
        }
    }
}

impl From<ODataError> for Problem {
    fn from(err: ODataError) -> Self {
        Problem::from(&err)
    }
}
