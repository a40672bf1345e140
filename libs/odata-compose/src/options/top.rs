use std::cell::OnceCell;
use std::sync::Arc;

use super::{cached, require_raw};
use crate::context::QueryContext;
use crate::errors::{ODataError, Result};
use crate::kind::QueryOptionKind;
use crate::queryable::Queryable;

/// `$top`
#[derive(Debug)]
pub struct TopOption {
    raw: String,
    context: Arc<QueryContext>,
    value: OnceCell<Result<u64>>,
}

impl TopOption {
    /// # Errors
    /// Returns `ODataError::Argument` if `raw` is empty.
    pub fn new(raw: impl Into<String>, context: Arc<QueryContext>) -> Result<Self> {
        Ok(Self {
            raw: require_raw(raw, "top")?,
            context,
            value: OnceCell::new(),
        })
    }

    #[must_use]
    pub fn raw_value(&self) -> &str {
        &self.raw
    }

    #[must_use]
    pub fn context(&self) -> &Arc<QueryContext> {
        &self.context
    }

    /// # Errors
    /// Returns `ODataError::Parse` unless the value is a non-negative integer.
    pub fn value(&self) -> Result<u64> {
        cached(&self.value, || parse_count_value(&self.raw, QueryOptionKind::Top)).copied()
    }

    /// # Errors
    /// Returns `ODataError::Parse` if the value is malformed.
    pub fn apply_to<Q: Queryable>(&self, query: Q) -> Result<Q> {
        Ok(query.take(self.value()?))
    }
}

pub(super) fn parse_count_value(raw: &str, option: QueryOptionKind) -> Result<u64> {
    raw.trim().parse::<u64>().map_err(|_| {
        ODataError::parse(option, format!("'{raw}' is not a non-negative integer"))
    })
}
