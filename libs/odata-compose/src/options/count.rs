use std::cell::OnceCell;
use std::sync::Arc;

use super::{cached, require_raw};
use crate::context::QueryContext;
use crate::errors::{ODataError, Result};
use crate::kind::QueryOptionKind;
use crate::queryable::{QueryBinder, Queryable};

/// `$count`
#[derive(Debug)]
pub struct CountOption {
    raw: String,
    context: Arc<QueryContext>,
    value: OnceCell<Result<bool>>,
}

impl CountOption {
    /// # Errors
    /// Returns `ODataError::Argument` if `raw` is empty.
    pub fn new(raw: impl Into<String>, context: Arc<QueryContext>) -> Result<Self> {
        Ok(Self {
            raw: require_raw(raw, "count")?,
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
    /// Returns `ODataError::Parse` unless the value is `true` or `false`.
    pub fn value(&self) -> Result<bool> {
        cached(&self.value, || match self.raw.trim() {
            v if v.eq_ignore_ascii_case("true") => Ok(true),
            v if v.eq_ignore_ascii_case("false") => Ok(false),
            v => Err(ODataError::parse(
                QueryOptionKind::Count,
                format!("'{v}' is not 'true' or 'false'"),
            )),
        })
        .copied()
    }

    /// Total count of `query` when `$count=true`; `None` when counting was not
    /// requested or the source cannot count.
    ///
    /// # Errors
    /// Returns parse or binder failures.
    pub fn entity_count<Q, B>(&self, query: &Q, binder: &B) -> Result<Option<u64>>
    where
        Q: Queryable,
        B: QueryBinder<Q> + ?Sized,
    {
        if !self.value()? {
            return Ok(None);
        }
        binder.count(query)
    }
}
