use std::cell::OnceCell;
use std::sync::Arc;

use super::{cached, require_raw};
use crate::config::QuerySettings;
use crate::context::QueryContext;
use crate::errors::Result;
use crate::parser::SearchExpr;
use crate::queryable::{QueryBinder, Queryable};

/// `$search`
#[derive(Debug)]
pub struct SearchOption {
    raw: String,
    context: Arc<QueryContext>,
    parsed: OnceCell<Result<SearchExpr>>,
}

impl SearchOption {
    /// # Errors
    /// Returns `ODataError::Argument` if `raw` is empty.
    pub fn new(raw: impl Into<String>, context: Arc<QueryContext>) -> Result<Self> {
        Ok(Self {
            raw: require_raw(raw, "search")?,
            context,
            parsed: OnceCell::new(),
        })
    }

    #[must_use]
    pub fn raw_value(&self) -> &str {
        &self.raw
    }

    /// # Errors
    /// Returns the parser's error if `$search` is malformed.
    pub fn search_clause(&self) -> Result<&SearchExpr> {
        cached(&self.parsed, || self.context.parser().parse_search(&self.raw))
    }

    /// # Errors
    /// Returns parse or binder failures.
    pub fn apply_to<Q, B>(&self, query: Q, binder: &B, settings: &QuerySettings) -> Result<Q>
    where
        Q: Queryable,
        B: QueryBinder<Q> + ?Sized,
    {
        binder.bind_search(query, self.search_clause()?, settings)
    }
}
