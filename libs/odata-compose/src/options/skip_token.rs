use std::cell::OnceCell;
use std::sync::Arc;

use super::{OrderByOption, cached, require_raw};
use crate::config::QuerySettings;
use crate::context::QueryContext;
use crate::errors::Result;
use crate::parser::SkipToken;
use crate::queryable::{QueryBinder, Queryable};

/// `$skiptoken`
#[derive(Debug)]
pub struct SkipTokenOption {
    raw: String,
    context: Arc<QueryContext>,
    parsed: OnceCell<Result<SkipToken>>,
}

impl SkipTokenOption {
    /// # Errors
    /// Returns `ODataError::Argument` if `raw` is empty.
    pub fn new(raw: impl Into<String>, context: Arc<QueryContext>) -> Result<Self> {
        Ok(Self {
            raw: require_raw(raw, "skiptoken")?,
            context,
            parsed: OnceCell::new(),
        })
    }

    #[must_use]
    pub fn raw_value(&self) -> &str {
        &self.raw
    }

    /// # Errors
    /// Returns `ODataError::Parse` if the token is malformed.
    pub fn skip_token(&self) -> Result<&SkipToken> {
        cached(&self.parsed, || self.context.parser().parse_skip_token(&self.raw))
    }

    /// Continue after the token's row under the effective ordering.
    ///
    /// # Errors
    /// Returns parse or binder failures.
    pub fn apply_to<Q, B>(
        &self,
        query: Q,
        binder: &B,
        order_by: Option<&OrderByOption>,
        settings: &QuerySettings,
    ) -> Result<Q>
    where
        Q: Queryable,
        B: QueryBinder<Q> + ?Sized,
    {
        let order_by = order_by.map(OrderByOption::order_by_clause).transpose()?;
        binder.bind_skip_token(query, self.skip_token()?, order_by, settings)
    }
}
