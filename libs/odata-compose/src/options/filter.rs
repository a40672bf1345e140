use std::cell::OnceCell;
use std::sync::Arc;

use super::{ComputeOption, ParseEnv, cached, require_raw};
use crate::ast::FilterClause;
use crate::config::QuerySettings;
use crate::context::QueryContext;
use crate::errors::Result;
use crate::queryable::{QueryBinder, Queryable};

/// `$filter`
#[derive(Debug)]
pub struct FilterOption {
    raw: String,
    context: Arc<QueryContext>,
    env: ParseEnv,
    parsed: OnceCell<Result<FilterClause>>,
}

impl FilterOption {
    /// # Errors
    /// Returns `ODataError::Argument` if `raw` is empty.
    pub fn new(raw: impl Into<String>, context: Arc<QueryContext>) -> Result<Self> {
        Self::with_env(raw, context, ParseEnv::default())
    }

    pub(crate) fn with_env(
        raw: impl Into<String>,
        context: Arc<QueryContext>,
        env: ParseEnv,
    ) -> Result<Self> {
        Ok(Self {
            raw: require_raw(raw, "filter")?,
            context,
            env,
            parsed: OnceCell::new(),
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
    /// Returns the parser's error if `$filter` is malformed.
    pub fn filter_clause(&self) -> Result<&FilterClause> {
        cached(&self.parsed, || {
            let scope = self.env.scope(&self.context)?;
            self.context.parser().parse_filter(&self.raw, &scope)
        })
    }

    /// Bind the filter, with `$compute` aliases addressable when given.
    ///
    /// # Errors
    /// Returns parse or binder failures.
    pub fn apply_to<Q, B>(
        &self,
        query: Q,
        binder: &B,
        compute: Option<&ComputeOption>,
        settings: &QuerySettings,
    ) -> Result<Q>
    where
        Q: Queryable,
        B: QueryBinder<Q> + ?Sized,
    {
        let compute = compute.map(ComputeOption::compute_clause).transpose()?;
        binder.bind_filter(query, self.filter_clause()?, compute, settings)
    }
}
