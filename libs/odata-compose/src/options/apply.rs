use std::cell::OnceCell;
use std::sync::Arc;

use super::{ParseEnv, cached, require_raw};
use crate::config::QuerySettings;
use crate::context::QueryContext;
use crate::errors::Result;
use crate::parser::ApplyClause;
use crate::queryable::{QueryBinder, Queryable};

/// `$apply`
#[derive(Debug)]
pub struct ApplyOption {
    raw: String,
    context: Arc<QueryContext>,
    env: ParseEnv,
    parsed: OnceCell<Result<ApplyClause>>,
}

impl ApplyOption {
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
            raw: require_raw(raw, "apply")?,
            context,
            env: env.aliases_only(),
            parsed: OnceCell::new(),
        })
    }

    #[must_use]
    pub fn raw_value(&self) -> &str {
        &self.raw
    }

    /// # Errors
    /// Returns the parser's error if `$apply` is malformed.
    pub fn apply_clause(&self) -> Result<&ApplyClause> {
        cached(&self.parsed, || {
            let scope = self.env.scope(&self.context)?;
            self.context.parser().parse_apply(&self.raw, &scope)
        })
    }

    /// # Errors
    /// Returns parse or binder failures.
    pub fn apply_to<Q, B>(&self, query: Q, binder: &B, settings: &QuerySettings) -> Result<Q>
    where
        Q: Queryable,
        B: QueryBinder<Q> + ?Sized,
    {
        binder.bind_apply(query, self.apply_clause()?, settings)
    }
}
