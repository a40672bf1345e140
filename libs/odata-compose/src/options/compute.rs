use std::cell::OnceCell;
use std::sync::Arc;

use super::{ParseEnv, cached, require_raw};
use crate::context::QueryContext;
use crate::errors::Result;
use crate::parser::ComputeClause;

/// `$compute`
#[derive(Debug)]
pub struct ComputeOption {
    raw: String,
    context: Arc<QueryContext>,
    env: ParseEnv,
    parsed: OnceCell<Result<ComputeClause>>,
}

impl ComputeOption {
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
            raw: require_raw(raw, "compute")?,
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
    /// Returns the parser's error if `$compute` is malformed.
    pub fn compute_clause(&self) -> Result<&ComputeClause> {
        cached(&self.parsed, || {
            let scope = self.env.scope(&self.context)?;
            self.context.parser().parse_compute(&self.raw, &scope)
        })
    }
}
