use std::cell::OnceCell;
use std::sync::Arc;

use super::{ComputeOption, ParseEnv, cached, require_raw};
use crate::config::QuerySettings;
use crate::context::QueryContext;
use crate::errors::Result;
use crate::parser::{OrderByClause, OrderByNode};
use crate::queryable::{QueryBinder, Queryable};

/// `$orderby`
#[derive(Debug)]
pub struct OrderByOption {
    raw: String,
    context: Arc<QueryContext>,
    env: ParseEnv,
    parsed: OnceCell<Result<OrderByClause>>,
}

impl OrderByOption {
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
            raw: require_raw(raw, "orderby")?,
            context,
            env,
            parsed: OnceCell::new(),
        })
    }

    /// Option whose clause is already known; `raw` is kept for diagnostics.
    pub(crate) fn from_clause(
        raw: String,
        context: Arc<QueryContext>,
        env: ParseEnv,
        clause: OrderByClause,
    ) -> Self {
        Self {
            raw,
            context,
            env,
            parsed: OnceCell::from(Ok(clause)),
        }
    }

    #[must_use]
    pub fn raw_value(&self) -> &str {
        &self.raw
    }

    #[must_use]
    pub fn context(&self) -> &Arc<QueryContext> {
        &self.context
    }

    pub(crate) fn env(&self) -> &ParseEnv {
        &self.env
    }

    /// # Errors
    /// Returns the parser's error if `$orderby` is malformed.
    pub fn order_by_clause(&self) -> Result<&OrderByClause> {
        cached(&self.parsed, || {
            let scope = self.env.scope(&self.context)?;
            self.context.parser().parse_order_by(&self.raw, &scope)
        })
    }

    /// Nodes in major-to-minor order.
    ///
    /// # Errors
    /// Returns the parser's error if `$orderby` is malformed.
    pub fn order_by_nodes(&self) -> Result<&[OrderByNode]> {
        self.order_by_clause().map(OrderByClause::nodes)
    }

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
        binder.bind_order_by(query, self.order_by_clause()?, compute, settings)
    }
}
