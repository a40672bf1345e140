use std::cell::OnceCell;
use std::sync::Arc;

use super::{ParseEnv, cached};
use crate::config::QuerySettings;
use crate::context::QueryContext;
use crate::errors::{ODataError, Result};
use crate::parser::SelectExpandClause;
use crate::queryable::{EntityBinder, QueryBinder, Queryable};

/// Depth `$levels=max` unrolls to unless configured otherwise.
pub const DEFAULT_LEVELS_MAX_LITERAL_EXPANSION_DEPTH: u32 = 2;

/// `$select` and `$expand`, parsed together.
#[derive(Debug)]
pub struct SelectExpandOption {
    raw_select: Option<String>,
    raw_expand: Option<String>,
    context: Arc<QueryContext>,
    env: ParseEnv,
    levels_max_literal_expansion_depth: u32,
    parsed: OnceCell<Result<SelectExpandClause>>,
    processed: OnceCell<Result<SelectExpandClause>>,
}

impl SelectExpandOption {
    /// # Errors
    /// Returns `ODataError::Argument` if both strings are absent or empty.
    pub fn new(
        select: Option<&str>,
        expand: Option<&str>,
        context: Arc<QueryContext>,
    ) -> Result<Self> {
        Self::with_env(select, expand, context, ParseEnv::default())
    }

    pub(crate) fn with_env(
        select: Option<&str>,
        expand: Option<&str>,
        context: Arc<QueryContext>,
        env: ParseEnv,
    ) -> Result<Self> {
        let select = select.filter(|s| !s.is_empty()).map(str::to_owned);
        let expand = expand.filter(|s| !s.is_empty()).map(str::to_owned);
        if select.is_none() && expand.is_none() {
            return Err(ODataError::Argument { name: "select" });
        }
        Ok(Self {
            raw_select: select,
            raw_expand: expand,
            context,
            env,
            levels_max_literal_expansion_depth: DEFAULT_LEVELS_MAX_LITERAL_EXPANSION_DEPTH,
            parsed: OnceCell::new(),
            processed: OnceCell::new(),
        })
    }

    /// Set the depth `$levels=max` unrolls to. Drops any memoized processed clause.
    #[must_use]
    pub fn with_levels_max_literal_expansion_depth(mut self, depth: u32) -> Self {
        self.levels_max_literal_expansion_depth = depth;
        self.processed = OnceCell::new();
        self
    }

    #[must_use]
    pub fn raw_select(&self) -> Option<&str> {
        self.raw_select.as_deref()
    }

    #[must_use]
    pub fn raw_expand(&self) -> Option<&str> {
        self.raw_expand.as_deref()
    }

    #[must_use]
    pub fn context(&self) -> &Arc<QueryContext> {
        &self.context
    }

    pub(crate) fn env(&self) -> &ParseEnv {
        &self.env
    }

    #[must_use]
    pub fn levels_max_literal_expansion_depth(&self) -> u32 {
        self.levels_max_literal_expansion_depth
    }

    /// Clause as written, `$levels` not yet unrolled.
    ///
    /// # Errors
    /// Returns the parser's error if either string is malformed.
    pub fn select_expand_clause(&self) -> Result<&SelectExpandClause> {
        cached(&self.parsed, || {
            let scope = self.env.scope(&self.context)?;
            self.context.parser().parse_select_expand(
                self.raw_select.as_deref(),
                self.raw_expand.as_deref(),
                &scope,
            )
        })
    }

    /// Clause with every `$levels` unrolled; memoized.
    ///
    /// # Errors
    /// Returns the parser's error if either string is malformed.
    pub fn processed_select_expand_clause(&self) -> Result<&SelectExpandClause> {
        cached(&self.processed, || {
            let clause = self.select_expand_clause()?;
            Ok(clause.process_levels(self.levels_max_literal_expansion_depth))
        })
    }

    /// # Errors
    /// Returns parse or binder failures.
    pub fn apply_to<Q, B>(&self, query: Q, binder: &B, settings: &QuerySettings) -> Result<Q>
    where
        Q: Queryable,
        B: QueryBinder<Q> + ?Sized,
    {
        binder.bind_select_expand(query, self.processed_select_expand_clause()?, settings)
    }

    /// # Errors
    /// Returns parse or binder failures.
    pub fn apply_to_entity<E, B>(
        &self,
        entity: E,
        binder: &B,
        settings: &QuerySettings,
    ) -> Result<E>
    where
        B: EntityBinder<E> + ?Sized,
    {
        binder.bind_select_expand(entity, self.processed_select_expand_clause()?, settings)
    }
}
