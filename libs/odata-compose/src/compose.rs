//! Composition of query options onto a data source.
//!
//! The application order is fixed:
//! `$apply` -> `$filter` -> `$search` -> `$count` -> stable order -> `$orderby`
//! -> `$skiptoken` -> auto select/expand -> `$select`/`$expand` -> `$skip`
//! -> `$top` -> page-size limit.
//! A step runs only when its option is present and not in the ignore-set.

use std::sync::Arc;

use crate::config::QuerySettings;
use crate::errors::{ODataError, Result};
use crate::kind::{AllowedQueryOptions, QueryOptionKind};
use crate::options::SelectExpandOption;
use crate::query_options::ODataQueryOptions;
use crate::queryable::{EntityBinder, QueryBinder, Queryable};
use crate::result_limit::limit_results;

/// Result of [`ODataQueryOptions::apply_to`].
#[derive(Debug)]
#[must_use]
pub struct AppliedQuery<Q> {
    pub query: Q,
    /// Rows beyond the page size existed and were cut off.
    pub results_limited: bool,
    /// Total count before paging, when `$count=true` and the binder can count.
    pub total_count: Option<u64>,
    /// Effective page size, if one was applied.
    pub page_size: Option<u64>,
}

impl<Q> AppliedQuery<Q> {
    fn unpaged(query: Q, total_count: Option<u64>) -> Self {
        Self {
            query,
            results_limited: false,
            total_count,
            page_size: None,
        }
    }
}

enum Shaping<'a> {
    Borrowed(&'a SelectExpandOption),
    Derived(SelectExpandOption),
}

impl Shaping<'_> {
    fn get(&self) -> &SelectExpandOption {
        match self {
            Shaping::Borrowed(o) => o,
            Shaping::Derived(o) => o,
        }
    }
}

impl ODataQueryOptions {
    /// Configured page size: caller setting first, then the model.
    fn configured_page_size(&self, settings: &QuerySettings) -> Option<u64> {
        settings
            .page_size
            .or_else(|| self.context.model_bound_page_size())
    }

    /// Configured page size capped by the client's preference; `None` unless positive.
    #[must_use]
    pub fn effective_page_size(&self, settings: &QuerySettings) -> Option<u64> {
        let configured = self.configured_page_size(settings)?;
        let size = match settings.preferred_max_page_size {
            Some(preferred) => configured.min(preferred),
            None => configured,
        };
        (size > 0).then_some(size)
    }

    /// Select/expand option with ignored halves removed. `None` if nothing is left.
    fn shaping(&self, ignored: AllowedQueryOptions) -> Result<Option<Shaping<'_>>> {
        let Some(original) = &self.select_expand else {
            return Ok(None);
        };
        let ignore_select = ignored.contains(QueryOptionKind::Select);
        let ignore_expand = ignored.contains(QueryOptionKind::Expand);
        let (select, expand) = match (ignore_select, ignore_expand) {
            (false, false) => return Ok(Some(Shaping::Borrowed(original))),
            (true, true) => return Ok(None),
            (true, false) => (None, original.raw_expand()),
            (false, true) => (original.raw_select(), None),
        };
        if select.is_none() && expand.is_none() {
            return Ok(None);
        }
        let derived = SelectExpandOption::with_env(
            select,
            expand,
            Arc::clone(&self.context),
            original.env().clone(),
        )?
        .with_levels_max_literal_expansion_depth(original.levels_max_literal_expansion_depth());
        Ok(Some(Shaping::Derived(derived)))
    }

    /// Apply every available option to `query` in the fixed order.
    ///
    /// Mutates only cached state on the options (stable order, auto
    /// select/expand, memoized clauses); `settings` is never modified.
    ///
    /// # Errors
    /// Returns parse failures of any option touched, or binder failures.
    pub fn apply_to<Q, B>(
        &mut self,
        query: Q,
        binder: &B,
        settings: &QuerySettings,
    ) -> Result<AppliedQuery<Q>>
    where
        Q: Queryable,
        B: QueryBinder<Q> + ?Sized,
    {
        let ignored = settings.ignored_query_options;
        let available = |kind: QueryOptionKind| !ignored.contains(kind);
        let mut query = query;

        if let Some(apply) = self.apply.as_ref().filter(|_| available(QueryOptionKind::Apply)) {
            query = apply.apply_to(query, binder, settings)?;
            tracing::debug!(option = "$apply", "applied");
        }

        let compute = self
            .compute
            .as_ref()
            .filter(|_| available(QueryOptionKind::Compute));

        if let Some(filter) = self.filter.as_ref().filter(|_| available(QueryOptionKind::Filter)) {
            query = filter.apply_to(query, binder, compute, settings)?;
            tracing::debug!(option = "$filter", computed = compute.is_some(), "applied");
        }

        if let Some(search) = self.search.as_ref().filter(|_| available(QueryOptionKind::Search)) {
            query = search.apply_to(query, binder, settings)?;
            tracing::debug!(option = "$search", "applied");
        }

        let mut total_count = None;
        if let Some(count) = self.count.as_ref().filter(|_| available(QueryOptionKind::Count)) {
            total_count = count.entity_count(&query, binder)?;
            if self.context.path().is_count_request() {
                tracing::debug!(
                    total_count = ?total_count,
                    "count request, remaining options skipped"
                );
                return Ok(AppliedQuery::unpaged(query, total_count));
            }
        }

        let page_size = self.effective_page_size(settings);
        let mut order_by = self.order_by.as_ref();
        let paged = (self.skip.is_some() && available(QueryOptionKind::Skip))
            || (self.top.is_some() && available(QueryOptionKind::Top))
            || self.configured_page_size(settings).is_some();
        if settings.ensure_stable_ordering && paged {
            order_by = self.generate_stable_order()?;
        }

        if let Some(order_by) = order_by.filter(|_| available(QueryOptionKind::OrderBy)) {
            query = order_by.apply_to(query, binder, compute, settings)?;
            tracing::debug!(option = "$orderby", orderby = %order_by.raw_value(), "applied");
        }

        if let Some(token) = self
            .skip_token
            .as_ref()
            .filter(|_| available(QueryOptionKind::SkipToken))
        {
            query = token.apply_to(query, binder, order_by, settings)?;
            tracing::debug!(option = "$skiptoken", "applied");
        }

        self.add_auto_select_expand()?;
        if let Some(shaping) = self.shaping(ignored)? {
            query = shaping.get().apply_to(query, binder, settings)?;
            tracing::debug!(option = "$select/$expand", "applied");
        }

        if let Some(skip) = self.skip.as_ref().filter(|_| available(QueryOptionKind::Skip)) {
            query = skip.apply_to(query)?;
            tracing::debug!(option = "$skip", "applied");
        }

        if let Some(top) = self.top.as_ref().filter(|_| available(QueryOptionKind::Top)) {
            query = top.apply_to(query)?;
            tracing::debug!(option = "$top", "applied");
        }

        let Some(limit) = page_size else {
            return Ok(AppliedQuery::unpaged(query, total_count));
        };
        let (query, results_limited) = limit_results(query, limit).into_parts();
        Ok(AppliedQuery {
            query,
            results_limited,
            total_count,
            page_size: Some(limit),
        })
    }

    /// [`ODataQueryOptions::apply_to`] with a different ignore-set. The caller's
    /// settings are copied, not modified.
    ///
    /// # Errors
    /// See [`ODataQueryOptions::apply_to`].
    pub fn apply_to_with_ignored<Q, B>(
        &mut self,
        query: Q,
        binder: &B,
        settings: &QuerySettings,
        ignored: AllowedQueryOptions,
    ) -> Result<AppliedQuery<Q>>
    where
        Q: Queryable,
        B: QueryBinder<Q> + ?Sized,
    {
        let mut settings = settings.clone();
        settings.ignored_query_options = ignored;
        self.apply_to(query, binder, &settings)
    }

    /// Apply select/expand to a single entity. Returns the entity unchanged
    /// when no select/expand applies.
    ///
    /// # Errors
    /// Returns `ODataError::InvalidOperation` if `$filter`, `$orderby`, `$top`,
    /// `$skip` or `$count` is present, plus parse or binder failures.
    pub fn apply_to_entity<E, B>(
        &mut self,
        entity: E,
        binder: &B,
        settings: &QuerySettings,
    ) -> Result<E>
    where
        B: EntityBinder<E> + ?Sized,
    {
        let conflicting: Vec<&str> = [
            (self.filter.is_some(), QueryOptionKind::Filter),
            (self.order_by.is_some(), QueryOptionKind::OrderBy),
            (self.top.is_some(), QueryOptionKind::Top),
            (self.skip.is_some(), QueryOptionKind::Skip),
            (self.count.is_some(), QueryOptionKind::Count),
        ]
        .into_iter()
        .filter_map(|(present, kind)| present.then_some(kind.name()))
        .collect();
        if !conflicting.is_empty() {
            return Err(ODataError::InvalidOperation(format!(
                "{} cannot be applied to a single entity",
                conflicting.join(", ")
            )));
        }

        self.add_auto_select_expand()?;
        match self.shaping(settings.ignored_query_options)? {
            Some(shaping) => shaping.get().apply_to_entity(entity, binder, settings),
            None => Ok(entity),
        }
    }
}
