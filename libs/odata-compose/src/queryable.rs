//! Data-source seam.
//!
//! A [`Queryable`] is a transformation plan over some backend; this crate only
//! decides which clause is applied when. Turning a clause into a predicate,
//! sort or projection is the job of a [`QueryBinder`].

use crate::ast::FilterClause;
use crate::config::QuerySettings;
use crate::errors::{ODataError, Result};
use crate::parser::{
    ApplyClause, ComputeClause, OrderByClause, SearchExpr, SelectExpandClause, SkipToken,
};

/// Paging operations every data source supports directly.
pub trait Queryable: Sized {
    #[must_use]
    fn skip(self, n: u64) -> Self;

    #[must_use]
    fn take(self, n: u64) -> Self;

    /// Bounded take that also reports whether rows beyond `limit` existed.
    /// Remote sources typically fetch `limit + 1` rows and drop the extra one.
    fn take_limited(self, limit: u64) -> (Self, bool);
}

/// Clause binders for a collection source.
///
/// `bind_filter` and `bind_order_by` are required; the other clauses default
/// to a `Binder` error so a source that cannot search or reshape says so.
pub trait QueryBinder<Q: Queryable> {
    /// # Errors
    /// Returns `ODataError::Binder` if the clause cannot be applied.
    fn bind_filter(
        &self,
        query: Q,
        clause: &FilterClause,
        compute: Option<&ComputeClause>,
        settings: &QuerySettings,
    ) -> Result<Q>;

    /// # Errors
    /// Returns `ODataError::Binder` if the clause cannot be applied.
    fn bind_order_by(
        &self,
        query: Q,
        clause: &OrderByClause,
        compute: Option<&ComputeClause>,
        settings: &QuerySettings,
    ) -> Result<Q>;

    /// # Errors
    /// Returns `ODataError::Binder` if the clause cannot be applied.
    fn bind_apply(&self, _query: Q, _clause: &ApplyClause, _settings: &QuerySettings) -> Result<Q> {
        Err(ODataError::Binder("$apply is not supported by this source".to_owned()))
    }

    /// # Errors
    /// Returns `ODataError::Binder` if the clause cannot be applied.
    fn bind_search(&self, _query: Q, _expr: &SearchExpr, _settings: &QuerySettings) -> Result<Q> {
        Err(ODataError::Binder("$search is not supported by this source".to_owned()))
    }

    /// Continue after the row described by `token`, under `order_by`.
    ///
    /// # Errors
    /// Returns `ODataError::Binder` if the token cannot be applied.
    fn bind_skip_token(
        &self,
        _query: Q,
        _token: &SkipToken,
        _order_by: Option<&OrderByClause>,
        _settings: &QuerySettings,
    ) -> Result<Q> {
        Err(ODataError::Binder("$skiptoken is not supported by this source".to_owned()))
    }

    /// # Errors
    /// Returns `ODataError::Binder` if the clause cannot be applied.
    fn bind_select_expand(
        &self,
        _query: Q,
        _clause: &SelectExpandClause,
        _settings: &QuerySettings,
    ) -> Result<Q> {
        Err(ODataError::Binder("$select/$expand is not supported by this source".to_owned()))
    }

    /// Total number of rows in `query`, if the source can tell cheaply.
    ///
    /// # Errors
    /// Returns `ODataError::Binder` if counting fails.
    fn count(&self, _query: &Q) -> Result<Option<u64>> {
        Ok(None)
    }
}

/// Select/expand binder for a single materialized entity.
pub trait EntityBinder<E> {
    /// # Errors
    /// Returns `ODataError::Binder` if the projection fails.
    fn bind_select_expand(
        &self,
        entity: E,
        clause: &SelectExpandClause,
        settings: &QuerySettings,
    ) -> Result<E>;
}

/// In-memory [`Queryable`] over a `Vec`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[must_use]
pub struct VecQueryable<T> {
    items: Vec<T>,
}

impl<T> VecQueryable<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self { items }
    }

    #[must_use]
    pub fn items(&self) -> &[T] {
        &self.items
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<T> {
        self.items
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn retain(mut self, f: impl FnMut(&T) -> bool) -> Self {
        self.items.retain(f);
        self
    }

    pub fn sort_by(mut self, compare: impl FnMut(&T, &T) -> std::cmp::Ordering) -> Self {
        self.items.sort_by(compare);
        self
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> VecQueryable<U> {
        VecQueryable {
            items: self.items.into_iter().map(f).collect(),
        }
    }
}

impl<T> From<Vec<T>> for VecQueryable<T> {
    fn from(items: Vec<T>) -> Self {
        Self::new(items)
    }
}

fn to_usize(n: u64) -> usize {
    usize::try_from(n).unwrap_or(usize::MAX)
}

impl<T> Queryable for VecQueryable<T> {
    fn skip(mut self, n: u64) -> Self {
        let n = to_usize(n).min(self.items.len());
        self.items.drain(..n);
        self
    }

    fn take(mut self, n: u64) -> Self {
        self.items.truncate(to_usize(n));
        self
    }

    fn take_limited(mut self, limit: u64) -> (Self, bool) {
        let limit = to_usize(limit);
        let truncated = self.items.len() > limit;
        self.items.truncate(limit);
        (self, truncated)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn skip_and_take_saturate() {
        let q = VecQueryable::new((1..=5).collect::<Vec<_>>());
        assert_eq!(q.clone().skip(2).into_vec(), vec![3, 4, 5]);
        assert_eq!(q.clone().skip(10).into_vec(), Vec::<i32>::new());
        assert_eq!(q.take(2).into_vec(), vec![1, 2]);
    }

    #[test]
    fn take_limited_reports_truncation() {
        let (q, truncated) = VecQueryable::new(vec![1, 2, 3]).take_limited(2);
        assert!(truncated);
        assert_eq!(q.into_vec(), vec![1, 2]);

        let (q, truncated) = VecQueryable::new(vec![1, 2]).take_limited(2);
        assert!(!truncated);
        assert_eq!(q.len(), 2);
    }
}
