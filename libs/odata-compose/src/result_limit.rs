//! Bounded take that remembers whether rows were cut off (drives next-link generation).

use crate::queryable::Queryable;

#[derive(Clone, Debug, PartialEq, Eq)]
#[must_use]
pub struct LimitedQuery<Q> {
    inner: Q,
    limit: u64,
    truncated: bool,
}

impl<Q> LimitedQuery<Q> {
    #[must_use]
    pub fn limit(&self) -> u64 {
        self.limit
    }

    #[must_use]
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    pub fn into_inner(self) -> Q {
        self.inner
    }

    /// `(query, truncated)`
    pub fn into_parts(self) -> (Q, bool) {
        (self.inner, self.truncated)
    }
}

/// Limit `query` to `limit` rows. Generic over the source, so no runtime type
/// dispatch is involved in choosing the element type.
pub fn limit_results<Q: Queryable>(query: Q, limit: u64) -> LimitedQuery<Q> {
    let (inner, truncated) = query.take_limited(limit);
    tracing::debug!(limit, truncated, "page size limit applied");
    LimitedQuery {
        inner,
        limit,
        truncated,
    }
}
