//! Deterministic ordering for paged results.
//!
//! Paging over an order that does not fully determine row order can skip or
//! repeat rows between pages. The orderings produced here always end with a
//! set of properties that identify a row: the key, every sortable primitive
//! property when there is no key, or the result names of a reshaping `$apply`.

use std::sync::Arc;

use crate::context::QueryContext;
use crate::edm::StructuredType;
use crate::errors::Result;
use crate::options::{ApplyOption, OrderByOption, ParseEnv, cached};
use crate::parser::{OrderByClause, OrderByNode, SortDir};
use crate::query_options::ODataQueryOptions;

/// Outcome of stable-order synthesis, cached once per request.
#[derive(Debug)]
pub enum StableOrder {
    /// The request's own `$orderby` already determines row order.
    Existing,
    Synthesized(OrderByOption),
    /// No `$orderby` and nothing to order on.
    Unavailable,
}

/// Properties a stable sort uses when no `$apply` reshapes the element:
/// key properties in declaration order, else every sortable primitive property
/// ordered by name. Only entity types qualify.
#[must_use]
pub fn available_order_by_properties(ty: &StructuredType) -> Vec<String> {
    if !ty.is_entity() {
        return Vec::new();
    }
    let keys: Vec<String> = ty.key_properties().map(|p| p.name.clone()).collect();
    if !keys.is_empty() {
        return keys;
    }
    let mut names: Vec<String> = ty
        .properties
        .iter()
        .filter(|p| p.kind.is_sortable_primitive())
        .map(|p| p.name.clone())
        .collect();
    names.sort();
    names
}

fn apply_sort_names(apply: Option<&ApplyOption>) -> Result<Option<Vec<String>>> {
    match apply {
        Some(a) => Ok(a.apply_clause()?.stable_sort_names()),
        None => Ok(None),
    }
}

fn env_with_apply(base: &ParseEnv, apply: Option<&ApplyOption>) -> ParseEnv {
    match apply {
        Some(a) if !base.has_apply() => base.with_apply(a.raw_value()),
        _ => base.clone(),
    }
}

/// Ordering for a request without `$orderby`.
///
/// Apply-derived names keep the order the pipeline produced them in. Returns
/// `None` when there is nothing to order on.
///
/// # Errors
/// Returns parse failures from `$apply`.
pub fn generate_default_order_by(
    context: &Arc<QueryContext>,
    apply: Option<&ApplyOption>,
) -> Result<Option<OrderByOption>> {
    default_order_by_in(context, apply, &ParseEnv::default())
}

pub(crate) fn default_order_by_in(
    context: &Arc<QueryContext>,
    apply: Option<&ApplyOption>,
    env: &ParseEnv,
) -> Result<Option<OrderByOption>> {
    if let Some(names) = apply_sort_names(apply)? {
        if names.is_empty() {
            return Ok(None);
        }
        let raw = names.join(",");
        tracing::debug!(orderby = %raw, "default ordering from $apply result");
        let env = env_with_apply(env, apply);
        return OrderByOption::with_env(raw, Arc::clone(context), env).map(Some);
    }

    let names = available_order_by_properties(context.element_type());
    if names.is_empty() {
        return Ok(None);
    }
    let clause = OrderByClause::new(
        names
            .iter()
            .map(|n| OrderByNode::property(n.as_str(), SortDir::Asc))
            .collect(),
    );
    tracing::debug!(orderby = %clause, "default ordering from entity key");
    Ok(Some(OrderByOption::from_clause(
        clause.to_string(),
        Arc::clone(context),
        env.clone(),
        clause,
    )))
}

/// Extend `order_by` so it covers every property a stable sort needs.
///
/// Returns `None` when nothing is missing (the existing ordering is stable).
/// With a reshaping `$apply`, missing result names are sorted and appended to
/// the raw text, which is parsed again; otherwise the parsed clause is cloned
/// and the missing properties are appended ascending, in key or name order.
/// Names already ordered on are compared by their full `/`-joined path.
///
/// # Errors
/// Returns parse failures from `$orderby` or `$apply`.
pub fn ensure_stable_sort_order_by(
    order_by: &OrderByOption,
    apply: Option<&ApplyOption>,
) -> Result<Option<OrderByOption>> {
    let used: Vec<String> = order_by.order_by_clause()?.referenced_names().collect();

    if let Some(names) = apply_sort_names(apply)? {
        let mut missing: Vec<String> = names.into_iter().filter(|n| !used.contains(n)).collect();
        if missing.is_empty() {
            return Ok(None);
        }
        missing.sort();
        let raw = format!("{},{}", order_by.raw_value(), missing.join(","));
        tracing::debug!(appended = ?missing, "stable ordering extended with $apply result names");
        let env = env_with_apply(order_by.env(), apply);
        return OrderByOption::with_env(raw, Arc::clone(order_by.context()), env).map(Some);
    }

    let missing: Vec<String> = available_order_by_properties(order_by.context().element_type())
        .into_iter()
        .filter(|n| !used.contains(n))
        .collect();
    if missing.is_empty() {
        return Ok(None);
    }
    tracing::debug!(appended = ?missing, "stable ordering extended with key properties");
    let clause = order_by.order_by_clause()?.with_appended(
        missing
            .iter()
            .map(|n| OrderByNode::property(n.as_str(), SortDir::Asc)),
    );
    let raw = format!("{},{}", order_by.raw_value(), missing.join(","));
    Ok(Some(OrderByOption::from_clause(
        raw,
        Arc::clone(order_by.context()),
        order_by.env().clone(),
        clause,
    )))
}

impl ODataQueryOptions {
    /// Ordering that fully determines row order, derived at most once per
    /// request. `None` when there is neither a `$orderby` nor anything to
    /// order on.
    ///
    /// # Errors
    /// Returns parse failures from `$orderby` or `$apply`.
    pub fn generate_stable_order(&self) -> Result<Option<&OrderByOption>> {
        let state = cached(&self.stable_order, || self.derive_stable_order())?;
        Ok(match state {
            StableOrder::Existing => self.order_by.as_ref(),
            StableOrder::Synthesized(order_by) => Some(order_by),
            StableOrder::Unavailable => None,
        })
    }

    fn derive_stable_order(&self) -> Result<StableOrder> {
        let apply = self.apply.as_ref();
        let state = match &self.order_by {
            Some(existing) => match ensure_stable_sort_order_by(existing, apply)? {
                Some(extended) => StableOrder::Synthesized(extended),
                None => StableOrder::Existing,
            },
            None => match default_order_by_in(&self.context, apply, &self.env)? {
                Some(generated) => StableOrder::Synthesized(generated),
                None => {
                    tracing::warn!(
                        element_type = %self.context.element_type().name,
                        "stable ordering requested but no key or sortable property is available"
                    );
                    StableOrder::Unavailable
                }
            },
        };
        Ok(state)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::edm::{EdmModel, EdmPrimitiveKind, PropertyKind};

    #[test]
    fn keys_win_over_properties() {
        let ty = StructuredType::entity("T")
            .property("Z", EdmPrimitiveKind::String)
            .key("B", EdmPrimitiveKind::Int32)
            .key("A", EdmPrimitiveKind::Int32);
        assert_eq!(available_order_by_properties(&ty), vec!["B", "A"]);
    }

    #[test]
    fn keyless_type_uses_sorted_primitives() {
        let ty = StructuredType::entity("T")
            .property("b", EdmPrimitiveKind::String)
            .property("Photo", EdmPrimitiveKind::Stream)
            .property_of("Addr", PropertyKind::Complex("Address".to_owned()))
            .property("a", EdmPrimitiveKind::Int32)
            .property("C", EdmPrimitiveKind::Int32);
        assert_eq!(available_order_by_properties(&ty), vec!["C", "a", "b"]);
    }

    #[test]
    fn complex_type_has_no_stable_order() {
        let ty = StructuredType::complex("Address").property("City", EdmPrimitiveKind::String);
        assert!(available_order_by_properties(&ty).is_empty());
    }

    #[test]
    fn default_order_by_is_built_without_parsing() {
        let model = Arc::new(
            EdmModel::new()
                .with_type(StructuredType::entity("T").key("Id", EdmPrimitiveKind::Int32)),
        );
        let ctx = QueryContext::builder(model, "T").build().unwrap();
        let order = generate_default_order_by(&ctx, None).unwrap().unwrap();
        assert_eq!(order.raw_value(), "Id");
        assert_eq!(
            order.order_by_nodes().unwrap(),
            &[OrderByNode::property("Id", SortDir::Asc)]
        );
    }
}
