//! Per-option validators.
//!
//! Each validator takes one typed option plus the ceilings to enforce; the
//! option carries its `QueryContext`, which supplies model-bound settings.

use crate::config::ValidationSettings;
use crate::context::QueryContext;
use crate::errors::{LimitKind, Result, ValidationError};
use crate::kind::QueryOptionKind;
use crate::options::{
    CountOption, FilterOption, OrderByOption, SelectExpandOption, SkipOption, SkipTokenOption,
    TopOption,
};
use crate::parser::{OrderByNode, SelectItem};

fn as_u64(n: usize) -> u64 {
    u64::try_from(n).unwrap_or(u64::MAX)
}

fn check_limit(
    option: QueryOptionKind,
    limit: LimitKind,
    observed: u64,
    allowed: u64,
) -> Result<()> {
    if observed > allowed {
        return Err(ValidationError::LimitExceeded {
            option,
            limit,
            observed,
            allowed,
        }
        .into());
    }
    Ok(())
}

/// True if the element type declares `name` as a structural or navigation property.
fn declares(context: &QueryContext, name: &str) -> bool {
    let ci = context.resolver().enable_case_insensitive;
    let ty = context.element_type();
    ty.find_property(name, ci).is_some() || ty.find_navigation(name, ci).is_some()
}

fn first_segment(path: &str) -> &str {
    path.split('/').next().unwrap_or(path)
}

/// `$top` against the global ceiling, then the model-bound one.
///
/// # Errors
/// Returns `LimitExceeded` with `MaxTop`, or the option's parse failure.
pub fn validate_top(top: &TopOption, settings: &ValidationSettings) -> Result<()> {
    let value = top.value()?;
    if let Some(max) = settings.max_top {
        check_limit(QueryOptionKind::Top, LimitKind::MaxTop, value, max)?;
    }
    if let Some(max) = top.context().model_bound_max_top() {
        check_limit(QueryOptionKind::Top, LimitKind::MaxTop, value, max)?;
    }
    Ok(())
}

/// # Errors
/// Returns `LimitExceeded` with `MaxSkip`, or the option's parse failure.
pub fn validate_skip(skip: &SkipOption, settings: &ValidationSettings) -> Result<()> {
    let value = skip.value()?;
    if let Some(max) = settings.max_skip {
        check_limit(QueryOptionKind::Skip, LimitKind::MaxSkip, value, max)?;
    }
    Ok(())
}

/// Node count, `any`/`all` nesting and filterable properties.
///
/// # Errors
/// Returns `LimitExceeded` or `PropertyNotAllowed`, or the option's parse failure.
pub fn validate_filter(filter: &FilterOption, settings: &ValidationSettings) -> Result<()> {
    let clause = filter.filter_clause()?;
    check_limit(
        QueryOptionKind::Filter,
        LimitKind::MaxNodeCount,
        as_u64(clause.node_count()),
        u64::from(settings.max_node_count),
    )?;
    check_limit(
        QueryOptionKind::Filter,
        LimitKind::MaxAnyAllExpressionDepth,
        as_u64(clause.expr().any_all_depth()),
        u64::from(settings.max_any_all_expression_depth),
    )?;

    let context = filter.context();
    for ident in clause.expr().identifiers() {
        let head = first_segment(ident);
        if declares(context, head) && !context.is_filterable(head) {
            return Err(ValidationError::PropertyNotAllowed {
                option: QueryOptionKind::Filter,
                property: head.to_owned(),
            }
            .into());
        }
    }
    Ok(())
}

/// Node count, the configured property allow-list and orderable properties.
///
/// # Errors
/// Returns `LimitExceeded` or `PropertyNotAllowed`, or the option's parse failure.
pub fn validate_order_by(order_by: &OrderByOption, settings: &ValidationSettings) -> Result<()> {
    let clause = order_by.order_by_clause()?;
    check_limit(
        QueryOptionKind::OrderBy,
        LimitKind::MaxOrderByNodeCount,
        as_u64(clause.len()),
        u64::from(settings.max_order_by_node_count),
    )?;

    let context = order_by.context();
    let ci = context.resolver().enable_case_insensitive;
    let not_allowed = |property: String| -> Result<()> {
        Err(ValidationError::PropertyNotAllowed {
            option: QueryOptionKind::OrderBy,
            property,
        }
        .into())
    };
    for node in clause.nodes() {
        let name = node.referenced_name();
        let listed = settings.allowed_order_by_properties.is_empty()
            || settings.allowed_order_by_properties.iter().any(|p| {
                if ci {
                    p.eq_ignore_ascii_case(&name)
                } else {
                    *p == name
                }
            });
        if !listed {
            return not_allowed(name);
        }
        let head = match node {
            OrderByNode::Property { path, .. } => path.first(),
            OrderByNode::Open { .. } => None,
        };
        if let Some(head) = head.filter(|h| !context.is_orderable(h)) {
            return not_allowed(head.clone());
        }
    }
    Ok(())
}

/// Expansion depth and selectable / expandable properties. Depth checks are
/// skipped when `max_expansion_depth` is zero.
///
/// # Errors
/// Returns `LimitExceeded` or `PropertyNotAllowed`, or the option's parse failure.
pub fn validate_select_expand(
    option: &SelectExpandOption,
    settings: &ValidationSettings,
) -> Result<()> {
    let clause = option.select_expand_clause()?;
    let max = settings.max_expansion_depth;
    if max > 0 {
        let levels = option.levels_max_literal_expansion_depth();
        check_limit(
            QueryOptionKind::Expand,
            LimitKind::LevelsMaxLiteralExpansionDepth,
            u64::from(levels),
            u64::from(max),
        )?;
        check_limit(
            QueryOptionKind::Expand,
            LimitKind::MaxExpansionDepth,
            u64::from(clause.expansion_depth(levels)),
            u64::from(max),
        )?;
    }

    let context = option.context();
    let mut selected = clause.selected().iter().filter_map(|item| match item {
        SelectItem::Property(path) | SelectItem::Navigation(path) => path.first(),
        SelectItem::Wildcard | SelectItem::Dynamic(_) => None,
    });
    if let Some(head) = selected.find(|h| !context.is_selectable(h)) {
        return Err(ValidationError::PropertyNotAllowed {
            option: QueryOptionKind::Select,
            property: head.clone(),
        }
        .into());
    }
    let mut expanded = clause.expanded().iter().filter_map(|item| item.path.first());
    if let Some(head) = expanded.find(|h| !context.is_expandable(h)) {
        return Err(ValidationError::PropertyNotAllowed {
            option: QueryOptionKind::Expand,
            property: head.clone(),
        }
        .into());
    }
    Ok(())
}

/// `$count=true` on a target that is not countable.
///
/// # Errors
/// Returns `Disabled`, or the option's parse failure.
pub fn validate_count(count: &CountOption) -> Result<()> {
    if count.value()? && !count.context().is_countable() {
        return Err(ValidationError::Disabled {
            option: QueryOptionKind::Count,
            target: count.context().element_type().name.clone(),
        }
        .into());
    }
    Ok(())
}

/// # Errors
/// Returns `NotAllowed` when skip tokens are disabled, or the token's parse failure.
pub fn validate_skip_token(token: &SkipTokenOption, context: &QueryContext) -> Result<()> {
    if !context.defaults().enable_skip_token {
        return Err(ValidationError::NotAllowed {
            option: QueryOptionKind::SkipToken,
        }
        .into());
    }
    token.skip_token()?;
    Ok(())
}
