use super::{ParseScope, is_identifier, split_top_level};
use crate::errors::{ODataError, Result};
use crate::kind::QueryOptionKind;

/// `expression as Alias`. The expression is kept as text; evaluating it is the binder's job.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComputeExpression {
    pub expression: String,
    pub alias: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ComputeClause {
    items: Vec<ComputeExpression>,
}

impl ComputeClause {
    #[must_use]
    pub fn items(&self) -> &[ComputeExpression] {
        &self.items
    }

    #[must_use]
    pub fn aliases(&self) -> Vec<String> {
        self.items.iter().map(|i| i.alias.clone()).collect()
    }
}

/// Split `text as Alias` at the last ` as `.
pub(super) fn split_alias(item: &str) -> Option<(&str, &str)> {
    let idx = item.rfind(" as ")?;
    Some((item[..idx].trim(), item[idx + 4..].trim()))
}

pub(super) fn parse(raw: &str, scope: &ParseScope<'_>) -> Result<ComputeClause> {
    parse_for(raw, scope, QueryOptionKind::Compute)
}

pub(super) fn parse_for(
    raw: &str,
    scope: &ParseScope<'_>,
    option: QueryOptionKind,
) -> Result<ComputeClause> {
    let ci = scope.resolver.enable_case_insensitive;
    let mut items: Vec<ComputeExpression> = Vec::new();
    for part in split_top_level(raw, ',') {
        let part = part.trim();
        let (expression, alias) = split_alias(part).ok_or_else(|| {
            ODataError::parse(option, format!("expected 'expression as alias', found '{part}'"))
        })?;
        if expression.is_empty() {
            return Err(ODataError::parse(option, format!("missing expression for '{alias}'")));
        }
        if !is_identifier(alias) {
            return Err(ODataError::parse(option, format!("'{alias}' is not a valid alias")));
        }
        if scope.element_type.find_property(alias, ci).is_some()
            || scope.element_type.find_navigation(alias, ci).is_some()
        {
            return Err(ODataError::parse(
                option,
                format!(
                    "alias '{alias}' conflicts with a declared property of '{}'",
                    scope.element_type.name
                ),
            ));
        }
        if items.iter().any(|i| i.alias == alias) {
            return Err(ODataError::parse(option, format!("alias '{alias}' is defined twice")));
        }
        items.push(ComputeExpression {
            expression: expression.to_owned(),
            alias: alias.to_owned(),
        });
    }
    Ok(ComputeClause { items })
}
