//! Parser collaborator: turns raw option strings into clause trees.
//!
//! [`QueryParser`] is the seam; [`DefaultQueryParser`] is the shipped implementation.
//! `$filter` (and `filter(...)` inside `$apply`) is parsed by `odata_params`; the
//! remaining grammars are small recursive-descent parsers in the submodules.
//! Name resolution against the schema follows the [`UriResolverConfig`] in the scope.

use std::collections::BTreeMap;

use crate::ast::{FilterClause, parse_bool_expr};
use crate::config::UriResolverConfig;
use crate::edm::{PropertyKind, SchemaModel, StructuredType};
use crate::errors::{ODataError, Result};
use crate::kind::QueryOptionKind;

pub mod apply;
pub mod compute;
pub mod order_by;
pub mod search;
pub mod select_expand;
pub mod skip_token;

pub use apply::{
    AggregateExpression, AggregationMethod, ApplyClause, GroupByProperty, Transformation,
};
pub use compute::{ComputeClause, ComputeExpression};
pub use order_by::{OrderByClause, OrderByNode, SortDir};
pub use search::SearchExpr;
pub use select_expand::{ExpandItem, ExpandLevels, SelectExpandClause, SelectItem};
pub use skip_token::SkipToken;

/// Everything a parser needs to bind names in one option string.
pub struct ParseScope<'a> {
    pub model: &'a dyn SchemaModel,
    pub element_type: &'a StructuredType,
    pub resolver: UriResolverConfig,
    /// Parameter aliases, keyed with the leading `@`.
    pub aliases: &'a BTreeMap<String, String>,
    /// Names introduced by `$compute`.
    pub compute_aliases: Vec<String>,
    /// Result names of a shaping `$apply` (group-by paths, aggregate aliases).
    /// When set, later clauses bind against these instead of the element type.
    pub apply_names: Option<Vec<String>>,
}

impl<'a> ParseScope<'a> {
    #[must_use]
    pub fn new(
        model: &'a dyn SchemaModel,
        element_type: &'a StructuredType,
        resolver: UriResolverConfig,
        aliases: &'a BTreeMap<String, String>,
    ) -> Self {
        Self {
            model,
            element_type,
            resolver,
            aliases,
            compute_aliases: Vec::new(),
            apply_names: None,
        }
    }

    /// Same scope rebound to another element type (nested `$expand` options).
    #[must_use]
    pub fn rebind(&self, element_type: &'a StructuredType) -> ParseScope<'a> {
        ParseScope {
            model: self.model,
            element_type,
            resolver: self.resolver,
            aliases: self.aliases,
            compute_aliases: Vec::new(),
            apply_names: None,
        }
    }

    fn names_equal(&self, a: &str, b: &str) -> bool {
        if self.resolver.enable_case_insensitive {
            a.eq_ignore_ascii_case(b)
        } else {
            a == b
        }
    }

    pub(crate) fn is_computed(&self, name: &str) -> bool {
        self.compute_aliases.iter().any(|a| self.names_equal(a, name))
    }

    /// Matching apply result name, if the scope is apply-shaped.
    pub(crate) fn apply_name(&self, name: &str) -> Option<&str> {
        self.apply_names
            .as_deref()?
            .iter()
            .find(|n| self.names_equal(n, name))
            .map(String::as_str)
    }
}

/// Parsed ASTs per option kind. Implementations must be deterministic.
pub trait QueryParser: Send + Sync {
    /// # Errors
    /// Returns `ODataError::Parse` if the text is malformed or names are unknown.
    fn parse_filter(&self, raw: &str, scope: &ParseScope<'_>) -> Result<FilterClause>;

    /// # Errors
    /// Returns `ODataError::Parse` if the text is malformed or names are unknown.
    fn parse_order_by(&self, raw: &str, scope: &ParseScope<'_>) -> Result<OrderByClause>;

    /// # Errors
    /// Returns `ODataError::Parse` if the text is malformed or names are unknown.
    fn parse_select_expand(
        &self,
        select: Option<&str>,
        expand: Option<&str>,
        scope: &ParseScope<'_>,
    ) -> Result<SelectExpandClause>;

    /// # Errors
    /// Returns `ODataError::Parse` if the text is malformed or names are unknown.
    fn parse_apply(&self, raw: &str, scope: &ParseScope<'_>) -> Result<ApplyClause>;

    /// # Errors
    /// Returns `ODataError::Parse` if the text is malformed or an alias is invalid.
    fn parse_compute(&self, raw: &str, scope: &ParseScope<'_>) -> Result<ComputeClause>;

    /// # Errors
    /// Returns `ODataError::Parse` if the text is malformed.
    fn parse_search(&self, raw: &str) -> Result<SearchExpr>;

    /// # Errors
    /// Returns `ODataError::Parse` if the token is malformed.
    fn parse_skip_token(&self, raw: &str) -> Result<SkipToken>;
}

/// Built-in parser.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultQueryParser;

impl QueryParser for DefaultQueryParser {
    fn parse_filter(&self, raw: &str, scope: &ParseScope<'_>) -> Result<FilterClause> {
        let text = substitute_aliases(raw, scope.aliases, QueryOptionKind::Filter)?;
        parse_bool_expr(&text, QueryOptionKind::Filter).map(FilterClause::new)
    }

    fn parse_order_by(&self, raw: &str, scope: &ParseScope<'_>) -> Result<OrderByClause> {
        let text = substitute_aliases(raw, scope.aliases, QueryOptionKind::OrderBy)?;
        order_by::parse(&text, scope)
    }

    fn parse_select_expand(
        &self,
        select: Option<&str>,
        expand: Option<&str>,
        scope: &ParseScope<'_>,
    ) -> Result<SelectExpandClause> {
        select_expand::parse(select, expand, scope)
    }

    fn parse_apply(&self, raw: &str, scope: &ParseScope<'_>) -> Result<ApplyClause> {
        apply::parse(raw, scope)
    }

    fn parse_compute(&self, raw: &str, scope: &ParseScope<'_>) -> Result<ComputeClause> {
        compute::parse(raw, scope)
    }

    fn parse_search(&self, raw: &str) -> Result<SearchExpr> {
        search::parse(raw)
    }

    fn parse_skip_token(&self, raw: &str) -> Result<SkipToken> {
        skip_token::parse(raw)
    }
}

/// What a `/`-separated property path resolved to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum ResolvedPath {
    /// Declared property chain; names are the schema's spelling.
    Declared {
        path: Vec<String>,
        terminal: Terminal,
    },
    /// Dynamic property of an open type (or under one), kept verbatim.
    Dynamic(String),
    /// `$compute` alias.
    Computed(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Terminal {
    Primitive,
    Complex,
    Navigation { target: String, collection: bool },
    Collection,
}

/// Resolve a property path against the scope's element type.
///
/// Walks complex properties and single-valued navigations; an undeclared
/// segment on an open type turns the rest of the path dynamic.
pub(crate) fn resolve_path(
    raw: &str,
    scope: &ParseScope<'_>,
    option: QueryOptionKind,
) -> Result<ResolvedPath> {
    let segments: Vec<&str> = raw.split('/').map(str::trim).collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(ODataError::parse(option, format!("empty segment in path '{raw}'")));
    }
    if segments.len() == 1 && scope.is_computed(segments[0]) {
        return Ok(ResolvedPath::Computed(segments[0].to_owned()));
    }

    let ci = scope.resolver.enable_case_insensitive;
    let mut current = scope.element_type;
    let mut path = Vec::with_capacity(segments.len());

    for (i, seg) in segments.iter().enumerate() {
        let last = i + 1 == segments.len();
        if let Some(prop) = current.find_property(seg, ci) {
            path.push(prop.name.clone());
            match &prop.kind {
                PropertyKind::Complex(type_name) if !last => {
                    current = lookup_type(scope, type_name, option)?;
                }
                PropertyKind::Complex(_) if last => {
                    return Ok(ResolvedPath::Declared {
                        path,
                        terminal: Terminal::Complex,
                    });
                }
                PropertyKind::Collection(_) if last => {
                    return Ok(ResolvedPath::Declared {
                        path,
                        terminal: Terminal::Collection,
                    });
                }
                _ if last => {
                    return Ok(ResolvedPath::Declared {
                        path,
                        terminal: Terminal::Primitive,
                    });
                }
                _ => {
                    return Err(ODataError::parse(
                        option,
                        format!("property '{}' has no members; cannot resolve '{raw}'", prop.name),
                    ));
                }
            }
        } else if let Some(nav) = current.find_navigation(seg, ci) {
            path.push(nav.name.clone());
            if last {
                return Ok(ResolvedPath::Declared {
                    path,
                    terminal: Terminal::Navigation {
                        target: nav.target.clone(),
                        collection: nav.collection,
                    },
                });
            }
            if nav.collection {
                return Err(ODataError::parse(
                    option,
                    format!("collection navigation '{}' cannot appear inside '{raw}'", nav.name),
                ));
            }
            current = lookup_type(scope, &nav.target, option)?;
        } else if current.open {
            return Ok(ResolvedPath::Dynamic(raw.trim().to_owned()));
        } else {
            return Err(ODataError::parse(
                option,
                format!(
                    "could not find a property named '{seg}' on type '{}'",
                    current.name
                ),
            ));
        }
    }

    Err(ODataError::parse(option, format!("cannot resolve '{raw}'")))
}

pub(crate) fn lookup_type<'a>(
    scope: &ParseScope<'a>,
    name: &str,
    option: QueryOptionKind,
) -> Result<&'a StructuredType> {
    scope
        .model
        .structured_type(name)
        .ok_or_else(|| {
            ODataError::parse(option, format!("type '{name}' is not defined in the model"))
        })
}

/// Split on `sep` outside parentheses and single-quoted literals.
pub(crate) fn split_top_level(raw: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut in_str = false;
    let mut start = 0;
    for (i, ch) in raw.char_indices() {
        match ch {
            '\'' => in_str = !in_str,
            '(' if !in_str => depth += 1,
            ')' if !in_str => depth = depth.saturating_sub(1),
            c if c == sep && !in_str && depth == 0 => {
                parts.push(&raw[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&raw[start..]);
    parts
}

/// If `raw` is `name(args)`, return `(name, args)`.
pub(crate) fn split_call(raw: &str) -> Option<(&str, &str)> {
    let raw = raw.trim();
    let open = raw.find('(')?;
    let inner = raw.strip_suffix(')')?;
    Some((raw[..open].trim(), &inner[open + 1..]))
}

pub(crate) fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Replace `@alias` references outside string literals with their values.
///
/// # Errors
/// Returns `ODataError::Parse` for a reference with no definition.
pub fn substitute_aliases(
    raw: &str,
    aliases: &BTreeMap<String, String>,
    option: QueryOptionKind,
) -> Result<String> {
    if !raw.contains('@') {
        return Ok(raw.to_owned());
    }
    let mut out = String::with_capacity(raw.len());
    let mut in_str = false;
    let mut chars = raw.char_indices().peekable();
    while let Some((i, ch)) = chars.next() {
        if ch == '\'' {
            in_str = !in_str;
            out.push(ch);
            continue;
        }
        if ch != '@' || in_str {
            out.push(ch);
            continue;
        }
        let mut end = i + 1;
        while let Some(&(j, c)) = chars.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                end = j + c.len_utf8();
                chars.next();
            } else {
                break;
            }
        }
        let name = &raw[i..end];
        let value = aliases.get(name).ok_or_else(|| {
            ODataError::parse(option, format!("parameter alias '{name}' is not defined"))
        })?;
        out.push_str(value);
    }
    Ok(out)
}


#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::edm::SchemaModel;

    #[test]
    fn split_respects_parens_and_quotes() {
        assert_eq!(
            split_top_level("a,b(c,d),'e,f',g", ','),
            vec!["a", "b(c,d)", "'e,f'", "g"]
        );
        assert_eq!(split_top_level("", ','), vec![""]);
    }

    #[test]
    fn split_call_extracts_name_and_args() {
        assert_eq!(split_call("groupby((A,B))"), Some(("groupby", "(A,B)")));
        assert_eq!(split_call("Name"), None);
    }

    #[test]
    fn alias_substitution_skips_string_literals() {
        let mut aliases = BTreeMap::new();
        aliases.insert("@p".to_owned(), "10".to_owned());
        let out =
            substitute_aliases("Price gt @p and Name eq '@p'", &aliases, QueryOptionKind::Filter)
                .unwrap();
        assert_eq!(out, "Price gt 10 and Name eq '@p'");
    }

    #[test]
    fn undefined_alias_is_a_parse_error() {
        let err = substitute_aliases("Price gt @missing", &BTreeMap::new(), QueryOptionKind::Filter)
            .unwrap_err();
        assert!(err.to_string().contains("@missing"));
    }

    #[test]
    fn resolves_complex_and_navigation_paths() {
        let model = test_support::model();
        let ty = model.structured_type("Product").unwrap();
        let aliases = BTreeMap::new();
        let scope = ParseScope::new(&model, ty, UriResolverConfig::default(), &aliases);

        let city = resolve_path("Address/City", &scope, QueryOptionKind::OrderBy).unwrap();
        assert_eq!(
            city,
            ResolvedPath::Declared {
                path: vec!["Address".to_owned(), "City".to_owned()],
                terminal: Terminal::Primitive,
            }
        );

        let title = resolve_path("Category/Title", &scope, QueryOptionKind::OrderBy).unwrap();
        assert!(matches!(title, ResolvedPath::Declared { terminal: Terminal::Primitive, .. }));

        let err = resolve_path("Orders/Amount", &scope, QueryOptionKind::OrderBy).unwrap_err();
        assert!(err.to_string().contains("collection navigation"));

        let err = resolve_path("Nope", &scope, QueryOptionKind::OrderBy).unwrap_err();
        assert!(err.to_string().contains("'Nope'"));
    }

    #[test]
    fn open_type_yields_dynamic_path() {
        let model = test_support::model();
        let ty = model.structured_type("Bag").unwrap();
        let aliases = BTreeMap::new();
        let scope = ParseScope::new(&model, ty, UriResolverConfig::default(), &aliases);
        assert_eq!(
            resolve_path("Color", &scope, QueryOptionKind::OrderBy).unwrap(),
            ResolvedPath::Dynamic("Color".to_owned())
        );
    }

    #[test]
    fn case_insensitive_resolution_returns_declared_spelling() {
        let model = test_support::model();
        let ty = model.structured_type("Product").unwrap();
        let aliases = BTreeMap::new();
        let resolver = UriResolverConfig {
            enable_case_insensitive: true,
            ..UriResolverConfig::default()
        };
        let scope = ParseScope::new(&model, ty, resolver, &aliases);
        let resolved = resolve_path("price", &scope, QueryOptionKind::OrderBy).unwrap();
        assert!(matches!(resolved, ResolvedPath::Declared { ref path, .. } if path == &["Price"]));
    }
}
