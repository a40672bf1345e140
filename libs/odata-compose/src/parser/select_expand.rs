//! `$select` / `$expand` trees, including nested expand options and `$levels`.

use super::{
    ParseScope, ResolvedPath, Terminal, lookup_type, order_by, resolve_path, split_top_level,
    substitute_aliases,
};
use crate::ast::{FilterClause, parse_bool_expr};
use crate::config::UriResolverConfig;
use crate::errors::{ODataError, Result};
use crate::kind::QueryOptionKind;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SelectItem {
    /// `*`
    Wildcard,
    Property(Vec<String>),
    Navigation(Vec<String>),
    /// Dynamic property, `$compute` alias or `$apply` result name.
    Dynamic(String),
}

impl SelectItem {
    /// Path as written in a `$select` string.
    #[must_use]
    pub fn path(&self) -> String {
        match self {
            SelectItem::Wildcard => "*".to_owned(),
            SelectItem::Property(p) | SelectItem::Navigation(p) => p.join("/"),
            SelectItem::Dynamic(name) => name.clone(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExpandLevels {
    Count(u32),
    Max,
}

#[derive(Clone, Debug)]
pub struct ExpandItem {
    pub path: Vec<String>,
    pub target_type: String,
    pub collection: bool,
    pub select_expand: SelectExpandClause,
    pub filter: Option<FilterClause>,
    pub order_by: Option<order_by::OrderByClause>,
    pub top: Option<u64>,
    pub skip: Option<u64>,
    pub count: bool,
    pub levels: Option<ExpandLevels>,
}

impl ExpandItem {
    fn new(path: Vec<String>, target_type: String, collection: bool) -> Self {
        Self {
            path,
            target_type,
            collection,
            select_expand: SelectExpandClause::default(),
            filter: None,
            order_by: None,
            top: None,
            skip: None,
            count: false,
            levels: None,
        }
    }

    /// Path as written in an `$expand` string.
    #[must_use]
    pub fn path_string(&self) -> String {
        self.path.join("/")
    }

    fn level_count(&self, levels_max: u32) -> u32 {
        match self.levels {
            None => 1,
            Some(ExpandLevels::Count(n)) => n,
            Some(ExpandLevels::Max) => levels_max.max(1),
        }
    }
}

/// Parsed `$select` and `$expand` for one level of the result shape.
#[derive(Clone, Debug)]
pub struct SelectExpandClause {
    selected: Vec<SelectItem>,
    expanded: Vec<ExpandItem>,
    all_selected: bool,
}

impl Default for SelectExpandClause {
    fn default() -> Self {
        Self {
            selected: Vec::new(),
            expanded: Vec::new(),
            all_selected: true,
        }
    }
}

impl SelectExpandClause {
    #[must_use]
    pub fn selected(&self) -> &[SelectItem] {
        &self.selected
    }

    #[must_use]
    pub fn expanded(&self) -> &[ExpandItem] {
        &self.expanded
    }

    /// True when `$select` is absent or contains `*`.
    #[must_use]
    pub fn all_selected(&self) -> bool {
        self.all_selected
    }

    /// Deepest expansion chain, counting `$levels=N` as N hops and
    /// `$levels=max` as `levels_max` hops.
    #[must_use]
    pub fn expansion_depth(&self, levels_max: u32) -> u32 {
        self.expanded
            .iter()
            .map(|e| e.level_count(levels_max) + e.select_expand.expansion_depth(levels_max))
            .max()
            .unwrap_or(0)
    }

    /// Unroll every `$levels` into explicit nested expansions.
    #[must_use]
    pub fn process_levels(&self, levels_max: u32) -> SelectExpandClause {
        SelectExpandClause {
            selected: self.selected.clone(),
            expanded: self
                .expanded
                .iter()
                .map(|item| unroll(item, item.level_count(levels_max), levels_max))
                .collect(),
            all_selected: self.all_selected,
        }
    }
}

fn unroll(item: &ExpandItem, remaining: u32, levels_max: u32) -> ExpandItem {
    let mut nested = item.select_expand.process_levels(levels_max);
    if item.levels.is_some() && remaining > 1 {
        nested.expanded.push(unroll(item, remaining - 1, levels_max));
    }
    ExpandItem {
        select_expand: nested,
        levels: None,
        ..item.clone()
    }
}

pub(super) fn parse(
    select: Option<&str>,
    expand: Option<&str>,
    scope: &ParseScope<'_>,
) -> Result<SelectExpandClause> {
    let mut clause = SelectExpandClause::default();
    if let Some(raw) = select {
        clause.selected = parse_select(raw, scope)?;
        clause.all_selected = clause.selected.contains(&SelectItem::Wildcard);
    }
    if let Some(raw) = expand {
        clause.expanded = parse_expand(raw, scope)?;
    }
    Ok(clause)
}

fn parse_select(raw: &str, scope: &ParseScope<'_>) -> Result<Vec<SelectItem>> {
    let option = QueryOptionKind::Select;
    let mut items = Vec::new();
    for part in split_top_level(raw, ',') {
        let part = part.trim();
        if part.is_empty() {
            return Err(ODataError::parse(option, "empty select item"));
        }
        if part == "*" {
            items.push(SelectItem::Wildcard);
            continue;
        }
        if scope.apply_names.is_some() {
            let name = scope.apply_name(part).ok_or_else(|| {
                ODataError::parse(option, format!("'{part}' is not part of the $apply result"))
            })?;
            items.push(SelectItem::Dynamic(name.to_owned()));
            continue;
        }
        let item = match resolve_path(part, scope, option)? {
            ResolvedPath::Declared {
                path,
                terminal: Terminal::Navigation { .. },
            } => SelectItem::Navigation(path),
            ResolvedPath::Declared { path, .. } => SelectItem::Property(path),
            ResolvedPath::Dynamic(name) | ResolvedPath::Computed(name) => SelectItem::Dynamic(name),
        };
        if !items.contains(&item) {
            items.push(item);
        }
    }
    Ok(items)
}

fn parse_expand(raw: &str, scope: &ParseScope<'_>) -> Result<Vec<ExpandItem>> {
    let option = QueryOptionKind::Expand;
    let mut items = Vec::new();
    for part in split_top_level(raw, ',') {
        let part = part.trim();
        if part.is_empty() {
            return Err(ODataError::parse(option, "empty expand item"));
        }
        if part == "*" {
            items.extend(scope.element_type.navigation_properties.iter().map(|n| {
                ExpandItem::new(vec![n.name.clone()], n.target.clone(), n.collection)
            }));
            continue;
        }

        let (path_text, options) = match part.find('(') {
            Some(open) => {
                let inner = part[open + 1..].strip_suffix(')').ok_or_else(|| {
                    ODataError::parse(option, format!("unbalanced parentheses in '{part}'"))
                })?;
                (part[..open].trim(), Some(inner))
            }
            None => (part, None),
        };

        let (path, target, collection) = match resolve_path(path_text, scope, option)? {
            ResolvedPath::Declared {
                path,
                terminal: Terminal::Navigation { target, collection },
            } => (path, target, collection),
            _ => {
                return Err(ODataError::parse(
                    option,
                    format!("'{path_text}' is not a navigation property"),
                ));
            }
        };

        let mut item = ExpandItem::new(path, target, collection);
        if let Some(inner) = options {
            apply_nested_options(&mut item, inner, scope)?;
        }
        items.push(item);
    }
    Ok(items)
}

fn apply_nested_options(item: &mut ExpandItem, inner: &str, scope: &ParseScope<'_>) -> Result<()> {
    let option = QueryOptionKind::Expand;
    let target = lookup_type(scope, &item.target_type, option)?;
    let nested_scope = scope.rebind(target);
    let resolver = scope.resolver;

    let mut select = None;
    let mut expand = None;
    for pair in split_top_level(inner, ';') {
        let pair = pair.trim();
        if pair.is_empty() {
            continue;
        }
        let (key, value) = pair.split_once('=').ok_or_else(|| {
            ODataError::parse(
                option,
                format!("expected 'name=value' in nested options, found '{pair}'"),
            )
        })?;
        let key = key.trim();
        let value = value.trim();

        if is_levels_key(key, resolver) {
            item.levels = Some(parse_levels(value)?);
            continue;
        }
        match QueryOptionKind::resolve(key, &resolver) {
            Some(QueryOptionKind::Select) => select = Some(value),
            Some(QueryOptionKind::Expand) => expand = Some(value),
            Some(QueryOptionKind::Filter) => {
                let text = substitute_aliases(value, scope.aliases, QueryOptionKind::Filter)?;
                let expr = parse_bool_expr(&text, QueryOptionKind::Filter)?;
                item.filter = Some(FilterClause::new(expr));
            }
            Some(QueryOptionKind::OrderBy) => {
                let text = substitute_aliases(value, scope.aliases, QueryOptionKind::OrderBy)?;
                item.order_by = Some(order_by::parse(&text, &nested_scope)?);
            }
            Some(QueryOptionKind::Top) => item.top = Some(parse_u64(key, value)?),
            Some(QueryOptionKind::Skip) => item.skip = Some(parse_u64(key, value)?),
            Some(QueryOptionKind::Count) => item.count = parse_bool(key, value)?,
            _ => {
                return Err(ODataError::parse(
                    option,
                    format!("'{key}' is not supported inside $expand"),
                ));
            }
        }
    }

    item.select_expand = parse(select, expand, &nested_scope)?;
    Ok(())
}

fn is_levels_key(key: &str, resolver: UriResolverConfig) -> bool {
    if resolver.enable_no_dollar_query_options {
        let bare = key.strip_prefix('$').unwrap_or(key);
        bare.eq_ignore_ascii_case("levels")
    } else if resolver.enable_case_insensitive {
        key.eq_ignore_ascii_case("$levels")
    } else {
        key == "$levels"
    }
}

fn parse_levels(value: &str) -> Result<ExpandLevels> {
    if value.eq_ignore_ascii_case("max") {
        return Ok(ExpandLevels::Max);
    }
    match value.parse::<u32>() {
        Ok(n) if n > 0 => Ok(ExpandLevels::Count(n)),
        _ => Err(ODataError::parse(
            QueryOptionKind::Expand,
            format!("$levels must be a positive integer or 'max', found '{value}'"),
        )),
    }
}

fn parse_u64(key: &str, value: &str) -> Result<u64> {
    value.parse::<u64>().map_err(|_| {
        ODataError::parse(
            QueryOptionKind::Expand,
            format!("{key} must be a non-negative integer, found '{value}'"),
        )
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(ODataError::parse(
            QueryOptionKind::Expand,
            format!("{key} must be 'true' or 'false', found '{value}'"),
        )),
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::config::UriResolverConfig;
    use crate::edm::SchemaModel;
    use crate::parser::test_support::model;

    fn parse_on(
        ty: &str,
        select: Option<&str>,
        expand: Option<&str>,
    ) -> Result<SelectExpandClause> {
        let model = model();
        let ty = model.structured_type(ty).unwrap();
        let aliases = BTreeMap::new();
        let scope = ParseScope::new(&model, ty, UriResolverConfig::default(), &aliases);
        parse(select, expand, &scope)
    }

    #[test]
    fn select_items_resolve_by_kind() {
        let clause = parse_on("Product", Some("Name,Address/City,Category"), None).unwrap();
        assert!(!clause.all_selected());
        assert_eq!(
            clause.selected(),
            &[
                SelectItem::Property(vec!["Name".to_owned()]),
                SelectItem::Property(vec!["Address".to_owned(), "City".to_owned()]),
                SelectItem::Navigation(vec!["Category".to_owned()]),
            ]
        );
    }

    #[test]
    fn wildcard_keeps_all_selected() {
        let clause = parse_on("Product", Some("*"), None).unwrap();
        assert!(clause.all_selected());
        assert!(parse_on("Product", None, None).unwrap().all_selected());
    }

    #[test]
    fn nested_expand_options_are_parsed() {
        let clause = parse_on(
            "Product",
            None,
            Some("Orders($select=Amount;$top=5;$orderby=Amount desc;$expand=Lines($count=true))"),
        )
        .unwrap();
        let orders = &clause.expanded()[0];
        assert_eq!(orders.path_string(), "Orders");
        assert_eq!(orders.top, Some(5));
        assert_eq!(orders.order_by.as_ref().map(order_by::OrderByClause::len), Some(1));
        assert_eq!(
            orders.select_expand.selected(),
            &[SelectItem::Property(vec!["Amount".to_owned()])]
        );
        assert!(orders.select_expand.expanded()[0].count);
        assert_eq!(clause.expansion_depth(2), 2);
    }

    #[test]
    fn non_navigation_expand_is_rejected() {
        assert!(parse_on("Product", None, Some("Name")).is_err());
        assert!(parse_on("Product", None, Some("Orders($bogus=1)")).is_err());
        assert!(parse_on("Product", None, Some("Category($levels=0)")).is_err());
    }

    #[test]
    fn levels_count_towards_depth_and_unroll() {
        let clause = parse_on("Category", None, Some("Parent($levels=3)")).unwrap();
        assert_eq!(clause.expansion_depth(2), 3);

        let processed = clause.process_levels(2);
        assert_eq!(processed.expansion_depth(2), 3);
        let mut level = &processed.expanded()[0];
        let mut hops = 1;
        while let Some(next) = level.select_expand.expanded().first() {
            assert!(next.levels.is_none());
            level = next;
            hops += 1;
        }
        assert_eq!(hops, 3);
    }

    #[test]
    fn levels_max_uses_supplied_ceiling() {
        let clause = parse_on("Category", None, Some("Parent($levels=max)")).unwrap();
        assert_eq!(clause.expansion_depth(4), 4);
        assert_eq!(clause.process_levels(4).expansion_depth(0), 4);
    }

    #[test]
    fn nested_option_names_follow_case_insensitive_mode() {
        let model = model();
        let ty = model.structured_type("Category").unwrap();
        let aliases = BTreeMap::new();
        let strict = ParseScope::new(&model, ty, UriResolverConfig::default(), &aliases);
        assert!(parse(None, Some("Parent($LEVELS=2)"), &strict).is_err());

        let resolver = UriResolverConfig {
            enable_case_insensitive: true,
            ..UriResolverConfig::default()
        };
        let scope = ParseScope::new(&model, ty, resolver, &aliases);
        let clause = parse(None, Some("Parent($LEVELS=2;$Select=Title)"), &scope).unwrap();
        let parent = &clause.expanded()[0];
        assert_eq!(parent.levels, Some(ExpandLevels::Count(2)));
        assert_eq!(
            parent.select_expand.selected(),
            &[SelectItem::Property(vec!["Title".to_owned()])]
        );
    }

    #[test]
    fn star_expands_every_navigation() {
        let clause = parse_on("Product", None, Some("*")).unwrap();
        let names: Vec<_> = clause.expanded().iter().map(ExpandItem::path_string).collect();
        assert_eq!(names, vec!["Category", "Orders"]);
    }
}
