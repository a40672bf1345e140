//! `$apply` transformation pipeline: `aggregate`, `groupby`, `filter`, `compute`.

use super::compute::{self, ComputeClause, split_alias};
use super::{
    ParseScope, ResolvedPath, Terminal, is_identifier, resolve_path, split_call, split_top_level,
};
use crate::ast::{FilterClause, parse_bool_expr};
use crate::errors::{ODataError, Result};
use crate::kind::QueryOptionKind;

const OPTION: QueryOptionKind = QueryOptionKind::Apply;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AggregationMethod {
    Sum,
    Min,
    Max,
    Average,
    CountDistinct,
    /// Namespace-qualified custom aggregation.
    Custom(String),
}

impl AggregationMethod {
    fn parse(s: &str) -> Result<Self> {
        Ok(match s {
            "sum" => AggregationMethod::Sum,
            "min" => AggregationMethod::Min,
            "max" => AggregationMethod::Max,
            "average" => AggregationMethod::Average,
            "countdistinct" => AggregationMethod::CountDistinct,
            other if other.contains('.') => AggregationMethod::Custom(other.to_owned()),
            other => {
                return Err(ODataError::parse(
                    OPTION,
                    format!("unknown aggregation method '{other}'"),
                ));
            }
        })
    }
}

/// `path with method as Alias`, or `$count as Alias` (no method).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AggregateExpression {
    pub expression: String,
    pub method: Option<AggregationMethod>,
    pub alias: String,
}

/// Grouping property; paths sharing a prefix hang off one node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupByProperty {
    pub name: String,
    pub children: Vec<GroupByProperty>,
}

impl GroupByProperty {
    fn leaf(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            children: Vec::new(),
        }
    }
}

#[derive(Clone, Debug)]
pub enum Transformation {
    Aggregate(Vec<AggregateExpression>),
    GroupBy {
        properties: Vec<GroupByProperty>,
        aggregate: Option<Vec<AggregateExpression>>,
    },
    Filter(FilterClause),
    Compute(ComputeClause),
}

#[derive(Clone, Debug, Default)]
pub struct ApplyClause {
    transformations: Vec<Transformation>,
}

impl ApplyClause {
    #[must_use]
    pub fn transformations(&self) -> &[Transformation] {
        &self.transformations
    }

    fn last_shaping(&self) -> Option<(usize, &Transformation)> {
        self.transformations
            .iter()
            .enumerate()
            .rev()
            .find(|(_, t)| {
                matches!(t, Transformation::Aggregate(_) | Transformation::GroupBy { .. })
            })
    }

    /// Names a deterministic ordering must cover once the result is reshaped:
    /// aggregate aliases for a terminal `aggregate`, flattened grouping paths
    /// for a terminal `groupby`. `None` when nothing reshapes the element.
    #[must_use]
    pub fn stable_sort_names(&self) -> Option<Vec<String>> {
        match self.last_shaping()?.1 {
            Transformation::Aggregate(items) => {
                Some(items.iter().map(|a| a.alias.clone()).collect())
            }
            Transformation::GroupBy { properties, .. } => Some(flatten_grouping(properties)),
            _ => None,
        }
    }

    /// Every name addressable after the pipeline runs, when it reshapes the element.
    #[must_use]
    pub fn result_names(&self) -> Option<Vec<String>> {
        let (idx, shaping) = self.last_shaping()?;
        let mut names = match shaping {
            Transformation::Aggregate(items) => items.iter().map(|a| a.alias.clone()).collect(),
            Transformation::GroupBy {
                properties,
                aggregate,
            } => {
                let mut names = flatten_grouping(properties);
                names.extend(aggregate.iter().flatten().map(|a| a.alias.clone()));
                names
            }
            _ => Vec::new(),
        };
        for t in &self.transformations[idx + 1..] {
            if let Transformation::Compute(c) = t {
                names.extend(c.aliases());
            }
        }
        Some(names)
    }
}

/// Depth-first flattening; nested names are joined with `/`.
#[must_use]
pub fn flatten_grouping(properties: &[GroupByProperty]) -> Vec<String> {
    fn walk(props: &[GroupByProperty], prefix: &str, out: &mut Vec<String>) {
        for p in props {
            let path = if prefix.is_empty() {
                p.name.clone()
            } else {
                format!("{prefix}/{}", p.name)
            };
            if p.children.is_empty() {
                out.push(path);
            } else {
                walk(&p.children, &path, out);
            }
        }
    }
    let mut out = Vec::new();
    walk(properties, "", &mut out);
    out
}

pub(super) fn parse(raw: &str, scope: &ParseScope<'_>) -> Result<ApplyClause> {
    let mut transformations = Vec::new();
    let mut produced: Vec<String> = Vec::new();
    for step in split_top_level(raw, '/') {
        let step = step.trim();
        let (name, args) = split_call(step).ok_or_else(|| {
            ODataError::parse(OPTION, format!("expected a transformation, found '{step}'"))
        })?;
        let t = match name {
            "aggregate" => Transformation::Aggregate(parse_aggregate(args, scope, &produced)?),
            "groupby" => parse_group_by(args, scope, &produced)?,
            "filter" => Transformation::Filter(FilterClause::new(parse_bool_expr(args, OPTION)?)),
            "compute" => {
                let clause = compute::parse_for(args, scope, OPTION)?;
                for alias in clause.aliases() {
                    reject_duplicate_alias(&alias, &produced)?;
                }
                Transformation::Compute(clause)
            }
            other => {
                return Err(ODataError::parse(
                    OPTION,
                    format!("unsupported transformation '{other}'"),
                ));
            }
        };
        match &t {
            Transformation::Aggregate(items) => {
                produced.extend(items.iter().map(|a| a.alias.clone()));
            }
            Transformation::GroupBy { aggregate, .. } => {
                produced.extend(aggregate.iter().flatten().map(|a| a.alias.clone()));
            }
            Transformation::Compute(c) => produced.extend(c.aliases()),
            Transformation::Filter(_) => {}
        }
        transformations.push(t);
    }
    Ok(ApplyClause { transformations })
}

fn parse_aggregate(
    args: &str,
    scope: &ParseScope<'_>,
    produced: &[String],
) -> Result<Vec<AggregateExpression>> {
    let mut out: Vec<AggregateExpression> = Vec::new();
    for item in split_top_level(args, ',') {
        let item = item.trim();
        let (lhs, alias) = split_alias(item).ok_or_else(|| {
            ODataError::parse(OPTION, format!("aggregate item '{item}' needs an alias"))
        })?;
        if !is_identifier(alias) {
            return Err(ODataError::parse(OPTION, format!("'{alias}' is not a valid alias")));
        }
        reject_duplicate_alias(alias, produced)?;
        if out.iter().any(|a| a.alias == alias) {
            return Err(ODataError::parse(OPTION, format!("alias '{alias}' is defined twice")));
        }
        let (expression, method) = match lhs.rfind(" with ") {
            Some(idx) => (
                lhs[..idx].trim(),
                Some(AggregationMethod::parse(lhs[idx + 6..].trim())?),
            ),
            None if lhs == "$count" => (lhs, None),
            None => {
                return Err(ODataError::parse(
                    OPTION,
                    format!("aggregate item '{item}' needs 'with <method>'"),
                ));
            }
        };
        if method.is_some() && !produced.iter().any(|p| p == expression) {
            check_value_path(expression, scope)?;
        }
        out.push(AggregateExpression {
            expression: expression.to_owned(),
            method,
            alias: alias.to_owned(),
        });
    }
    Ok(out)
}

fn reject_duplicate_alias(alias: &str, produced: &[String]) -> Result<()> {
    if produced.iter().any(|p| p == alias) {
        return Err(ODataError::parse(OPTION, format!("alias '{alias}' is defined twice")));
    }
    Ok(())
}

fn check_value_path(expression: &str, scope: &ParseScope<'_>) -> Result<()> {
    match resolve_path(expression, scope, OPTION)? {
        ResolvedPath::Declared {
            terminal: Terminal::Primitive,
            ..
        }
        | ResolvedPath::Dynamic(_)
        | ResolvedPath::Computed(_) => Ok(()),
        ResolvedPath::Declared { path, .. } => Err(ODataError::parse(
            OPTION,
            format!("'{}' is not a primitive value", path.join("/")),
        )),
    }
}

fn parse_group_by(
    args: &str,
    scope: &ParseScope<'_>,
    produced: &[String],
) -> Result<Transformation> {
    let parts = split_top_level(args, ',');
    let Some(list) = parts
        .first()
        .copied()
        .map(str::trim)
        .and_then(|s| s.strip_prefix('('))
        .and_then(|s| s.strip_suffix(')'))
    else {
        return Err(ODataError::parse(OPTION, "groupby expects a parenthesized property list"));
    };

    let mut properties: Vec<GroupByProperty> = Vec::new();
    for path in split_top_level(list, ',') {
        let path = path.trim();
        let segments = if produced.iter().any(|p| p == path) {
            vec![path.to_owned()]
        } else {
            match resolve_path(path, scope, OPTION)? {
                ResolvedPath::Declared {
                    path,
                    terminal: Terminal::Primitive,
                } => path,
                ResolvedPath::Declared { path, .. } => {
                    return Err(ODataError::parse(
                        OPTION,
                        format!("cannot group by '{}': not a primitive value", path.join("/")),
                    ));
                }
                ResolvedPath::Dynamic(name) => name.split('/').map(str::to_owned).collect(),
                ResolvedPath::Computed(name) => vec![name],
            }
        };
        insert_grouping(&mut properties, &segments);
    }

    let aggregate = match parts.get(1).copied().map(str::trim) {
        None => None,
        Some(child) => match split_call(child) {
            Some(("aggregate", inner)) => Some(parse_aggregate(inner, scope, produced)?),
            _ => {
                return Err(ODataError::parse(
                    OPTION,
                    format!("groupby supports only an aggregate child, found '{child}'"),
                ));
            }
        },
    };
    if parts.len() > 2 {
        return Err(ODataError::parse(OPTION, "groupby takes at most two arguments"));
    }

    Ok(Transformation::GroupBy {
        properties,
        aggregate,
    })
}

fn insert_grouping(tree: &mut Vec<GroupByProperty>, segments: &[String]) {
    let Some((first, rest)) = segments.split_first() else {
        return;
    };
    let idx = if let Some(i) = tree.iter().position(|n| &n.name == first) {
        i
    } else {
        tree.push(GroupByProperty::leaf(first));
        tree.len() - 1
    };
    insert_grouping(&mut tree[idx].children, rest);
}
