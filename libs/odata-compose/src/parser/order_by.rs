use std::fmt;

use super::{ParseScope, ResolvedPath, Terminal, resolve_path, split_top_level};
use crate::errors::{ODataError, Result};
use crate::kind::QueryOptionKind;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SortDir {
    #[default]
    Asc,
    Desc,
}

impl SortDir {
    fn from_keyword(s: &str) -> Option<Self> {
        if s.eq_ignore_ascii_case("asc") {
            Some(SortDir::Asc)
        } else if s.eq_ignore_ascii_case("desc") {
            Some(SortDir::Desc)
        } else {
            None
        }
    }
}

impl fmt::Display for SortDir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SortDir::Asc => "asc",
            SortDir::Desc => "desc",
        })
    }
}

/// One `$orderby` item.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OrderByNode {
    /// Declared property, possibly reached through complex or single-valued navigation segments.
    Property { path: Vec<String>, dir: SortDir },
    /// Name with no declared property behind it: a dynamic property, a
    /// `$compute` alias, or a result name of `$apply`.
    Open { name: String, dir: SortDir },
}

impl OrderByNode {
    #[must_use]
    pub fn property(name: impl Into<String>, dir: SortDir) -> Self {
        OrderByNode::Property {
            path: vec![name.into()],
            dir,
        }
    }

    #[must_use]
    pub fn open(name: impl Into<String>, dir: SortDir) -> Self {
        OrderByNode::Open {
            name: name.into(),
            dir,
        }
    }

    /// Name used to decide whether a property is already ordered on:
    /// the full path joined with `/`.
    #[must_use]
    pub fn referenced_name(&self) -> String {
        match self {
            OrderByNode::Property { path, .. } => path.join("/"),
            OrderByNode::Open { name, .. } => name.clone(),
        }
    }

    #[must_use]
    pub fn dir(&self) -> SortDir {
        match self {
            OrderByNode::Property { dir, .. } | OrderByNode::Open { dir, .. } => *dir,
        }
    }
}

impl fmt::Display for OrderByNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.dir() {
            SortDir::Asc => f.write_str(&self.referenced_name()),
            SortDir::Desc => write!(f, "{} desc", self.referenced_name()),
        }
    }
}

/// Parsed `$orderby`: nodes in request order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[must_use]
pub struct OrderByClause {
    nodes: Vec<OrderByNode>,
}

impl OrderByClause {
    pub fn new(nodes: Vec<OrderByNode>) -> Self {
        Self { nodes }
    }

    #[must_use]
    pub fn nodes(&self) -> &[OrderByNode] {
        &self.nodes
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn referenced_names(&self) -> impl Iterator<Item = String> + '_ {
        self.nodes.iter().map(OrderByNode::referenced_name)
    }

    /// Copy of this clause with `extra` appended after the existing nodes.
    pub fn with_appended(&self, extra: impl IntoIterator<Item = OrderByNode>) -> Self {
        let mut nodes = self.nodes.clone();
        nodes.extend(extra);
        Self { nodes }
    }
}

impl fmt::Display for OrderByClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, node) in self.nodes.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{node}")?;
        }
        Ok(())
    }
}

pub(super) fn parse(raw: &str, scope: &ParseScope<'_>) -> Result<OrderByClause> {
    let option = QueryOptionKind::OrderBy;
    let mut nodes = Vec::new();
    for item in split_top_level(raw, ',') {
        let mut words = item.split_whitespace();
        let Some(target) = words.next() else {
            return Err(ODataError::parse(option, "empty ordering item"));
        };
        let dir = match words.next() {
            None => SortDir::Asc,
            Some(w) => SortDir::from_keyword(w).ok_or_else(|| {
                ODataError::parse(
                    option,
                    format!("expected 'asc' or 'desc' after '{target}', found '{w}'"),
                )
            })?,
        };
        if let Some(extra) = words.next() {
            return Err(ODataError::parse(
                option,
                format!("unexpected '{extra}' in ordering item '{}'", item.trim()),
            ));
        }
        nodes.push(bind(target, dir, scope)?);
    }
    Ok(OrderByClause::new(nodes))
}

fn bind(target: &str, dir: SortDir, scope: &ParseScope<'_>) -> Result<OrderByNode> {
    let option = QueryOptionKind::OrderBy;
    if scope.apply_names.is_some() {
        if let Some(name) = scope.apply_name(target) {
            return Ok(OrderByNode::open(name, dir));
        }
        if scope.is_computed(target) {
            return Ok(OrderByNode::open(target, dir));
        }
        return Err(ODataError::parse(
            option,
            format!("'{target}' is not part of the $apply result"),
        ));
    }

    match resolve_path(target, scope, option)? {
        ResolvedPath::Declared {
            path,
            terminal: Terminal::Primitive,
        } => Ok(OrderByNode::Property { path, dir }),
        ResolvedPath::Declared { path, .. } => Err(ODataError::parse(
            option,
            format!(
                "'{}' is not a single primitive value and cannot be ordered on",
                path.join("/")
            ),
        )),
        ResolvedPath::Dynamic(name) | ResolvedPath::Computed(name) => {
            Ok(OrderByNode::open(name, dir))
        }
    }
}
