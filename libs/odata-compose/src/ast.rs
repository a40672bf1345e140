//! `$filter` expression tree.
//!
//! Parsing is delegated to `odata_params`; this module owns the transport-agnostic
//! tree handed to binders and the complexity metrics validators need.

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use odata_params::filters as od;
use uuid::Uuid;

use crate::errors::{ODataError, Result};
use crate::kind::QueryOptionKind;

#[derive(Clone, Debug)]
pub enum Expr {
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    Compare(Box<Expr>, CompareOperator, Box<Expr>),
    In(Box<Expr>, Vec<Expr>),
    Function(String, Vec<Expr>),
    Identifier(String),
    Value(Value),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareOperator {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

#[derive(Clone, Debug)]
pub enum Value {
    Null,
    Bool(bool),
    Number(BigDecimal),
    Uuid(Uuid),
    DateTime(DateTime<Utc>),
    Date(NaiveDate),
    Time(NaiveTime),
    String(String),
}

impl Expr {
    /// Total number of nodes in the tree.
    #[must_use]
    pub fn node_count(&self) -> usize {
        match self {
            Expr::Value(_) | Expr::Identifier(_) => 1,
            Expr::Not(x) => 1 + x.node_count(),
            Expr::And(a, b) | Expr::Or(a, b) | Expr::Compare(a, _, b) => {
                1 + a.node_count() + b.node_count()
            }
            Expr::In(a, list) => {
                1 + a.node_count() + list.iter().map(Expr::node_count).sum::<usize>()
            }
            Expr::Function(_, args) => 1 + args.iter().map(Expr::node_count).sum::<usize>(),
        }
    }

    /// Deepest nesting of `any`/`all` lambda calls.
    #[must_use]
    pub fn any_all_depth(&self) -> usize {
        match self {
            Expr::Value(_) | Expr::Identifier(_) => 0,
            Expr::Not(x) => x.any_all_depth(),
            Expr::And(a, b) | Expr::Or(a, b) | Expr::Compare(a, _, b) => {
                a.any_all_depth().max(b.any_all_depth())
            }
            Expr::In(a, list) => list
                .iter()
                .map(Expr::any_all_depth)
                .fold(a.any_all_depth(), usize::max),
            Expr::Function(name, args) => {
                let inner = args.iter().map(Expr::any_all_depth).max().unwrap_or(0);
                let lambda = name.eq_ignore_ascii_case("any") || name.eq_ignore_ascii_case("all");
                inner + usize::from(lambda)
            }
        }
    }

    /// Every property path referenced by the expression, in visit order.
    #[must_use]
    pub fn identifiers(&self) -> Vec<&str> {
        fn walk<'a>(e: &'a Expr, out: &mut Vec<&'a str>) {
            match e {
                Expr::Identifier(name) => out.push(name),
                Expr::Value(_) => {}
                Expr::Not(x) => walk(x, out),
                Expr::And(a, b) | Expr::Or(a, b) | Expr::Compare(a, _, b) => {
                    walk(a, out);
                    walk(b, out);
                }
                Expr::In(a, list) => {
                    walk(a, out);
                    for item in list {
                        walk(item, out);
                    }
                }
                Expr::Function(_, args) => {
                    for arg in args {
                        walk(arg, out);
                    }
                }
            }
        }
        let mut out = Vec::new();
        walk(self, &mut out);
        out
    }
}

impl From<od::CompareOperator> for CompareOperator {
    fn from(op: od::CompareOperator) -> Self {
        use od::CompareOperator::{
            Equal, GreaterOrEqual, GreaterThan, LessOrEqual, LessThan, NotEqual,
        };
        match op {
            Equal => CompareOperator::Eq,
            NotEqual => CompareOperator::Ne,
            GreaterThan => CompareOperator::Gt,
            GreaterOrEqual => CompareOperator::Ge,
            LessThan => CompareOperator::Lt,
            LessOrEqual => CompareOperator::Le,
        }
    }
}

impl From<od::Value> for Value {
    fn from(v: od::Value) -> Self {
        match v {
            od::Value::Null => Value::Null,
            od::Value::Bool(b) => Value::Bool(b),
            od::Value::Number(n) => Value::Number(n),
            od::Value::Uuid(u) => Value::Uuid(u),
            od::Value::DateTime(dt) => Value::DateTime(dt),
            od::Value::Date(d) => Value::Date(d),
            od::Value::Time(t) => Value::Time(t),
            od::Value::String(s) => Value::String(s),
        }
    }
}

impl From<od::Expr> for Expr {
    fn from(e: od::Expr) -> Self {
        match e {
            od::Expr::And(a, b) => Expr::And(Box::new((*a).into()), Box::new((*b).into())),
            od::Expr::Or(a, b) => Expr::Or(Box::new((*a).into()), Box::new((*b).into())),
            od::Expr::Not(x) => Expr::Not(Box::new((*x).into())),
            od::Expr::Compare(l, op, r) => {
                Expr::Compare(Box::new((*l).into()), op.into(), Box::new((*r).into()))
            }
            od::Expr::In(l, list) => Expr::In(
                Box::new((*l).into()),
                list.into_iter().map(Into::into).collect(),
            ),
            od::Expr::Function(n, args) => {
                Expr::Function(n, args.into_iter().map(Into::into).collect())
            }
            od::Expr::Identifier(s) => Expr::Identifier(s),
            od::Expr::Value(v) => Expr::Value(v.into()),
        }
    }
}

/// Parsed `$filter` with its node count cached for budget checks.
#[derive(Clone, Debug)]
pub struct FilterClause {
    expr: Expr,
    node_count: usize,
}

impl FilterClause {
    #[must_use]
    pub fn new(expr: Expr) -> Self {
        let node_count = expr.node_count();
        Self { expr, node_count }
    }

    #[must_use]
    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.node_count
    }
}

/// Parse a boolean expression with `odata_params`.
///
/// `option` is the query option the text came from; it is echoed back in
/// parse errors so `$apply=filter(...)` failures point at `$apply`.
///
/// # Errors
/// Returns `ODataError::Parse` if the expression is malformed.
pub fn parse_bool_expr(raw: &str, option: QueryOptionKind) -> Result<Expr> {
    od::parse_str(raw)
        .map(Into::into)
        .map_err(|e| ODataError::parse(option, format!("{e:?}")))
}
