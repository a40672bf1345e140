#![allow(clippy::unwrap_used, clippy::expect_used)]
#![allow(dead_code)]

use std::cell::RefCell;
use std::cmp::Ordering;
use std::sync::Arc;

use odata_compose::ast::{CompareOperator, Expr, FilterClause, Value};
use odata_compose::parser::{
    ApplyClause, ComputeClause, OrderByClause, OrderByNode, SearchExpr, SelectExpandClause,
    SkipToken, SortDir,
};
use odata_compose::{
    AutoExpand, EdmModel, EdmPrimitiveKind, ODataPath, ODataQueryOptions, QueryBinder, QueryContext,
    QuerySettings, Result, StructuredType, VecQueryable,
};

#[derive(Clone, Debug, PartialEq)]
pub struct Product {
    pub id: i32,
    pub name: String,
    pub price: f64,
}

/// `Product` (key `Id`), keyless `Reading`, and `Category` auto-expanded from `Product`.
pub fn model() -> Arc<EdmModel> {
    Arc::new(
        EdmModel::new()
            .with_type(
                StructuredType::entity("Product")
                    .key("Id", EdmPrimitiveKind::Int32)
                    .property("Name", EdmPrimitiveKind::String)
                    .property("Price", EdmPrimitiveKind::Double)
                    .property("Sku", EdmPrimitiveKind::String)
                    .auto_select()
                    .navigation("Category", "Category", false)
                    .auto_expand(AutoExpand::UnlessSelectPresent)
                    .navigation("Reviews", "Review", true),
            )
            .with_type(
                StructuredType::entity("Category")
                    .key("Id", EdmPrimitiveKind::Int32)
                    .property("Title", EdmPrimitiveKind::String),
            )
            .with_type(
                StructuredType::entity("Review")
                    .key("ProductId", EdmPrimitiveKind::Int32)
                    .key("Seq", EdmPrimitiveKind::Int32)
                    .property("Stars", EdmPrimitiveKind::Int32),
            )
            .with_type(
                StructuredType::entity("Reading")
                    .property("Value", EdmPrimitiveKind::Double)
                    .property("Blob", EdmPrimitiveKind::Stream)
                    .property("Timestamp", EdmPrimitiveKind::DateTimeOffset)
                    .property("Device", EdmPrimitiveKind::String),
            )
            .with_entity_set("Products", "Product", &[]),
    )
}

pub fn context(element_type: &str) -> Arc<QueryContext> {
    QueryContext::builder(model(), element_type).build().unwrap()
}

pub fn context_with_path(element_type: &str, path: ODataPath) -> Arc<QueryContext> {
    QueryContext::builder(model(), element_type)
        .path(path)
        .build()
        .unwrap()
}

pub fn options(element_type: &str, pairs: &[(&str, &str)]) -> ODataQueryOptions {
    ODataQueryOptions::from_pairs(pairs.iter().copied(), context(element_type)).unwrap()
}

pub fn products(n: i32) -> VecQueryable<Product> {
    VecQueryable::new(
        (1..=n)
            .rev()
            .map(|id| Product {
                id,
                name: format!("p{id:02}"),
                price: f64::from(id),
            })
            .collect(),
    )
}

pub fn ids(query: VecQueryable<Product>) -> Vec<i32> {
    query.into_vec().into_iter().map(|p| p.id).collect()
}

pub fn settings() -> QuerySettings {
    QuerySettings::default()
}

/// Binder over [`VecQueryable<Product>`] that records every clause it is handed.
#[derive(Default)]
pub struct RecordingBinder {
    steps: RefCell<Vec<String>>,
}

impl RecordingBinder {
    pub fn steps(&self) -> Vec<String> {
        self.steps.borrow().clone()
    }

    fn record(&self, step: String) {
        self.steps.borrow_mut().push(step);
    }
}

fn number(expr: &Expr) -> Option<f64> {
    match expr {
        Expr::Value(Value::Number(n)) => n.to_string().parse().ok(),
        _ => None,
    }
}

fn field(product: &Product, name: &str) -> Option<f64> {
    match name {
        "Id" => Some(f64::from(product.id)),
        "Price" => Some(product.price),
        _ => None,
    }
}

fn matches(product: &Product, expr: &Expr) -> bool {
    match expr {
        Expr::And(a, b) => matches(product, a) && matches(product, b),
        Expr::Or(a, b) => matches(product, a) || matches(product, b),
        Expr::Not(x) => !matches(product, x),
        Expr::Compare(left, op, right) => {
            let (Expr::Identifier(name), Some(rhs)) = (left.as_ref(), number(right)) else {
                return true;
            };
            let Some(lhs) = field(product, name) else {
                return true;
            };
            match op {
                CompareOperator::Eq => (lhs - rhs).abs() < f64::EPSILON,
                CompareOperator::Ne => (lhs - rhs).abs() >= f64::EPSILON,
                CompareOperator::Gt => lhs > rhs,
                CompareOperator::Ge => lhs >= rhs,
                CompareOperator::Lt => lhs < rhs,
                CompareOperator::Le => lhs <= rhs,
            }
        }
        _ => true,
    }
}

fn compare(a: &Product, b: &Product, node: &OrderByNode) -> Ordering {
    let ord = match node.referenced_name().as_str() {
        "Id" => a.id.cmp(&b.id),
        "Name" => a.name.cmp(&b.name),
        "Price" => a.price.total_cmp(&b.price),
        _ => Ordering::Equal,
    };
    match node.dir() {
        SortDir::Asc => ord,
        SortDir::Desc => ord.reverse(),
    }
}

impl QueryBinder<VecQueryable<Product>> for RecordingBinder {
    fn bind_filter(
        &self,
        query: VecQueryable<Product>,
        clause: &FilterClause,
        compute: Option<&ComputeClause>,
        _settings: &QuerySettings,
    ) -> Result<VecQueryable<Product>> {
        self.record(format!("filter(computed={})", compute.is_some()));
        Ok(query.retain(|p| matches(p, clause.expr())))
    }

    fn bind_order_by(
        &self,
        query: VecQueryable<Product>,
        clause: &OrderByClause,
        compute: Option<&ComputeClause>,
        _settings: &QuerySettings,
    ) -> Result<VecQueryable<Product>> {
        if compute.is_some() {
            self.record(format!("orderby({clause};computed)"));
        } else {
            self.record(format!("orderby({clause})"));
        }
        Ok(query.sort_by(|a, b| {
            clause
                .nodes()
                .iter()
                .map(|node| compare(a, b, node))
                .find(|o| o.is_ne())
                .unwrap_or(Ordering::Equal)
        }))
    }

    fn bind_apply(
        &self,
        query: VecQueryable<Product>,
        _clause: &ApplyClause,
        _settings: &QuerySettings,
    ) -> Result<VecQueryable<Product>> {
        self.record("apply".to_owned());
        Ok(query)
    }

    fn bind_search(
        &self,
        query: VecQueryable<Product>,
        expr: &SearchExpr,
        _settings: &QuerySettings,
    ) -> Result<VecQueryable<Product>> {
        self.record("search".to_owned());
        let SearchExpr::Term(term) = expr else {
            return Ok(query);
        };
        let term = term.clone();
        Ok(query.retain(move |p| p.name.contains(term.as_str())))
    }

    fn bind_skip_token(
        &self,
        query: VecQueryable<Product>,
        token: &SkipToken,
        order_by: Option<&OrderByClause>,
        _settings: &QuerySettings,
    ) -> Result<VecQueryable<Product>> {
        let order = order_by.map(ToString::to_string).unwrap_or_default();
        self.record(format!("skiptoken(orderby={order})"));
        let after: i32 = token.get("Id").and_then(|v| v.parse().ok()).unwrap_or(i32::MIN);
        Ok(query.retain(|p| p.id > after))
    }

    fn bind_select_expand(
        &self,
        query: VecQueryable<Product>,
        clause: &SelectExpandClause,
        _settings: &QuerySettings,
    ) -> Result<VecQueryable<Product>> {
        let selected: Vec<String> = clause.selected().iter().map(|s| s.path()).collect();
        let expanded: Vec<String> = clause.expanded().iter().map(|e| e.path_string()).collect();
        self.record(format!(
            "select_expand(select=[{}], expand=[{}])",
            selected.join(","),
            expanded.join(",")
        ));
        Ok(query)
    }

    fn count(&self, query: &VecQueryable<Product>) -> Result<Option<u64>> {
        Ok(Some(u64::try_from(query.len()).unwrap()))
    }
}
