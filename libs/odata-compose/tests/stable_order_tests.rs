#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Stable ordering synthesized for paged requests.

mod common;

use common::{context, options};
use odata_compose::options::{ApplyOption, OrderByOption};
use odata_compose::parser::{OrderByNode, SortDir};
use odata_compose::{ensure_stable_sort_order_by, generate_default_order_by};

fn names(order_by: &OrderByOption) -> Vec<String> {
    order_by
        .order_by_nodes()
        .unwrap()
        .iter()
        .map(OrderByNode::referenced_name)
        .collect()
}

#[test]
fn keyed_type_orders_by_key_in_declared_order() {
    let order = generate_default_order_by(&context("Review"), None)
        .unwrap()
        .unwrap();
    assert_eq!(
        order.order_by_nodes().unwrap(),
        &[
            OrderByNode::property("ProductId", SortDir::Asc),
            OrderByNode::property("Seq", SortDir::Asc),
        ]
    );
}

#[test]
fn keyless_type_orders_by_primitive_properties_by_name() {
    let order = generate_default_order_by(&context("Reading"), None)
        .unwrap()
        .unwrap();
    assert_eq!(names(&order), vec!["Device", "Timestamp", "Value"]);
    assert!(
        order
            .order_by_nodes()
            .unwrap()
            .iter()
            .all(|n| n.dir() == SortDir::Asc)
    );
}

#[test]
fn generation_is_cached_per_request() {
    let opts = options("Product", &[("$top", "5")]);
    let first = opts.generate_stable_order().unwrap().unwrap();
    let second = opts.generate_stable_order().unwrap().unwrap();
    assert!(std::ptr::eq(first, second));
    assert_eq!(names(first), vec!["Id"]);
}

#[test]
fn order_already_covering_key_is_kept() {
    let ctx = context("Review");
    let existing = OrderByOption::new("Seq desc,ProductId", ctx).unwrap();
    assert!(ensure_stable_sort_order_by(&existing, None).unwrap().is_none());

    let opts = options("Review", &[("$orderby", "Seq desc,ProductId"), ("$top", "1")]);
    let stable = opts.generate_stable_order().unwrap().unwrap();
    assert!(std::ptr::eq(stable, opts.order_by().unwrap()));
}

#[test]
fn missing_key_properties_are_appended_ascending() {
    let existing = OrderByOption::new("Stars desc,Seq", context("Review")).unwrap();
    let stable = ensure_stable_sort_order_by(&existing, None)
        .unwrap()
        .unwrap();
    assert_eq!(
        stable.order_by_nodes().unwrap(),
        &[
            OrderByNode::property("Stars", SortDir::Desc),
            OrderByNode::property("Seq", SortDir::Asc),
            OrderByNode::property("ProductId", SortDir::Asc),
        ]
    );
    assert_eq!(stable.raw_value(), "Stars desc,Seq,ProductId");
}

#[test]
fn aggregate_aliases_drive_default_order() {
    let ctx = context("Product");
    let apply = ApplyOption::new(
        "aggregate(Price with sum as Total,Price with max as Top)",
        ctx.clone(),
    )
    .unwrap();
    let order = generate_default_order_by(&ctx, Some(&apply)).unwrap().unwrap();
    assert_eq!(names(&order), vec!["Total", "Top"]);
}

#[test]
fn grouping_names_are_appended_sorted() {
    let opts = options(
        "Product",
        &[
            ("$apply", "groupby((Name,Price))"),
            ("$orderby", "Price desc"),
            ("$top", "3"),
        ],
    );
    let stable = opts.generate_stable_order().unwrap().unwrap();
    assert_eq!(stable.raw_value(), "Price desc,Name");
    assert_eq!(names(stable), vec!["Price", "Name"]);
}
