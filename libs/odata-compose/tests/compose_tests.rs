#![allow(clippy::unwrap_used, clippy::expect_used)]

//! End-to-end composition over an in-memory source.

mod common;

use common::{RecordingBinder, context_with_path, ids, options, products, settings};
use odata_compose::{
    AllowedQueryOptions, ODataError, ODataPath, ODataQueryOptions, PathSegment, QueryOptionKind,
    QuerySettings,
};
use tracing_test::traced_test;

#[test]
#[traced_test]
fn filter_then_stable_order_then_skip_top_then_page_limit() {
    let mut opts = options(
        "Product",
        &[("$filter", "Price gt 10"), ("$top", "5"), ("$skip", "2")],
    );
    let binder = RecordingBinder::default();

    let applied = opts
        .apply_to(products(20), &binder, &settings().with_page_size(3))
        .unwrap();

    assert_eq!(ids(applied.query), vec![13, 14, 15]);
    assert!(applied.results_limited);
    assert_eq!(applied.page_size, Some(3));
    assert_eq!(applied.total_count, None);
    assert_eq!(
        binder.steps(),
        vec![
            "filter(computed=false)",
            "orderby(Id)",
            "select_expand(select=[], expand=[Category])",
        ]
    );
    assert!(logs_contain("default ordering from entity key"));
    assert!(logs_contain("page size limit applied"));
}

#[test]
fn page_that_fits_is_not_limited() {
    let mut opts = options("Product", &[("$filter", "Price le 4"), ("$orderby", "Price desc")]);
    let binder = RecordingBinder::default();

    let applied = opts
        .apply_to(products(20), &binder, &settings().with_page_size(10))
        .unwrap();

    assert_eq!(ids(applied.query), vec![4, 3, 2, 1]);
    assert!(!applied.results_limited);
    assert_eq!(binder.steps()[1], "orderby(Price desc,Id)");
}

#[test]
fn apply_runs_first_and_orders_on_its_result_names() {
    let mut opts = options("Product", &[("$apply", "groupby((Name))"), ("$top", "2")]);
    let binder = RecordingBinder::default();

    let applied = opts.apply_to(products(5), &binder, &settings()).unwrap();

    assert_eq!(ids(applied.query), vec![1, 2]);
    assert_eq!(
        binder.steps(),
        vec![
            "apply",
            "orderby(Name)",
            "select_expand(select=[], expand=[Category])",
        ]
    );
}

#[test]
fn order_by_on_computed_alias_receives_compute_clause() {
    let mut opts = options(
        "Product",
        &[("$compute", "Price mul 2 as Dbl"), ("$orderby", "Dbl"), ("$top", "1")],
    );
    let binder = RecordingBinder::default();

    let applied = opts.apply_to(products(5), &binder, &settings()).unwrap();

    assert_eq!(ids(applied.query), vec![1]);
    assert_eq!(binder.steps()[0], "orderby(Dbl,Id;computed)");
}

#[test]
fn no_paging_means_no_synthesized_order() {
    let mut opts = options("Product", &[("$filter", "Id lt 3")]);
    let binder = RecordingBinder::default();

    let applied = opts.apply_to(products(5), &binder, &settings()).unwrap();

    assert_eq!(ids(applied.query), vec![2, 1]);
    assert!(!binder.steps().iter().any(|s| s.starts_with("orderby")));
    assert_eq!(applied.page_size, None);
}

#[test]
fn count_segment_short_circuits_after_filter() {
    let path = ODataPath::entity_set("Products").push(PathSegment::Count);
    let ctx = context_with_path("Product", path);
    let mut opts = ODataQueryOptions::from_pairs(
        [
            ("$filter", "Price gt 15"),
            ("$orderby", "Name"),
            ("$top", "1"),
            ("$skip", "1"),
        ],
        ctx,
    )
    .unwrap();
    let binder = RecordingBinder::default();

    let applied = opts
        .apply_to(products(20), &binder, &settings().with_page_size(2))
        .unwrap();

    assert!(!applied.results_limited);
    assert_eq!(applied.total_count, Some(5));
    assert_eq!(ids(applied.query).len(), 5);
    assert_eq!(binder.steps(), vec!["filter(computed=false)"]);
}

#[test]
fn inline_count_is_taken_before_paging() {
    let mut opts = options("Product", &[("$count", "true"), ("$top", "2")]);
    let binder = RecordingBinder::default();

    let applied = opts.apply_to(products(7), &binder, &settings()).unwrap();

    assert_eq!(applied.total_count, Some(7));
    assert_eq!(ids(applied.query), vec![1, 2]);
}

#[test]
fn ignored_options_are_skipped_and_settings_untouched() {
    let mut opts = options(
        "Product",
        &[("$filter", "Price gt 100"), ("$orderby", "Price desc"), ("$top", "3")],
    );
    let binder = RecordingBinder::default();
    let base = settings();
    let ignored = AllowedQueryOptions::of(&[QueryOptionKind::Filter, QueryOptionKind::OrderBy]);

    let applied = opts
        .apply_to_with_ignored(products(10), &binder, &base, ignored)
        .unwrap();

    assert_eq!(applied.query.len(), 3);
    assert!(binder.steps().iter().all(|s| !s.starts_with("filter") && !s.starts_with("orderby")));
    assert!(base.ignored_query_options.is_empty());
}

#[test]
fn skip_token_sees_stable_order() {
    let mut opts = options("Product", &[("$skiptoken", "Id:3"), ("$top", "2")]);
    let binder = RecordingBinder::default();

    let applied = opts.apply_to(products(10), &binder, &settings()).unwrap();

    assert_eq!(ids(applied.query), vec![4, 5]);
    assert!(binder.steps().contains(&"skiptoken(orderby=Id)".to_owned()));
}

#[test]
fn auto_select_joins_explicit_select() {
    let mut opts = options("Product", &[("$select", "Name")]);
    let binder = RecordingBinder::default();

    opts.apply_to(products(2), &binder, &settings()).unwrap();

    assert_eq!(
        binder.steps(),
        vec!["select_expand(select=[Sku,Name], expand=[])"]
    );
    let merged = opts.select_expand().unwrap();
    assert_eq!(merged.raw_select(), Some("Sku,Name"));
    assert_eq!(merged.levels_max_literal_expansion_depth(), 2);
}

#[test]
fn partially_ignored_select_expand_keeps_other_half() {
    let mut opts = options("Product", &[("$select", "Name"), ("$expand", "Reviews")]);
    let binder = RecordingBinder::default();
    let query_settings = QuerySettings {
        ignored_query_options: QueryOptionKind::Select.into(),
        ..settings()
    };

    opts.apply_to(products(2), &binder, &query_settings).unwrap();

    assert_eq!(
        binder.steps(),
        vec!["select_expand(select=[], expand=[Reviews])"]
    );
}

#[test]
fn single_entity_rejects_collection_options() {
    let mut opts = options("Product", &[("$select", "Name"), ("$top", "1")]);
    let binder = EchoEntityBinder;

    let product = common::Product {
        id: 1,
        name: "a".into(),
        price: 1.0,
    };
    let err = opts.apply_to_entity(product, &binder, &settings()).unwrap_err();

    assert!(matches!(err, ODataError::InvalidOperation(ref m) if m.contains("$top")));
}

#[test]
fn single_entity_projection_goes_through_binder() {
    let mut opts = options("Product", &[("$select", "Name")]);
    let entity = common::Product {
        id: 7,
        name: "seven".into(),
        price: 7.0,
    };

    let projected = opts.apply_to_entity(entity, &EchoEntityBinder, &settings()).unwrap();

    assert_eq!(projected.name, "Sku,Name");
}

struct EchoEntityBinder;

impl odata_compose::EntityBinder<common::Product> for EchoEntityBinder {
    fn bind_select_expand(
        &self,
        mut entity: common::Product,
        clause: &odata_compose::parser::SelectExpandClause,
        _settings: &QuerySettings,
    ) -> odata_compose::Result<common::Product> {
        entity.name = clause
            .selected()
            .iter()
            .map(odata_compose::parser::SelectItem::path)
            .collect::<Vec<_>>()
            .join(",");
        Ok(entity)
    }
}
