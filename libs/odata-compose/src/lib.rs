#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! `OData` system query options: extraction, parsing, validation and
//! composition onto a caller-supplied data source.
//!
//! A request flows through three steps:
//! 1. [`ODataQueryOptions::from_pairs`] extracts the recognized options from
//!    the decoded query string and binds them to a [`QueryContext`].
//! 2. [`ODataQueryOptions::validate`] checks them against the configured limits
//!    and allow-list.
//! 3. [`ODataQueryOptions::apply_to`] hands each parsed clause to a
//!    [`QueryBinder`] in a fixed order, synthesizing a stable `$orderby` when
//!    results are paged.

pub mod ast;
mod auto_expand;
mod compose;
pub mod config;
pub mod context;
pub mod edm;
pub mod errors;
pub mod extract;
pub mod kind;
pub mod options;
pub mod parser;
pub mod path;
pub mod problem_mapping;
pub mod query_options;
pub mod queryable;
pub mod result_limit;
pub mod stable_order;
pub mod validation;

pub use compose::AppliedQuery;
pub use config::{
    DefaultQueryConfig, NullPropagation, ODataConfig, QuerySettings, UriResolverConfig,
    ValidationSettings,
};
pub use context::{QueryContext, QueryContextBuilder};
pub use edm::{
    AutoExpand, EdmModel, EdmPrimitiveKind, ModelBoundSettings, NavigationSource, PropertyKind,
    SchemaModel, StructuredType,
};
pub use errors::{LimitKind, ODataError, Result, ValidationError};
pub use extract::{extract_query_options, is_system_query_option};
pub use kind::{AllowedQueryOptions, QueryOptionKind};
pub use path::{ODataPath, PathSegment};
pub use problem_mapping::Problem;
pub use query_options::{ODataQueryOptions, RawQueryOptions};
pub use queryable::{EntityBinder, QueryBinder, Queryable, VecQueryable};
pub use result_limit::{LimitedQuery, limit_results};
pub use stable_order::{
    StableOrder, available_order_by_properties, ensure_stable_sort_order_by,
    generate_default_order_by,
};
pub use validation::validate_query_options;
