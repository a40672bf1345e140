//! Typed view over all query options of one request.
//!
//! ```rust
//! use std::sync::Arc;
//! use odata_compose::{
//!     EdmModel, EdmPrimitiveKind, ODataQueryOptions, QueryContext, StructuredType,
//! };
//!
//! let model = Arc::new(EdmModel::new().with_type(
//!     StructuredType::entity("Product")
//!         .key("Id", EdmPrimitiveKind::Int32)
//!         .property("Price", EdmPrimitiveKind::Decimal),
//! ));
//! let ctx = QueryContext::builder(model, "Product").build()?;
//! let options = ODataQueryOptions::from_pairs([("$filter", "Price gt 10"), ("$top", "5")], ctx)?;
//! assert_eq!(options.top().map(|t| t.raw_value()), Some("5"));
//! # Ok::<(), odata_compose::ODataError>(())
//! ```

use std::cell::OnceCell;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::context::QueryContext;
use crate::errors::{Result, ValidationError};
use crate::extract::extract_query_options;
use crate::kind::QueryOptionKind;
use crate::options::{
    ApplyOption, ComputeOption, CountOption, FilterOption, OrderByOption, ParseEnv, SearchOption,
    SelectExpandOption, SkipOption, SkipTokenOption, TopOption,
};
use crate::stable_order::StableOrder;

/// Raw text of every recognized option, as received.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RawQueryOptions {
    pub filter: Option<String>,
    pub order_by: Option<String>,
    pub top: Option<String>,
    pub skip: Option<String>,
    pub count: Option<String>,
    pub expand: Option<String>,
    pub select: Option<String>,
    pub format: Option<String>,
    pub skip_token: Option<String>,
    pub delta_token: Option<String>,
    pub apply: Option<String>,
    pub compute: Option<String>,
    pub search: Option<String>,
}

impl RawQueryOptions {
    fn slot(&mut self, kind: QueryOptionKind) -> &mut Option<String> {
        match kind {
            QueryOptionKind::Filter => &mut self.filter,
            QueryOptionKind::OrderBy => &mut self.order_by,
            QueryOptionKind::Top => &mut self.top,
            QueryOptionKind::Skip => &mut self.skip,
            QueryOptionKind::Count => &mut self.count,
            QueryOptionKind::Expand => &mut self.expand,
            QueryOptionKind::Select => &mut self.select,
            QueryOptionKind::Format => &mut self.format,
            QueryOptionKind::SkipToken => &mut self.skip_token,
            QueryOptionKind::DeltaToken => &mut self.delta_token,
            QueryOptionKind::Apply => &mut self.apply,
            QueryOptionKind::Compute => &mut self.compute,
            QueryOptionKind::Search => &mut self.search,
        }
    }

    #[must_use]
    pub fn get(&self, kind: QueryOptionKind) -> Option<&str> {
        let value = match kind {
            QueryOptionKind::Filter => &self.filter,
            QueryOptionKind::OrderBy => &self.order_by,
            QueryOptionKind::Top => &self.top,
            QueryOptionKind::Skip => &self.skip,
            QueryOptionKind::Count => &self.count,
            QueryOptionKind::Expand => &self.expand,
            QueryOptionKind::Select => &self.select,
            QueryOptionKind::Format => &self.format,
            QueryOptionKind::SkipToken => &self.skip_token,
            QueryOptionKind::DeltaToken => &self.delta_token,
            QueryOptionKind::Apply => &self.apply,
            QueryOptionKind::Compute => &self.compute,
            QueryOptionKind::Search => &self.search,
        };
        value.as_deref()
    }
}

/// Options that must carry content; an empty value is a validation failure.
const REQUIRE_CONTENT: [QueryOptionKind; 10] = [
    QueryOptionKind::Filter,
    QueryOptionKind::OrderBy,
    QueryOptionKind::Top,
    QueryOptionKind::Skip,
    QueryOptionKind::Select,
    QueryOptionKind::Count,
    QueryOptionKind::Expand,
    QueryOptionKind::Apply,
    QueryOptionKind::Compute,
    QueryOptionKind::Search,
];

/// All query options of one request, bound to one [`QueryContext`].
#[derive(Debug)]
pub struct ODataQueryOptions {
    pub(crate) context: Arc<QueryContext>,
    pub(crate) raw: RawQueryOptions,
    pub(crate) env: ParseEnv,
    aliases: Arc<BTreeMap<String, String>>,
    pub(crate) filter: Option<FilterOption>,
    pub(crate) order_by: Option<OrderByOption>,
    pub(crate) top: Option<TopOption>,
    pub(crate) skip: Option<SkipOption>,
    pub(crate) count: Option<CountOption>,
    pub(crate) search: Option<SearchOption>,
    pub(crate) apply: Option<ApplyOption>,
    pub(crate) compute: Option<ComputeOption>,
    pub(crate) select_expand: Option<SelectExpandOption>,
    pub(crate) skip_token: Option<SkipTokenOption>,
    pub(crate) stable_order: OnceCell<Result<StableOrder>>,
}

impl ODataQueryOptions {
    /// Extract and build in one step from decoded query-string pairs.
    ///
    /// # Errors
    /// See [`ODataQueryOptions::new`].
    pub fn from_pairs<I, K, V>(pairs: I, context: Arc<QueryContext>) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let map = extract_query_options(pairs, &context.resolver());
        Self::new(&map, context)
    }

    /// Build typed options from an extracted option map.
    ///
    /// Keys are matched under the context's resolver policy; unrecognized names
    /// are ignored. On a `/$count` path a `$count=true` option is synthesized.
    ///
    /// # Errors
    /// Returns `ValidationError::EmptyValue` for an option that requires content
    /// but has none, and `ODataError::Argument` for an empty `$skiptoken`.
    pub fn new(map: &BTreeMap<String, String>, context: Arc<QueryContext>) -> Result<Self> {
        let resolver = context.resolver();
        let mut raw = RawQueryOptions::default();
        let mut aliases = BTreeMap::new();
        for (key, value) in map {
            if key.starts_with('@') {
                aliases.insert(key.clone(), value.clone());
                continue;
            }
            let Some(kind) = QueryOptionKind::resolve(key, &resolver) else {
                tracing::trace!(key = %key, "unrecognized query option ignored");
                continue;
            };
            if value.trim().is_empty() && REQUIRE_CONTENT.contains(&kind) {
                return Err(ValidationError::EmptyValue { option: kind }.into());
            }
            *raw.slot(kind) = Some(value.clone());
        }

        let aliases = Arc::new(aliases);
        let env = ParseEnv::new(Arc::clone(&aliases), raw.compute.clone(), raw.apply.clone());
        let ctx = &context;

        let filter = raw
            .filter
            .as_deref()
            .map(|v| FilterOption::with_env(v, Arc::clone(ctx), env.clone()))
            .transpose()?;
        let order_by = raw
            .order_by
            .as_deref()
            .map(|v| OrderByOption::with_env(v, Arc::clone(ctx), env.clone()))
            .transpose()?;
        let top = raw.top.as_deref().map(|v| TopOption::new(v, Arc::clone(ctx))).transpose()?;
        let skip = raw.skip.as_deref().map(|v| SkipOption::new(v, Arc::clone(ctx))).transpose()?;
        let search = raw
            .search
            .as_deref()
            .map(|v| SearchOption::new(v, Arc::clone(ctx)))
            .transpose()?;
        let apply = raw
            .apply
            .as_deref()
            .map(|v| ApplyOption::with_env(v, Arc::clone(ctx), env.clone()))
            .transpose()?;
        let compute = raw
            .compute
            .as_deref()
            .map(|v| ComputeOption::with_env(v, Arc::clone(ctx), env.clone()))
            .transpose()?;
        let skip_token = raw
            .skip_token
            .as_deref()
            .map(|v| SkipTokenOption::new(v, Arc::clone(ctx)))
            .transpose()?;
        let select_expand = if raw.select.is_some() || raw.expand.is_some() {
            Some(SelectExpandOption::with_env(
                raw.select.as_deref(),
                raw.expand.as_deref(),
                Arc::clone(ctx),
                env.clone(),
            )?)
        } else {
            None
        };
        let count = if context.path().is_count_request() {
            tracing::debug!("count segment in path, $count=true synthesized");
            Some(CountOption::new("true", Arc::clone(ctx))?)
        } else {
            raw.count
                .as_deref()
                .map(|v| CountOption::new(v, Arc::clone(ctx)))
                .transpose()?
        };

        Ok(Self {
            context,
            raw,
            env,
            aliases,
            filter,
            order_by,
            top,
            skip,
            count,
            search,
            apply,
            compute,
            select_expand,
            skip_token,
            stable_order: OnceCell::new(),
        })
    }

    #[must_use]
    pub fn context(&self) -> &Arc<QueryContext> {
        &self.context
    }

    #[must_use]
    pub fn raw_values(&self) -> &RawQueryOptions {
        &self.raw
    }

    /// Parameter aliases (`@name`) received with the request.
    #[must_use]
    pub fn aliases(&self) -> &BTreeMap<String, String> {
        &self.aliases
    }

    #[must_use]
    pub fn filter(&self) -> Option<&FilterOption> {
        self.filter.as_ref()
    }

    #[must_use]
    pub fn order_by(&self) -> Option<&OrderByOption> {
        self.order_by.as_ref()
    }

    #[must_use]
    pub fn top(&self) -> Option<&TopOption> {
        self.top.as_ref()
    }

    #[must_use]
    pub fn skip(&self) -> Option<&SkipOption> {
        self.skip.as_ref()
    }

    #[must_use]
    pub fn count(&self) -> Option<&CountOption> {
        self.count.as_ref()
    }

    #[must_use]
    pub fn search(&self) -> Option<&SearchOption> {
        self.search.as_ref()
    }

    #[must_use]
    pub fn apply(&self) -> Option<&ApplyOption> {
        self.apply.as_ref()
    }

    #[must_use]
    pub fn compute(&self) -> Option<&ComputeOption> {
        self.compute.as_ref()
    }

    #[must_use]
    pub fn select_expand(&self) -> Option<&SelectExpandOption> {
        self.select_expand.as_ref()
    }

    #[must_use]
    pub fn skip_token(&self) -> Option<&SkipTokenOption> {
        self.skip_token.as_ref()
    }

    /// True if the option was received (or synthesized, for `$count`).
    #[must_use]
    pub fn is_present(&self, kind: QueryOptionKind) -> bool {
        match kind {
            QueryOptionKind::Filter => self.filter.is_some(),
            QueryOptionKind::OrderBy => self.order_by.is_some(),
            QueryOptionKind::Top => self.top.is_some(),
            QueryOptionKind::Skip => self.skip.is_some(),
            QueryOptionKind::Count => self.count.is_some(),
            QueryOptionKind::Search => self.search.is_some(),
            QueryOptionKind::Apply => self.apply.is_some(),
            QueryOptionKind::Compute => self.compute.is_some(),
            QueryOptionKind::SkipToken => self.skip_token.is_some(),
            QueryOptionKind::Select
            | QueryOptionKind::Expand
            | QueryOptionKind::Format
            | QueryOptionKind::DeltaToken => self.raw.get(kind).is_some(),
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::config::UriResolverConfig;
    use crate::edm::{EdmModel, EdmPrimitiveKind, StructuredType};
    use crate::errors::ODataError;
    use crate::path::{ODataPath, PathSegment};

    fn context(path: ODataPath) -> Arc<QueryContext> {
        let model = Arc::new(
            EdmModel::new().with_type(
                StructuredType::entity("Product")
                    .key("Id", EdmPrimitiveKind::Int32)
                    .property("Name", EdmPrimitiveKind::String),
            ),
        );
        QueryContext::builder(model, "Product").path(path).build().unwrap()
    }

    #[test]
    fn dispatches_recognized_options_and_ignores_others() {
        let options = ODataQueryOptions::from_pairs(
            [
                ("$filter", "Name eq 'a'"),
                ("$select", "Name"),
                ("$format", "json"),
                ("$unknown", "1"),
                ("@p", "5"),
            ],
            context(ODataPath::default()),
        )
        .unwrap();
        assert_eq!(options.filter().map(FilterOption::raw_value), Some("Name eq 'a'"));
        assert_eq!(
            options.select_expand().and_then(SelectExpandOption::raw_select),
            Some("Name")
        );
        assert_eq!(options.raw_values().format.as_deref(), Some("json"));
        assert_eq!(options.aliases().get("@p").map(String::as_str), Some("5"));
        assert!(options.is_present(QueryOptionKind::Format));
        assert!(!options.is_present(QueryOptionKind::Top));
    }

    #[test]
    fn case_insensitive_context_accepts_mixed_case_names() {
        let model = Arc::new(
            EdmModel::new().with_type(
                StructuredType::entity("Product")
                    .key("Id", EdmPrimitiveKind::Int32)
                    .property("Name", EdmPrimitiveKind::String),
            ),
        );
        let resolver = UriResolverConfig {
            enable_case_insensitive: true,
            ..UriResolverConfig::default()
        };
        let context = QueryContext::builder(model, "Product").resolver(resolver).build().unwrap();
        let pairs = [("$FILTER", "Name eq 'a'"), ("$Top", "3"), ("skip", "1")];
        let options = ODataQueryOptions::from_pairs(pairs, context).unwrap();
        assert_eq!(options.filter().map(FilterOption::raw_value), Some("Name eq 'a'"));
        assert!(options.is_present(QueryOptionKind::Top));
        assert!(!options.is_present(QueryOptionKind::Skip));
    }

    #[test]
    fn empty_value_is_a_validation_failure() {
        let err = ODataQueryOptions::from_pairs([("$top", "")], context(ODataPath::default()))
            .unwrap_err();
        assert_eq!(
            err.as_validation(),
            Some(&ValidationError::EmptyValue {
                option: QueryOptionKind::Top
            })
        );
    }

    #[test]
    fn empty_skip_token_is_an_argument_error() {
        let err = ODataQueryOptions::from_pairs([("$skiptoken", "")], context(ODataPath::default()))
            .unwrap_err();
        assert!(matches!(err, ODataError::Argument { name: "skiptoken" }));
    }

    #[test]
    fn count_path_synthesizes_count_option() {
        let path = ODataPath::entity_set("Products").push(PathSegment::Count);
        let options =
            ODataQueryOptions::from_pairs(Vec::<(&str, &str)>::new(), context(path)).unwrap();
        assert!(options.count().unwrap().value().unwrap());
        assert!(options.raw_values().count.is_none());
    }

    #[test]
    fn options_parse_lazily() {
        let options =
            ODataQueryOptions::from_pairs([("$orderby", "Missing")], context(ODataPath::default()))
                .unwrap();
        let err = options.order_by().unwrap().order_by_clause().unwrap_err();
        assert!(matches!(
            err,
            ODataError::Parse {
                option: QueryOptionKind::OrderBy,
                ..
            }
        ));
    }
}
