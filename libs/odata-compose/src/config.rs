//! Configuration records for query handling.
//!
//! Three records travel with a request:
//! - [`DefaultQueryConfig`]: server-wide feature switches, bound into the `QueryContext`.
//! - [`ValidationSettings`]: ceilings checked by validators before composition.
//! - [`QuerySettings`]: knobs read by the composition step (paging, stable order, ignore-set).
//!
//! [`UriResolverConfig`] carries name-resolution policy explicitly instead of
//! through any process-wide default.
//!
//! All records deserialize with serde defaults, so a partial config section is valid:
//!
//! ```yaml
//! odata:
//!   validation:
//!     max_top: 100
//!     allowed_query_options: [filter, orderby, top, skip]
//!   query:
//!     page_size: 50
//! ```

use std::path::Path;

use figment::Figment;
use figment::providers::{Env, Format, Yaml};
use serde::{Deserialize, Serialize};

use crate::errors::{ODataError, Result};
use crate::kind::AllowedQueryOptions;

/// Server-wide defaults that model-bound settings fall back to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
#[allow(clippy::struct_excessive_bools)]
pub struct DefaultQueryConfig {
    pub enable_filter: bool,
    pub enable_order_by: bool,
    pub enable_select: bool,
    pub enable_expand: bool,
    pub enable_count: bool,
    pub enable_skip_token: bool,
    /// Fallback `$top` ceiling when neither the property nor the type sets one.
    pub max_top: Option<u64>,
    /// Depth used for `$levels=max` once auto select/expand has been merged.
    pub max_expansion_depth: u32,
}

impl Default for DefaultQueryConfig {
    fn default() -> Self {
        Self {
            enable_filter: true,
            enable_order_by: true,
            enable_select: true,
            enable_expand: true,
            enable_count: true,
            enable_skip_token: true,
            max_top: None,
            max_expansion_depth: 2,
        }
    }
}

/// Ceilings enforced by the validators. Read-only during validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ValidationSettings {
    pub allowed_query_options: AllowedQueryOptions,
    pub max_top: Option<u64>,
    pub max_skip: Option<u64>,
    /// Zero disables the check.
    pub max_expansion_depth: u32,
    pub max_any_all_expression_depth: u32,
    pub max_node_count: u32,
    pub max_order_by_node_count: u32,
    /// Empty means every property may be used in `$orderby`.
    pub allowed_order_by_properties: Vec<String>,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            allowed_query_options: AllowedQueryOptions::SUPPORTED,
            max_top: None,
            max_skip: None,
            max_expansion_depth: 2,
            max_any_all_expression_depth: 1,
            max_node_count: 100,
            max_order_by_node_count: 5,
            allowed_order_by_properties: Vec::new(),
        }
    }
}

impl ValidationSettings {
    #[must_use]
    pub fn with_max_top(mut self, max_top: u64) -> Self {
        self.max_top = Some(max_top);
        self
    }

    #[must_use]
    pub fn with_max_skip(mut self, max_skip: u64) -> Self {
        self.max_skip = Some(max_skip);
        self
    }

    #[must_use]
    pub fn with_allowed(mut self, allowed: AllowedQueryOptions) -> Self {
        self.allowed_query_options = allowed;
        self
    }

    #[must_use]
    pub fn with_max_expansion_depth(mut self, depth: u32) -> Self {
        self.max_expansion_depth = depth;
        self
    }
}

/// How binders should treat null propagation in member access.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NullPropagation {
    #[default]
    Default,
    True,
    False,
}

/// Settings read by the composition step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QuerySettings {
    /// Synthesize a deterministic `$orderby` whenever results are paged.
    pub ensure_stable_ordering: bool,
    pub page_size: Option<u64>,
    /// Client `odata.maxpagesize` preference, already parsed by the host.
    pub preferred_max_page_size: Option<u64>,
    pub ignored_query_options: AllowedQueryOptions,
    pub handle_null_propagation: NullPropagation,
    pub enable_constant_parameterization: bool,
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            ensure_stable_ordering: true,
            page_size: None,
            preferred_max_page_size: None,
            ignored_query_options: AllowedQueryOptions::NONE,
            handle_null_propagation: NullPropagation::Default,
            enable_constant_parameterization: true,
        }
    }
}

impl QuerySettings {
    #[must_use]
    pub fn with_page_size(mut self, page_size: u64) -> Self {
        self.page_size = Some(page_size);
        self
    }
}

/// Name-resolution policy for query keys and property names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UriResolverConfig {
    /// Resolve property names ignoring ASCII case.
    pub enable_case_insensitive: bool,
    /// Accept `filter=` as well as `$filter=`; keys are then matched ignoring case.
    pub enable_no_dollar_query_options: bool,
}

/// Complete `odata` configuration section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ODataConfig {
    pub defaults: DefaultQueryConfig,
    pub validation: ValidationSettings,
    pub query: QuerySettings,
    pub resolver: UriResolverConfig,
}

impl ODataConfig {
    /// Extract the `odata` section from a host figment. A missing section yields defaults.
    ///
    /// # Errors
    /// Returns `ODataError::Config` if the section exists but does not deserialize.
    pub fn from_figment(figment: &Figment) -> Result<Self> {
        if !figment.contains("odata") {
            tracing::debug!("no 'odata' config section, using defaults");
            return Ok(Self::default());
        }
        figment
            .extract_inner::<Self>("odata")
            .map_err(|e| ODataError::Config(e.to_string()))
    }

    /// Load a standalone config file whose root is this record, then apply
    /// `ODATA__`-prefixed environment overrides (`ODATA__VALIDATION__MAX_TOP=50`).
    ///
    /// # Errors
    /// Returns `ODataError::Config` if the file or the environment overrides are invalid.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Figment::new()
            .merge(Yaml::file(path.as_ref()))
            .merge(Env::prefixed("ODATA__").split("__"))
            .extract::<Self>()
            .map_err(|e| ODataError::Config(e.to_string()))
    }
}
