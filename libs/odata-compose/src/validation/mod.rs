//! Request validation.
//!
//! Validation runs before composition and stops at the first failure. Options
//! are checked in a fixed order; each must be in the allow-list and then pass
//! its own validator.

mod limits;

pub use limits::{
    validate_count, validate_filter, validate_order_by, validate_select_expand, validate_skip,
    validate_skip_token, validate_top,
};

use crate::config::ValidationSettings;
use crate::errors::{Result, ValidationError};
use crate::kind::QueryOptionKind;
use crate::query_options::ODataQueryOptions;

fn ensure_allowed(settings: &ValidationSettings, option: QueryOptionKind) -> Result<()> {
    if settings.allowed_query_options.contains(option) {
        return Ok(());
    }
    tracing::debug!(option = %option, "query option rejected by allow-list");
    Err(ValidationError::NotAllowed { option }.into())
}

/// Validate every present option against `settings`.
///
/// # Errors
/// Returns the first `ODataError::Validation` found, or a parse failure of an
/// option that had to be parsed to be checked.
pub fn validate_query_options(
    options: &ODataQueryOptions,
    settings: &ValidationSettings,
) -> Result<()> {
    if options.compute().is_some() {
        ensure_allowed(settings, QueryOptionKind::Compute)?;
    }
    if options.apply().is_some() {
        ensure_allowed(settings, QueryOptionKind::Apply)?;
    }
    if let Some(skip) = options.skip() {
        ensure_allowed(settings, QueryOptionKind::Skip)?;
        validate_skip(skip, settings)?;
    }
    if let Some(top) = options.top() {
        ensure_allowed(settings, QueryOptionKind::Top)?;
        validate_top(top, settings)?;
    }
    if let Some(order_by) = options.order_by() {
        ensure_allowed(settings, QueryOptionKind::OrderBy)?;
        validate_order_by(order_by, settings)?;
    }
    if let Some(filter) = options.filter() {
        ensure_allowed(settings, QueryOptionKind::Filter)?;
        validate_filter(filter, settings)?;
    }
    if options.search().is_some() {
        ensure_allowed(settings, QueryOptionKind::Search)?;
    }
    if let Some(count) = options.count() {
        ensure_allowed(settings, QueryOptionKind::Count)?;
        validate_count(count)?;
    }
    if let Some(token) = options.skip_token() {
        ensure_allowed(settings, QueryOptionKind::SkipToken)?;
        validate_skip_token(token, options.context())?;
    }
    if options.is_present(QueryOptionKind::Expand) {
        ensure_allowed(settings, QueryOptionKind::Expand)?;
    }
    if options.is_present(QueryOptionKind::Select) {
        ensure_allowed(settings, QueryOptionKind::Select)?;
    }
    if let Some(select_expand) = options.select_expand() {
        validate_select_expand(select_expand, settings)?;
    }
    if options.is_present(QueryOptionKind::Format) {
        ensure_allowed(settings, QueryOptionKind::Format)?;
    }
    if options.is_present(QueryOptionKind::DeltaToken) {
        ensure_allowed(settings, QueryOptionKind::DeltaToken)?;
    }
    tracing::debug!("query options validated");
    Ok(())
}

impl ODataQueryOptions {
    /// Validate against the context's [`ValidationSettings`].
    ///
    /// # Errors
    /// See [`validate_query_options`].
    pub fn validate(&self) -> Result<()> {
        validate_query_options(self, self.context.validation())
    }

    /// Validate against explicit settings instead of the context's.
    ///
    /// # Errors
    /// See [`validate_query_options`].
    pub fn validate_with(&self, settings: &ValidationSettings) -> Result<()> {
        validate_query_options(self, settings)
    }
}
