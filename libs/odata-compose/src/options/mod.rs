//! Typed query options.
//!
//! Each option keeps its raw text and the shared [`QueryContext`], and parses
//! on first access through the context's parser. The parse result (success or
//! failure) is cached, so the parser runs at most once per option.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::context::QueryContext;
use crate::errors::{ODataError, Result};
use crate::parser::ParseScope;

mod apply;
mod compute;
mod count;
mod filter;
mod order_by;
mod search;
mod select_expand;
mod skip;
mod skip_token;
mod top;

pub use apply::ApplyOption;
pub use compute::ComputeOption;
pub use count::CountOption;
pub use filter::FilterOption;
pub use order_by::OrderByOption;
pub use search::SearchOption;
pub use select_expand::SelectExpandOption;
pub use skip::SkipOption;
pub use skip_token::SkipTokenOption;
pub use top::TopOption;

/// Request-wide inputs a parse depends on beyond the option's own text:
/// parameter aliases, and the sibling `$compute` / `$apply` strings whose
/// names later clauses may reference.
#[derive(Clone, Debug, Default)]
pub(crate) struct ParseEnv {
    aliases: Arc<BTreeMap<String, String>>,
    compute: Option<String>,
    apply: Option<String>,
}

impl ParseEnv {
    pub(crate) fn new(
        aliases: Arc<BTreeMap<String, String>>,
        compute: Option<String>,
        apply: Option<String>,
    ) -> Self {
        Self {
            aliases,
            compute,
            apply,
        }
    }

    /// Same aliases, no sibling options.
    pub(crate) fn aliases_only(&self) -> Self {
        Self {
            aliases: Arc::clone(&self.aliases),
            compute: None,
            apply: None,
        }
    }

    pub(crate) fn has_apply(&self) -> bool {
        self.apply.is_some()
    }

    pub(crate) fn with_apply(&self, apply: &str) -> Self {
        Self {
            aliases: Arc::clone(&self.aliases),
            compute: self.compute.clone(),
            apply: Some(apply.to_owned()),
        }
    }

    pub(crate) fn scope<'a>(&'a self, context: &'a QueryContext) -> Result<ParseScope<'a>> {
        let mut scope = ParseScope::new(
            context.model(),
            context.element_type(),
            context.resolver(),
            &self.aliases,
        );
        if let Some(raw) = &self.compute {
            let aliases = context.parser().parse_compute(raw, &scope)?.aliases();
            scope.compute_aliases = aliases;
        }
        if let Some(raw) = &self.apply {
            let names = context.parser().parse_apply(raw, &scope)?.result_names();
            scope.apply_names = names;
        }
        Ok(scope)
    }
}

pub(crate) fn require_raw(raw: impl Into<String>, name: &'static str) -> Result<String> {
    let raw = raw.into();
    if raw.is_empty() {
        return Err(ODataError::Argument { name });
    }
    Ok(raw)
}

/// Shared parse-once accessor over a cached `Result`.
pub(crate) fn cached<T>(
    cell: &std::cell::OnceCell<Result<T>>,
    parse: impl FnOnce() -> Result<T>,
) -> Result<&T> {
    cell.get_or_init(parse).as_ref().map_err(Clone::clone)
}
