//! Merge model-declared auto-select / auto-expand properties into the request.

use std::sync::Arc;

use crate::options::SelectExpandOption;
use crate::parser::split_top_level;
use crate::query_options::ODataQueryOptions;

/// Leading path of each top-level item (`Orders($top=1)` -> `Orders`).
fn item_paths(raw: &str) -> Vec<&str> {
    split_top_level(raw, ',')
        .into_iter()
        .map(|item| item.split('(').next().unwrap_or(item).trim())
        .filter(|p| !p.is_empty())
        .collect()
}

fn prepend(auto: &[String], raw: Option<&str>) -> Option<String> {
    match (auto.is_empty(), raw.filter(|r| !r.is_empty())) {
        (true, raw) => raw.map(str::to_owned),
        (false, None) => Some(auto.join(",")),
        (false, Some(raw)) => Some(format!("{},{raw}", auto.join(","))),
    }
}

impl ODataQueryOptions {
    /// Prepend the element type's auto-expanded navigation properties to
    /// `$expand` and, when `$select` is present, its auto-selected properties
    /// to `$select`. Names the request already lists are skipped.
    ///
    /// On change the select/expand option is rebuilt with
    /// `levels_max_literal_expansion_depth` set to the server's
    /// `max_expansion_depth`. Returns whether anything was added.
    ///
    /// # Errors
    /// Returns `ODataError::Argument` if the rebuilt option would be empty.
    pub fn add_auto_select_expand(&mut self) -> crate::Result<bool> {
        let ci = self.context.resolver().enable_case_insensitive;
        let same = |a: &str, b: &str| if ci { a.eq_ignore_ascii_case(b) } else { a == b };

        let raw_select = self.raw.select.as_deref().filter(|s| !s.is_empty());
        let raw_expand = self.raw.expand.as_deref().filter(|s| !s.is_empty());
        let user_select = raw_select.map(item_paths).unwrap_or_default();
        let user_expand = raw_expand.map(item_paths).unwrap_or_default();
        let ty = self.context.element_type();

        let auto_expand: Vec<String> = ty
            .auto_expand_navigations(raw_select.is_some())
            .map(|n| n.name.clone())
            .filter(|n| !user_expand.iter().any(|u| same(u, n)))
            .collect();
        let auto_select: Vec<String> = if raw_select.is_some() {
            ty.auto_select_properties()
                .map(|p| p.name.clone())
                .filter(|n| !user_select.iter().any(|u| same(u, n) || *u == "*"))
                .collect()
        } else {
            Vec::new()
        };

        if auto_expand.is_empty() && auto_select.is_empty() {
            return Ok(false);
        }

        let select = prepend(&auto_select, raw_select);
        let expand = prepend(&auto_expand, raw_expand);
        tracing::debug!(
            auto_select = ?auto_select,
            auto_expand = ?auto_expand,
            "auto select/expand properties merged"
        );

        let levels = self.context.defaults().max_expansion_depth;
        let option = SelectExpandOption::with_env(
            select.as_deref(),
            expand.as_deref(),
            Arc::clone(&self.context),
            self.env.clone(),
        )?
        .with_levels_max_literal_expansion_depth(levels);
        self.select_expand = Some(option);
        Ok(true)
    }
}
