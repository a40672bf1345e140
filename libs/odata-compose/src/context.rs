//! Per-request binding of schema, target type, path and settings.

use std::fmt;
use std::sync::Arc;

use crate::config::{DefaultQueryConfig, ODataConfig, UriResolverConfig, ValidationSettings};
use crate::edm::{ModelBoundSettings, NavigationSource, SchemaModel, StructuredType};
use crate::errors::{ODataError, Result};
use crate::parser::{DefaultQueryParser, QueryParser};
use crate::path::ODataPath;

/// Immutable after construction; every option built for one request shares it.
pub struct QueryContext {
    model: Arc<dyn SchemaModel>,
    element_type: StructuredType,
    navigation_source: Option<NavigationSource>,
    target_settings: Option<ModelBoundSettings>,
    path: ODataPath,
    validation: ValidationSettings,
    defaults: DefaultQueryConfig,
    resolver: UriResolverConfig,
    parser: Arc<dyn QueryParser>,
}

impl fmt::Debug for QueryContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryContext")
            .field("element_type", &self.element_type.name)
            .field("navigation_source", &self.navigation_source.as_ref().map(|s| &s.name))
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl QueryContext {
    pub fn builder(
        model: Arc<dyn SchemaModel>,
        element_type: impl Into<String>,
    ) -> QueryContextBuilder {
        QueryContextBuilder {
            model,
            element_type: element_type.into(),
            navigation_source: None,
            target_property: None,
            path: ODataPath::default(),
            validation: ValidationSettings::default(),
            defaults: DefaultQueryConfig::default(),
            resolver: UriResolverConfig::default(),
            parser: Arc::new(DefaultQueryParser),
        }
    }

    #[must_use]
    pub fn model(&self) -> &dyn SchemaModel {
        self.model.as_ref()
    }

    #[must_use]
    pub fn element_type(&self) -> &StructuredType {
        &self.element_type
    }

    #[must_use]
    pub fn navigation_source(&self) -> Option<&NavigationSource> {
        self.navigation_source.as_ref()
    }

    #[must_use]
    pub fn path(&self) -> &ODataPath {
        &self.path
    }

    #[must_use]
    pub fn validation(&self) -> &ValidationSettings {
        &self.validation
    }

    #[must_use]
    pub fn defaults(&self) -> &DefaultQueryConfig {
        &self.defaults
    }

    #[must_use]
    pub fn resolver(&self) -> UriResolverConfig {
        self.resolver
    }

    #[must_use]
    pub fn parser(&self) -> &dyn QueryParser {
        self.parser.as_ref()
    }

    /// `$top` ceiling from the model: the containing property, then the type,
    /// then the server default.
    #[must_use]
    pub fn model_bound_max_top(&self) -> Option<u64> {
        self.target_settings
            .as_ref()
            .and_then(|s| s.max_top)
            .or(self.element_type.settings.max_top)
            .or(self.defaults.max_top)
    }

    #[must_use]
    pub fn model_bound_page_size(&self) -> Option<u64> {
        self.target_settings
            .as_ref()
            .and_then(|s| s.page_size)
            .or(self.element_type.settings.page_size)
    }

    #[must_use]
    pub fn is_countable(&self) -> bool {
        self.target_settings
            .as_ref()
            .and_then(|s| s.countable)
            .or(self.element_type.settings.countable)
            .unwrap_or(self.defaults.enable_count)
    }

    #[must_use]
    pub fn is_orderable(&self, property: &str) -> bool {
        self.property_flag(property, |s| s.orderable, self.defaults.enable_order_by)
    }

    #[must_use]
    pub fn is_filterable(&self, property: &str) -> bool {
        self.property_flag(property, |s| s.filterable, self.defaults.enable_filter)
    }

    #[must_use]
    pub fn is_selectable(&self, property: &str) -> bool {
        self.property_flag(property, |s| s.selectable, self.defaults.enable_select)
    }

    #[must_use]
    pub fn is_expandable(&self, property: &str) -> bool {
        self.property_flag(property, |s| s.expandable, self.defaults.enable_expand)
    }

    /// Property override, then the type, then the server default.
    /// Names the type does not declare only see the type and the default.
    fn property_flag(
        &self,
        property: &str,
        pick: impl Fn(&ModelBoundSettings) -> Option<bool>,
        fallback: bool,
    ) -> bool {
        let ci = self.resolver.enable_case_insensitive;
        let ty = &self.element_type;
        let own = ty
            .find_property(property, ci)
            .map(|p| &p.settings)
            .or_else(|| ty.find_navigation(property, ci).map(|n| &n.settings))
            .and_then(&pick);
        own.or_else(|| pick(&ty.settings)).unwrap_or(fallback)
    }
}

#[must_use]
pub struct QueryContextBuilder {
    model: Arc<dyn SchemaModel>,
    element_type: String,
    navigation_source: Option<String>,
    target_property: Option<(String, String)>,
    path: ODataPath,
    validation: ValidationSettings,
    defaults: DefaultQueryConfig,
    resolver: UriResolverConfig,
    parser: Arc<dyn QueryParser>,
}

impl QueryContextBuilder {
    pub fn navigation_source(mut self, name: impl Into<String>) -> Self {
        self.navigation_source = Some(name.into());
        self
    }

    pub fn path(mut self, path: ODataPath) -> Self {
        self.path = path;
        self
    }

    /// The navigation or collection property the request goes through
    /// (`declaring_type.property`); its model-bound settings take precedence.
    pub fn target_property(
        mut self,
        declaring_type: impl Into<String>,
        property: impl Into<String>,
    ) -> Self {
        self.target_property = Some((declaring_type.into(), property.into()));
        self
    }

    pub fn validation(mut self, validation: ValidationSettings) -> Self {
        self.validation = validation;
        self
    }

    pub fn defaults(mut self, defaults: DefaultQueryConfig) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn resolver(mut self, resolver: UriResolverConfig) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn parser(mut self, parser: Arc<dyn QueryParser>) -> Self {
        self.parser = parser;
        self
    }

    /// Take `defaults`, `validation` and `resolver` from a loaded config.
    pub fn config(self, config: &ODataConfig) -> Self {
        self.defaults(config.defaults.clone())
            .validation(config.validation.clone())
            .resolver(config.resolver)
    }

    /// # Errors
    /// Returns `ODataError::UnknownType` if the element type, the navigation
    /// source, or the target property's declaring type is not in the model.
    pub fn build(self) -> Result<Arc<QueryContext>> {
        let element_type = self
            .model
            .structured_type(&self.element_type)
            .cloned()
            .ok_or_else(|| ODataError::UnknownType(self.element_type.clone()))?;

        let navigation_source = match &self.navigation_source {
            Some(name) => Some(
                self.model
                    .navigation_source(name)
                    .cloned()
                    .ok_or_else(|| ODataError::UnknownType(name.clone()))?,
            ),
            None => None,
        };

        let target_settings = match &self.target_property {
            Some((declaring, property)) => {
                let ty = self
                    .model
                    .structured_type(declaring)
                    .ok_or_else(|| ODataError::UnknownType(declaring.clone()))?;
                let ci = self.resolver.enable_case_insensitive;
                ty.find_navigation(property, ci)
                    .map(|n| n.settings.clone())
                    .or_else(|| ty.find_property(property, ci).map(|p| p.settings.clone()))
            }
            None => None,
        };

        tracing::debug!(
            element_type = %element_type.name,
            navigation_source = ?navigation_source.as_ref().map(|s| &s.name),
            "query context built"
        );

        Ok(Arc::new(QueryContext {
            model: self.model,
            element_type,
            navigation_source,
            target_settings,
            path: self.path,
            validation: self.validation,
            defaults: self.defaults,
            resolver: self.resolver,
            parser: self.parser,
        }))
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::edm::{EdmModel, EdmPrimitiveKind};

    fn model() -> Arc<dyn SchemaModel> {
        Arc::new(
            EdmModel::new()
                .with_type(
                    StructuredType::entity("Customer")
                        .key("Id", EdmPrimitiveKind::Int32)
                        .property("Secret", EdmPrimitiveKind::String)
                        .property_settings(
                            "Secret",
                            ModelBoundSettings {
                                orderable: Some(false),
                                filterable: Some(false),
                                ..ModelBoundSettings::default()
                            },
                        )
                        .navigation("Orders", "Order", true)
                        .property_settings(
                            "Orders",
                            ModelBoundSettings {
                                max_top: Some(10),
                                countable: Some(false),
                                ..ModelBoundSettings::default()
                            },
                        ),
                )
                .with_type(
                    StructuredType::entity("Order")
                        .key("No", EdmPrimitiveKind::Int64)
                        .settings(ModelBoundSettings {
                            max_top: Some(100),
                            page_size: Some(20),
                            ..ModelBoundSettings::default()
                        }),
                )
                .with_entity_set("Customers", "Customer", &[]),
        )
    }

    #[test]
    fn unknown_element_type_fails() {
        let err = QueryContext::builder(model(), "Nope").build().unwrap_err();
        assert!(matches!(err, ODataError::UnknownType(ref n) if n == "Nope"));
    }

    #[test]
    fn unknown_navigation_source_fails() {
        let err = QueryContext::builder(model(), "Customer")
            .navigation_source("Missing")
            .build()
            .unwrap_err();
        assert!(matches!(err, ODataError::UnknownType(_)));
    }

    #[test]
    fn property_settings_override_type_settings() {
        let ctx = QueryContext::builder(model(), "Order")
            .target_property("Customer", "Orders")
            .build()
            .unwrap();
        assert_eq!(ctx.model_bound_max_top(), Some(10));
        assert_eq!(ctx.model_bound_page_size(), Some(20));
        assert!(!ctx.is_countable());

        let direct = QueryContext::builder(model(), "Order").build().unwrap();
        assert_eq!(direct.model_bound_max_top(), Some(100));
        assert!(direct.is_countable());
    }

    #[test]
    fn per_property_flags_fall_back_to_defaults() {
        let ctx = QueryContext::builder(model(), "Customer").build().unwrap();
        assert!(!ctx.is_orderable("Secret"));
        assert!(!ctx.is_filterable("Secret"));
        assert!(ctx.is_orderable("Id"));
        assert!(ctx.is_selectable("Secret"));

        let strict = QueryContext::builder(model(), "Customer")
            .defaults(DefaultQueryConfig {
                enable_order_by: false,
                ..DefaultQueryConfig::default()
            })
            .build()
            .unwrap();
        assert!(!strict.is_orderable("Id"));
    }
}
