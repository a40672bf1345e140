//! Schema model consumed by the query layer.
//!
//! The query layer never builds models; it only asks a [`SchemaModel`] for key
//! properties, structural and navigation properties, auto-select/auto-expand
//! markers, model-bound query settings and concurrency properties.
//! [`EdmModel`] is an in-memory implementation assembled with a fluent builder.
//!
//! ```rust
//! use odata_compose::edm::{EdmModel, EdmPrimitiveKind, StructuredType};
//!
//! let model = EdmModel::new().with_type(
//!     StructuredType::entity("Product")
//!         .key("Id", EdmPrimitiveKind::Int32)
//!         .property("Name", EdmPrimitiveKind::String),
//! );
//! assert!(model.find_type("Product").is_some());
//! ```

use std::collections::BTreeMap;

/// Primitive EDM kinds relevant to ordering decisions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EdmPrimitiveKind {
    String,
    Boolean,
    Int16,
    Int32,
    Int64,
    Double,
    Decimal,
    Guid,
    DateTimeOffset,
    Date,
    TimeOfDay,
    Binary,
    Stream,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PropertyKind {
    Primitive(EdmPrimitiveKind),
    Complex(String),
    Enum(String),
    Collection(Box<PropertyKind>),
}

impl PropertyKind {
    /// True for primitive, non-stream properties (the ones a stable sort may use).
    #[must_use]
    pub fn is_sortable_primitive(&self) -> bool {
        matches!(self, PropertyKind::Primitive(k) if *k != EdmPrimitiveKind::Stream)
    }
}

/// Model-bound query settings attached to a type or a property.
///
/// `None` means "not configured here"; lookups fall back to the next level.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ModelBoundSettings {
    pub max_top: Option<u64>,
    pub page_size: Option<u64>,
    pub countable: Option<bool>,
    pub orderable: Option<bool>,
    pub filterable: Option<bool>,
    pub selectable: Option<bool>,
    pub expandable: Option<bool>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StructuralProperty {
    pub name: String,
    pub kind: PropertyKind,
    pub auto_select: bool,
    pub settings: ModelBoundSettings,
}

/// When a navigation property is expanded without being requested.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AutoExpand {
    #[default]
    Never,
    Always,
    /// Auto-expanded only when the request carries no `$select`.
    UnlessSelectPresent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NavigationProperty {
    pub name: String,
    pub target: String,
    pub collection: bool,
    pub auto_expand: AutoExpand,
    pub settings: ModelBoundSettings,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TypeKind {
    Entity,
    Complex,
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[must_use]
pub struct StructuredType {
    pub name: String,
    pub kind: TypeKind,
    /// Key property names in declaration order.
    pub keys: Vec<String>,
    pub properties: Vec<StructuralProperty>,
    pub navigation_properties: Vec<NavigationProperty>,
    pub open: bool,
    pub settings: ModelBoundSettings,
}

impl StructuredType {
    pub fn entity(name: impl Into<String>) -> Self {
        Self::with_kind(name, TypeKind::Entity)
    }

    pub fn complex(name: impl Into<String>) -> Self {
        Self::with_kind(name, TypeKind::Complex)
    }

    fn with_kind(name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            keys: Vec::new(),
            properties: Vec::new(),
            navigation_properties: Vec::new(),
            open: false,
            settings: ModelBoundSettings::default(),
        }
    }

    /// Declare a primitive key property (appended to the key in call order).
    pub fn key(mut self, name: impl Into<String>, kind: EdmPrimitiveKind) -> Self {
        let name = name.into();
        self.keys.push(name.clone());
        self.property(name, kind)
    }

    pub fn property(self, name: impl Into<String>, kind: EdmPrimitiveKind) -> Self {
        self.property_of(name, PropertyKind::Primitive(kind))
    }

    pub fn property_of(mut self, name: impl Into<String>, kind: PropertyKind) -> Self {
        self.properties.push(StructuralProperty {
            name: name.into(),
            kind,
            auto_select: false,
            settings: ModelBoundSettings::default(),
        });
        self
    }

    /// Mark the most recently declared structural property as auto-selected.
    pub fn auto_select(mut self) -> Self {
        if let Some(p) = self.properties.last_mut() {
            p.auto_select = true;
        }
        self
    }

    pub fn navigation(
        mut self,
        name: impl Into<String>,
        target: impl Into<String>,
        collection: bool,
    ) -> Self {
        self.navigation_properties.push(NavigationProperty {
            name: name.into(),
            target: target.into(),
            collection,
            auto_expand: AutoExpand::Never,
            settings: ModelBoundSettings::default(),
        });
        self
    }

    /// Set the auto-expand policy of the most recently declared navigation property.
    pub fn auto_expand(mut self, policy: AutoExpand) -> Self {
        if let Some(n) = self.navigation_properties.last_mut() {
            n.auto_expand = policy;
        }
        self
    }

    /// Replace the model-bound settings of the named structural or navigation property.
    pub fn property_settings(mut self, name: &str, settings: ModelBoundSettings) -> Self {
        if let Some(p) = self.properties.iter_mut().find(|p| p.name == name) {
            p.settings = settings;
        } else if let Some(n) = self
            .navigation_properties
            .iter_mut()
            .find(|n| n.name == name)
        {
            n.settings = settings;
        }
        self
    }

    pub fn open(mut self) -> Self {
        self.open = true;
        self
    }

    pub fn settings(mut self, settings: ModelBoundSettings) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn is_entity(&self) -> bool {
        self.kind == TypeKind::Entity
    }

    /// Find a structural property by name.
    #[must_use]
    pub fn find_property(&self, name: &str, case_insensitive: bool) -> Option<&StructuralProperty> {
        self.properties
            .iter()
            .find(|p| names_match(&p.name, name, case_insensitive))
    }

    /// Find a navigation property by name.
    #[must_use]
    pub fn find_navigation(
        &self,
        name: &str,
        case_insensitive: bool,
    ) -> Option<&NavigationProperty> {
        self.navigation_properties
            .iter()
            .find(|n| names_match(&n.name, name, case_insensitive))
    }

    /// Key properties, in declaration order.
    pub fn key_properties(&self) -> impl Iterator<Item = &StructuralProperty> {
        self.keys
            .iter()
            .filter_map(|k| self.properties.iter().find(|p| &p.name == k))
    }

    pub fn auto_select_properties(&self) -> impl Iterator<Item = &StructuralProperty> {
        self.properties.iter().filter(|p| p.auto_select)
    }

    /// Navigation properties that should be expanded without being asked for.
    pub fn auto_expand_navigations(
        &self,
        select_present: bool,
    ) -> impl Iterator<Item = &NavigationProperty> {
        self.navigation_properties
            .iter()
            .filter(move |n| match n.auto_expand {
                AutoExpand::Never => false,
                AutoExpand::Always => true,
                AutoExpand::UnlessSelectPresent => !select_present,
            })
    }
}

fn names_match(declared: &str, requested: &str, case_insensitive: bool) -> bool {
    if case_insensitive {
        declared.eq_ignore_ascii_case(requested)
    } else {
        declared == requested
    }
}

/// Entity set or singleton exposing a type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NavigationSource {
    pub name: String,
    pub entity_type: String,
    /// Properties participating in optimistic concurrency (`ETag`) checks.
    pub concurrency_properties: Vec<String>,
}

/// Read-only schema lookups the query layer depends on.
pub trait SchemaModel: Send + Sync {
    fn structured_type(&self, name: &str) -> Option<&StructuredType>;

    fn navigation_source(&self, name: &str) -> Option<&NavigationSource>;
}

/// In-memory [`SchemaModel`].
#[derive(Clone, Debug, Default)]
#[must_use]
pub struct EdmModel {
    types: BTreeMap<String, StructuredType>,
    sources: BTreeMap<String, NavigationSource>,
}

impl EdmModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_type(mut self, ty: StructuredType) -> Self {
        self.types.insert(ty.name.clone(), ty);
        self
    }

    pub fn with_entity_set(
        mut self,
        name: impl Into<String>,
        entity_type: impl Into<String>,
        concurrency_properties: &[&str],
    ) -> Self {
        let name = name.into();
        self.sources.insert(
            name.clone(),
            NavigationSource {
                name,
                entity_type: entity_type.into(),
                concurrency_properties: concurrency_properties
                    .iter()
                    .map(|s| (*s).to_owned())
                    .collect(),
            },
        );
        self
    }

    #[must_use]
    pub fn find_type(&self, name: &str) -> Option<&StructuredType> {
        self.types.get(name)
    }
}

impl SchemaModel for EdmModel {
    fn structured_type(&self, name: &str) -> Option<&StructuredType> {
        self.types.get(name)
    }

    fn navigation_source(&self, name: &str) -> Option<&NavigationSource> {
        self.sources.get(name)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn order_type() -> StructuredType {
        StructuredType::entity("Order")
            .key("CustomerId", EdmPrimitiveKind::Int32)
            .key("OrderNo", EdmPrimitiveKind::Int32)
            .property("Photo", EdmPrimitiveKind::Stream)
            .navigation("Lines", "OrderLine", true)
            .auto_expand(AutoExpand::UnlessSelectPresent)
            .navigation("Customer", "Customer", false)
            .auto_expand(AutoExpand::Always)
    }

    #[test]
    fn keys_keep_declaration_order() {
        let ty = order_type();
        let keys: Vec<_> = ty.key_properties().map(|p| p.name.as_str()).collect();
        assert_eq!(keys, vec!["CustomerId", "OrderNo"]);
    }

    #[test]
    fn stream_is_not_sortable() {
        let ty = order_type();
        let photo = ty.find_property("Photo", false).unwrap();
        assert!(!photo.kind.is_sortable_primitive());
    }

    #[test]
    fn auto_expand_respects_select_presence() {
        let ty = order_type();
        let without: Vec<_> = ty.auto_expand_navigations(false).map(|n| n.name.as_str()).collect();
        let with: Vec<_> = ty.auto_expand_navigations(true).map(|n| n.name.as_str()).collect();
        assert_eq!(without, vec!["Lines", "Customer"]);
        assert_eq!(with, vec!["Customer"]);
    }

    #[test]
    fn case_insensitive_lookup() {
        let ty = order_type();
        assert!(ty.find_property("orderno", false).is_none());
        assert!(ty.find_property("orderno", true).is_some());
        assert!(ty.find_navigation("LINES", true).is_some());
    }

    #[test]
    fn model_exposes_concurrency_properties() {
        let model = EdmModel::new()
            .with_type(order_type())
            .with_entity_set("Orders", "Order", &["OrderNo"]);
        let source = model.navigation_source("Orders").unwrap();
        assert_eq!(source.concurrency_properties, vec!["OrderNo".to_owned()]);
        assert!(model.structured_type("Order").is_some());
    }
}
