//! View components: custom tags (`<x-card>`) whose rendering is
//! delegated to code or to a markup template.

use std::{collections::HashMap, fmt::Debug, path::PathBuf, sync::Arc};

use kstring::KString;
use serde_json::{Map, Value};

use crate::{element::GenericElement,
            error::ViewError,
            renderer::ViewRenderer,
            view::GenericView};

/// The output may contain slot markers (`<x-slot/>`,
/// `<x-slot name="..."/>`), which are replaced by the slots captured
/// from the invocation's children.
pub trait ViewComponent: Send + Sync {
    fn render(&self, element: &GenericElement, renderer: &ViewRenderer)
              -> Result<String, ViewError>;
}

impl<F> ViewComponent for F
where F: Fn(&GenericElement, &ViewRenderer) -> Result<String, ViewError> + Send + Sync
{
    fn render(&self, element: &GenericElement, renderer: &ViewRenderer)
              -> Result<String, ViewError> {
        self(element, renderer)
    }
}

/// Supplies component instances by type name.
pub trait ComponentFactory: Send + Sync {
    fn resolve(&self, type_ref: &str) -> Result<Arc<dyn ViewComponent>, ViewError>;
}

type Constructor = Box<dyn Fn() -> Arc<dyn ViewComponent> + Send + Sync>;

/// A `ComponentFactory` keyed by type name.
#[derive(Default)]
pub struct TypeMapFactory {
    constructors: HashMap<KString, Constructor>,
}

impl TypeMapFactory {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn register(
        mut self,
        type_ref: &str,
        constructor: impl Fn() -> Arc<dyn ViewComponent> + Send + Sync + 'static,
    ) -> Self {
        self.constructors.insert(KString::from_ref(type_ref), Box::new(constructor));
        self
    }
}

impl ComponentFactory for TypeMapFactory {
    fn resolve(&self, type_ref: &str) -> Result<Arc<dyn ViewComponent>, ViewError> {
        match self.constructors.get(type_ref) {
            Some(constructor) => Ok(constructor()),
            None => Err(ViewError::Other(anyhow::anyhow!(
                "no component type {type_ref:?} registered")))
        }
    }
}

impl Debug for TypeMapFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeMapFactory")
            .field("types", &self.constructors.keys().collect::<Vec<_>>())
            .finish()
    }
}


#[derive(Clone)]
pub enum ComponentEntry {
    Instance(Arc<dyn ViewComponent>),
    /// Resolved through the registry's `ComponentFactory` on use.
    Type(KString),
}

impl Debug for ComponentEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ComponentEntry::Instance(_) => write!(f, "Instance(..)"),
            ComponentEntry::Type(t) => write!(f, "Type({t:?})"),
        }
    }
}

/// Maps tag names to components. Lookup is exact and case-sensitive.
#[derive(Clone, Default)]
pub struct ComponentRegistry {
    entries: HashMap<KString, ComponentEntry>,
    factory: Option<Arc<dyn ComponentFactory>>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with_factory(mut self, factory: Arc<dyn ComponentFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Replaces an earlier registration for `tag`.
    pub fn register(&mut self, tag: &str, entry: ComponentEntry) {
        self.entries.insert(KString::from_ref(tag), entry);
    }

    pub fn register_instance(&mut self, tag: &str, component: Arc<dyn ViewComponent>) {
        self.register(tag, ComponentEntry::Instance(component))
    }

    pub fn register_type(&mut self, tag: &str, type_ref: &str) {
        self.register(tag, ComponentEntry::Type(KString::from_ref(type_ref)))
    }

    /// Register unless `tag` is taken already; returns whether it was
    /// added.
    pub fn register_if_absent(&mut self, tag: &str, entry: ComponentEntry) -> bool {
        if self.entries.contains_key(tag) {
            false
        } else {
            self.register(tag, entry);
            true
        }
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.entries.contains_key(tag)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The component for `tag`, or None if `tag` is a plain element.
    pub fn resolve(&self, tag: &str) -> Result<Option<Arc<dyn ViewComponent>>, ViewError> {
        match self.entries.get(tag) {
            None => Ok(None),
            Some(ComponentEntry::Instance(component)) => Ok(Some(component.clone())),
            Some(ComponentEntry::Type(type_ref)) => {
                let not_resolvable = |source: Option<Box<ViewError>>| ViewError::ComponentNotResolvable {
                    tag: tag.into(),
                    type_ref: type_ref.to_string(),
                    source,
                };
                let factory = self.factory.as_ref().ok_or_else(|| not_resolvable(None))?;
                factory.resolve(type_ref)
                    .map(Some)
                    .map_err(|e| not_resolvable(Some(Box::new(e))))
            }
        }
    }
}

impl Debug for ComponentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut tags: Vec<_> = self.entries.keys().map(|k| k.as_str()).collect();
        tags.sort();
        f.debug_struct("ComponentRegistry")
            .field("tags", &tags)
            .field("has_factory", &self.factory.is_some())
            .finish()
    }
}


/// A component defined by markup alone. The markup is rendered with
/// the invocation's attributes as `$this` data; slot elements in it
/// turn into the slots passed by the invocation, or render their own
/// content as fallback.
#[derive(Debug, Clone, PartialEq)]
pub struct AnonymousViewComponent {
    pub markup: String,
    /// The file the markup was read from, for diagnostics.
    pub file: Option<PathBuf>,
}

impl AnonymousViewComponent {
    pub fn new(markup: impl Into<String>) -> Self {
        AnonymousViewComponent { markup: markup.into(), file: None }
    }

    pub fn from_file(markup: String, file: PathBuf) -> Self {
        AnonymousViewComponent { markup, file: Some(file) }
    }

    fn view_path(&self) -> String {
        match &self.file {
            Some(file) => file.to_string_lossy().into_owned(),
            None => self.markup.clone(),
        }
    }
}

impl ViewComponent for AnonymousViewComponent {
    fn render(&self, element: &GenericElement, renderer: &ViewRenderer)
              -> Result<String, ViewError> {
        let mut data = Map::new();
        for (name, value) in element.attributes.iter() {
            data.insert(name.into(), match value {
                Some(v) => Value::String(v.into()),
                None => Value::Bool(true),
            });
        }
        let view = GenericView::new(self.view_path()).with_data(data);
        renderer.render_component_markup(&view, &self.markup, &element.slots)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn constant(s: &'static str) -> Arc<dyn ViewComponent> {
        Arc::new(move |_: &GenericElement, _: &ViewRenderer| -> Result<String, ViewError> {
            Ok(s.into())
        })
    }

    #[test]
    fn t_resolve_entries() -> Result<(), ViewError> {
        let factory = TypeMapFactory::new().register("Alert", || constant("alert"));
        let mut registry = ComponentRegistry::new().with_factory(Arc::new(factory));
        registry.register_instance("x-card", constant("card"));
        registry.register_type("x-alert", "Alert");
        registry.register_type("x-broken", "Nope");

        assert!(registry.resolve("x-card")?.is_some());
        assert!(registry.resolve("x-alert")?.is_some());
        assert!(registry.resolve("div")?.is_none());
        // case-sensitive
        assert!(registry.resolve("X-CARD")?.is_none());
        match registry.resolve("x-broken") {
            Err(ViewError::ComponentNotResolvable { tag, type_ref, source }) => {
                assert_eq!(tag, "x-broken");
                assert_eq!(type_ref, "Nope");
                let cause = source.map(|e| e.to_string());
                assert_eq!(cause.as_deref(), Some("no component type \"Nope\" registered"));
            }
            Err(e) => panic!("expected ComponentNotResolvable, got {e}"),
            Ok(_) => panic!("expected ComponentNotResolvable, got a component"),
        }
        Ok(())
    }

    #[test]
    fn t_type_without_factory() {
        let mut registry = ComponentRegistry::new();
        registry.register_type("x-alert", "Alert");
        assert!(matches!(registry.resolve("x-alert"),
                         Err(ViewError::ComponentNotResolvable { source: None, .. })));
    }

    #[test]
    fn t_register_if_absent() {
        let mut registry = ComponentRegistry::new();
        assert!(registry.register_if_absent("x-a", ComponentEntry::Type("A".into())));
        assert!(!registry.register_if_absent("x-a", ComponentEntry::Type("B".into())));
        assert_eq!(registry.len(), 1);
    }
}
