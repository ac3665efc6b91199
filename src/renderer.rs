use std::{borrow::Cow, fmt::Write, sync::Arc};

use amarkup::{DomNode, escape_attribute_value, html_escape, is_void_element, parse_markup};
use itertools::Itertools;

use crate::{attribute::{AttributeFactory, AttributeResolver},
            component::ViewComponent,
            config::{AppConfig, ViewConfig},
            discovery::resolve_template_path,
            easy_fs::read_file,
            element::{Element, GenericElement, SlotElement, TextElement},
            element_factory::ElementFactory,
            error::ViewError,
            expression::{Evaluator, ExpressionEvaluator, Scope, value_to_string},
            placeholder::{interpolate, slot_marker, substitute_slots},
            slot::{Slot, Slots},
            view::View};

/// Renders views to HTML. Holds no per-render state, one instance can
/// serve any number of renders, also in parallel.
pub struct ViewRenderer {
    app_config: Arc<AppConfig>,
    view_config: Arc<ViewConfig>,
    evaluator: Arc<dyn Evaluator>,
    element_factory: ElementFactory,
    attribute_factory: AttributeFactory,
}

impl ViewRenderer {
    pub fn new(app_config: AppConfig, view_config: ViewConfig) -> Self {
        let element_factory = ElementFactory::new(view_config.element_factory.clone());
        ViewRenderer {
            app_config: Arc::new(app_config),
            view_config: Arc::new(view_config),
            evaluator: Arc::new(ExpressionEvaluator::new()),
            element_factory,
            attribute_factory: AttributeFactory,
        }
    }

    /// Use another expression language.
    pub fn with_evaluator(mut self, evaluator: Arc<dyn Evaluator>) -> Self {
        self.evaluator = evaluator;
        self
    }

    pub fn app_config(&self) -> &AppConfig {
        &self.app_config
    }

    pub fn view_config(&self) -> &ViewConfig {
        &self.view_config
    }

    pub fn evaluator(&self) -> &dyn Evaluator {
        &*self.evaluator
    }

    /// Render `view`; `None` renders as the empty string.
    pub fn render(&self, view: Option<&dyn View>) -> Result<String, ViewError> {
        let view = match view {
            Some(view) => view,
            None => return Ok(String::new())
        };
        let content = self.resolve_content(view)?;
        self.render_markup(view, &content, None)
    }

    /// Render the markup of a component template. Slot elements in it
    /// whose slot is in `slots` are rendered as slot markers, to be
    /// replaced by the caller.
    pub fn render_component_markup(
        &self,
        view: &dyn View,
        markup: &str,
        slots: &Slots,
    ) -> Result<String, ViewError> {
        self.render_markup(view, markup, Some(slots))
    }

    /// Render a single, already resolved element.
    pub fn render_element(&self, view: &dyn View, element: &Element) -> Result<String, ViewError> {
        RenderContext { renderer: self, view, component_slots: None }.render_element(element)
    }

    fn resolve_content<'v>(&self, view: &'v dyn View) -> Result<Cow<'v, str>, ViewError> {
        let path = view.path();
        if !path.ends_with(self.view_config.template_suffix.as_str()) {
            return Ok(Cow::Borrowed(path))
        }
        let file = resolve_template_path(path, &self.app_config.discovery_locations)?;
        trace!("view {:?}: loading {:?}", path, file);
        Ok(Cow::Owned(read_file(&file)?))
    }

    fn render_markup(
        &self,
        view: &dyn View,
        markup: &str,
        component_slots: Option<&Slots>,
    ) -> Result<String, ViewError> {
        let root = self.element_factory.make(view, &DomNode::Element(parse_markup(markup)));
        let root = AttributeResolver::new(&self.attribute_factory, view, &*self.evaluator)
            .resolve(root)?;
        let ctx = RenderContext { renderer: self, view, component_slots };
        let out = ctx.render_all(root.children(), "")?;
        Ok(out.trim().to_string())
    }
}


/// State of one render pass.
pub struct RenderContext<'a> {
    renderer: &'a ViewRenderer,
    view: &'a dyn View,
    /// Set while rendering a component template: the slots the
    /// invocation supplied.
    component_slots: Option<&'a Slots>,
}

fn refers_to_this(expr: &str) -> bool {
    match expr.strip_prefix("$this") {
        Some(rest) => !rest.starts_with(|c: char| c.is_ascii_alphanumeric() || c == '_'),
        None => false
    }
}

impl<'a> RenderContext<'a> {
    fn slot_tag(&self) -> &str {
        &self.renderer.view_config.element_factory.slot_tag
    }

    pub fn render_element(&self, element: &Element) -> Result<String, ViewError> {
        match element {
            Element::Text(e) => self.render_text(e),
            Element::Empty => Ok(String::new()),
            Element::Slot(e) => self.render_slot(e),
            Element::Collection(e) => self.render_all(&e.elements, "\n"),
            Element::Generic(e) =>
                match self.renderer.view_config.components.resolve(&e.tag)? {
                    Some(component) => self.render_component(component.as_ref(), e),
                    None => self.render_generic(e),
                },
        }
    }

    fn render_all(&self, elements: &[Element], separator: &str) -> Result<String, ViewError> {
        itertools::process_results(
            elements.iter().map(|e| self.render_element(e)),
            |mut rendered| rendered.join(separator))
    }

    fn render_text(&self, e: &TextElement) -> Result<String, ViewError> {
        let evaluator = self.renderer.evaluator();
        let escape = self.renderer.view_config.escape_interpolations;
        interpolate(&e.text, |expr| {
            let result = if refers_to_this(expr) {
                self.view.eval(expr, &e.data, evaluator)
            } else {
                evaluator.eval(expr, &Scope::new(None, &e.data))
            };
            let value = result.map_err(|err| ViewError::expression(expr, err))?;
            if value.is_null() {
                trace!("view {:?}: {:?} is unresolved, rendering as empty string",
                       self.view.path(), expr);
            }
            let s = value_to_string(&value);
            Ok(if escape { html_escape(&s) } else { s })
        })
    }

    fn render_slot(&self, e: &SlotElement) -> Result<String, ViewError> {
        match self.component_slots {
            Some(supplied) =>
                if supplied.contains_key(e.name.as_str()) || e.children.is_empty() {
                    Ok(slot_marker(self.slot_tag(), &e.name))
                } else {
                    self.render_all(&e.children, "\n")
                },
            None => self.render_all(&e.children, "\n"),
        }
    }

    /// Render a slot passed to a component invocation. A slot element
    /// with children renders them as its content; without children it
    /// forwards the enclosing component's slot of the same name.
    pub(crate) fn render_slot_content(&self, element: &Element) -> Result<String, ViewError> {
        match element {
            Element::Slot(e) if !e.children.is_empty() => self.render_all(&e.children, "\n"),
            Element::Collection(c) => itertools::process_results(
                c.elements.iter().map(|e| self.render_slot_content(e)),
                |mut rendered| rendered.join("\n")),
            _ => self.render_element(element),
        }
    }

    fn render_generic(&self, e: &GenericElement) -> Result<String, ViewError> {
        let mut out = String::new();
        let _ = write!(out, "<{}", e.tag);
        for (name, value) in e.attributes.iter() {
            match value {
                Some(v) => {
                    let _ = write!(out, " {}=\"{}\"", name, escape_attribute_value(v));
                }
                None => {
                    let _ = write!(out, " {}", name);
                }
            }
        }
        out.push('>');
        if is_void_element(&e.tag) {
            return Ok(out)
        }
        out.push_str(&self.render_all(&e.children, "")?);
        let _ = write!(out, "</{}>", e.tag);
        Ok(out)
    }

    /// Capture the slots from the invocation's children, run the
    /// component, and fill its slot markers.
    fn render_component(
        &self,
        component: &dyn ViewComponent,
        e: &GenericElement,
    ) -> Result<String, ViewError> {
        let mut slots = Slots::new();
        let mut add_slot = |slot: Slot| {
            if let Some(old) = slots.insert(slot.name.clone(), slot) {
                warn!("<{}> in view {:?}: duplicate slot {:?}, the last one wins",
                      e.tag, self.view.path(), old.name);
            }
        };
        let mut default = String::new();
        for child in &e.children {
            match Slot::from_element(child, self)? {
                Some(slot) => add_slot(slot),
                None => default.push_str(&self.render_element(child)?),
            }
        }
        if !default.trim().is_empty() {
            add_slot(Slot {
                name: Slot::DEFAULT.into(),
                attributes: Default::default(),
                content: default,
            });
        }

        let invocation = GenericElement {
            tag: e.tag.clone(),
            attributes: e.attributes.clone(),
            children: e.children.clone(),
            data: e.data.clone(),
            slots,
        };
        let output = component.render(&invocation, self.renderer)?;
        Ok(substitute_slots(&output, self.slot_tag(), |name| {
            invocation.slots.get(name).map(|slot| slot.content.as_str())
        }))
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use crate::{component::AnonymousViewComponent,
                config::DiscoveryLocation,
                view::GenericView};

    fn renderer() -> ViewRenderer {
        ViewRenderer::new(AppConfig::default(), ViewConfig::default())
    }

    fn render(view: GenericView) -> Result<String, ViewError> {
        renderer().render(Some(&view))
    }

    fn inline(markup: &str) -> GenericView {
        GenericView::new(markup)
    }

    fn card_renderer() -> ViewRenderer {
        let config = ViewConfig::default()
            .with_component("x-card", Arc::new(AnonymousViewComponent::new(
                "<div class=\"card\"><h1><x-slot name=\"header\">No title</x-slot></h1>\
                 <x-slot/><footer><x-slot name=\"footer\"/></footer></div>")));
        ViewRenderer::new(AppConfig::default(), config)
    }

    #[test]
    fn t_none_renders_empty() -> Result<(), ViewError> {
        assert_eq!(renderer().render(None)?, "");
        Ok(())
    }

    #[test]
    fn t_interpolation() -> Result<(), ViewError> {
        let view = inline("<p>Hello {{ $this->name }}</p>").with("name", "World");
        assert_eq!(render(view)?, "<p>Hello World</p>");
        let view = inline("Hello {{ $this->missing }}");
        assert_eq!(render(view)?, "Hello");
        let view = inline("<p>{{ missing }} {{$this->n}}</p>").with("n", 2);
        assert_eq!(render(view)?, "<p>{{ missing }} 2</p>");
        Ok(())
    }

    #[test]
    fn t_local_interpolation() -> Result<(), ViewError> {
        let mut text = TextElement::new("Hello {{ $name }}");
        text.data.insert("name".into(), json!("World"));
        let view = inline("");
        let r = renderer();
        assert_eq!(r.render_element(&view, &Element::Text(text))?, "Hello World");
        let text = TextElement::new("Hello {{ $missing }}");
        assert_eq!(r.render_element(&view, &Element::Text(text))?, "Hello ");
        Ok(())
    }

    #[test]
    fn t_escaping() -> Result<(), ViewError> {
        let view = inline("<p>{{ $this->html }}</p>").with("html", "<b>&</b>");
        assert_eq!(renderer().render(Some(&view))?, "<p><b>&</b></p>");
        let escaping = ViewRenderer::new(AppConfig::default(),
                                         ViewConfig::default().escape_interpolations(true));
        assert_eq!(escaping.render(Some(&view))?, "<p>&lt;b&gt;&amp;&lt;/b&gt;</p>");
        Ok(())
    }

    #[test]
    fn t_deterministic() -> Result<(), ViewError> {
        let view = inline("<ul class=\"a\" id=x><li>1</li><li data-a='q\"q'>2<br></li></ul>\n<!-- c -->");
        let r = renderer();
        let first = r.render(Some(&view))?;
        assert_eq!(first, "<ul class=\"a\" id=\"x\"><li>1</li><li data-a=\"q&quot;q\">2<br></li></ul>");
        assert_eq!(r.render(Some(&view))?, first);
        Ok(())
    }

    #[test]
    fn t_attribute_rewrite() -> Result<(), ViewError> {
        let markup = "<button :disabled=\"$this->disabled\">Go</button>";
        let view = inline(markup).with("disabled", false);
        assert_eq!(renderer().render(Some(&view))?, "<button>Go</button>");
        let view = inline(markup).with("disabled", true);
        assert_eq!(renderer().render(Some(&view))?, "<button disabled>Go</button>");
        Ok(())
    }

    #[test]
    fn t_loop() -> Result<(), ViewError> {
        let markup = "<ul><li :foreach=\"$this->items as $item\">{{ $item }}</li></ul>";
        let view = inline(markup).with("items", json!(["a", "b"]));
        assert_eq!(renderer().render(Some(&view))?, "<ul><li>a</li>\n<li>b</li></ul>");
        let view = inline(markup).with("items", json!([]));
        assert_eq!(renderer().render(Some(&view))?, "<ul></ul>");
        let view = inline("<ul><li :foreach=\"$this->keys as $k\" :title=\"$this->labels[$k]\">\
                           {{ $this->labels[$k] }}</li></ul>")
            .with("keys", json!(["a", "b"]))
            .with("labels", json!({"a": "Alpha", "b": "Beta"}));
        assert_eq!(renderer().render(Some(&view))?,
                   "<ul><li title=\"Alpha\">Alpha</li>\n<li title=\"Beta\">Beta</li></ul>");
        let view = inline("<p :foreach=\"$this->items as $item\">{{ $item }}</p>")
            .with("items", json!([]));
        assert_eq!(renderer().render(Some(&view))?, "");
        Ok(())
    }

    #[test]
    fn t_conditional() -> Result<(), ViewError> {
        let markup = "<a>1</a><b :if=\"$this->show\">2</b><c>3</c>";
        let view = inline(markup).with("show", false);
        assert_eq!(renderer().render(Some(&view))?, "<a>1</a><c>3</c>");
        let view = inline(markup).with("show", true);
        assert_eq!(renderer().render(Some(&view))?, "<a>1</a><b>2</b><c>3</c>");
        Ok(())
    }

    #[test]
    fn t_top_level_slot_renders_children() -> Result<(), ViewError> {
        let view = inline("<x-slot><i>a</i><i>b</i></x-slot>");
        assert_eq!(renderer().render(Some(&view))?, "<i>a</i>\n<i>b</i>");
        Ok(())
    }

    #[test]
    fn t_component_slots() -> Result<(), ViewError> {
        let view = inline(
            "<x-card><x-slot name=\"header\">Hi</x-slot><p>body</p></x-card>");
        let out = card_renderer().render(Some(&view))?;
        assert_eq!(out.matches("Hi").count(), 1);
        assert_eq!(out,
                   "<div class=\"card\"><h1>Hi</h1><p>body</p>\
                    <footer><x-slot name=\"footer\"/></footer></div>");
        Ok(())
    }

    #[test]
    fn t_component_fallback() -> Result<(), ViewError> {
        let view = inline("<x-card>  </x-card>");
        let out = card_renderer().render(Some(&view))?;
        assert_eq!(out,
                   "<div class=\"card\"><h1>No title</h1><x-slot/>\
                    <footer><x-slot name=\"footer\"/></footer></div>");
        Ok(())
    }

    #[test]
    fn t_component_attributes_and_loops() -> Result<(), ViewError> {
        let config = ViewConfig::default()
            .with_component("x-badge", Arc::new(AnonymousViewComponent::new(
                "<span :class=\"$this->kind\" :title=\"$this->label\"><x-slot/></span>")))
            .with_component("x-list", Arc::new(AnonymousViewComponent::new(
                "<ul><x-slot name=\"item\"/></ul>")));
        let r = ViewRenderer::new(AppConfig::default(), config);

        let view = inline("<x-badge kind=\"info\" :label=\"$this->l\" wide>new</x-badge>")
            .with("l", "Label");
        assert_eq!(r.render(Some(&view))?,
                   "<span class=\"info\" title=\"Label\">new</span>");

        let view = inline(
            "<x-list><x-slot name=\"item\" :foreach=\"$this->xs as $x\"><li>{{ $x }}</li></x-slot></x-list>")
            .with("xs", json!([1, 2]));
        assert_eq!(r.render(Some(&view))?, "<ul><li>1</li>\n<li>2</li></ul>");
        Ok(())
    }

    #[test]
    fn t_nested_components_forward_slots() -> Result<(), ViewError> {
        let config = ViewConfig::default()
            .with_component("x-inner", Arc::new(AnonymousViewComponent::new(
                "<section><x-slot/></section>")))
            .with_component("x-outer", Arc::new(AnonymousViewComponent::new(
                "<x-inner><b><x-slot/></b></x-inner>")));
        let r = ViewRenderer::new(AppConfig::default(), config);
        let view = inline("<x-outer>text</x-outer>");
        assert_eq!(r.render(Some(&view))?, "<section><b>text</b></section>");
        Ok(())
    }

    #[test]
    fn t_explicit_slot_content_in_component_template() -> Result<(), ViewError> {
        let config = ViewConfig::default()
            .with_component("x-inner", Arc::new(AnonymousViewComponent::new(
                "<div><x-slot name=\"title\"/></div>")))
            .with_component("x-outer", Arc::new(AnonymousViewComponent::new(
                "<header><x-slot name=\"title\"/></header>\
                 <x-inner><x-slot name=\"title\">Fixed</x-slot></x-inner>")));
        let r = ViewRenderer::new(AppConfig::default(), config);
        let view = inline("<x-outer><x-slot name=\"title\">Page</x-slot></x-outer>");
        assert_eq!(r.render(Some(&view))?, "<header>Page</header><div>Fixed</div>");
        Ok(())
    }

    #[test]
    fn t_forwarded_slot() -> Result<(), ViewError> {
        let config = ViewConfig::default()
            .with_component("x-inner", Arc::new(AnonymousViewComponent::new(
                "<div><x-slot name=\"title\"/></div>")))
            .with_component("x-outer", Arc::new(AnonymousViewComponent::new(
                "<x-inner><x-slot name=\"title\"/></x-inner>")));
        let r = ViewRenderer::new(AppConfig::default(), config);
        let view = inline("<x-outer><x-slot name=\"title\">Page</x-slot></x-outer>");
        assert_eq!(r.render(Some(&view))?, "<div>Page</div>");
        Ok(())
    }

    #[test]
    fn t_code_component() -> Result<(), ViewError> {
        let config = ViewConfig::default().with_component(
            "x-count",
            Arc::new(|e: &GenericElement, _: &ViewRenderer| -> Result<String, ViewError> {
                Ok(format!("<em>{}</em>:<x-slot/>", e.attribute("of").unwrap_or("?")))
            }));
        let r = ViewRenderer::new(AppConfig::default(), config);
        let view = inline("<x-count of=\"3\"><i>x</i></x-count>");
        assert_eq!(r.render(Some(&view))?, "<em>3</em>:<i>x</i>");
        Ok(())
    }

    #[test]
    fn t_duplicate_slot_last_wins() -> Result<(), ViewError> {
        let view = inline(
            "<x-card><x-slot name=\"header\">A</x-slot><x-slot name=\"header\">B</x-slot></x-card>");
        let out = card_renderer().render(Some(&view))?;
        assert!(out.contains("<h1>B</h1>"));
        assert!(!out.contains('A'));
        Ok(())
    }

    #[test]
    fn t_expression_error_aborts() {
        let view = inline("<p>{{ $this->a + }}</p>");
        assert!(matches!(renderer().render(Some(&view)), Err(ViewError::Expression { .. })));
    }

    #[test]
    fn t_file_view() -> anyhow::Result<()> {
        let a = tempfile::tempdir()?;
        let b = tempfile::tempdir()?;
        std::fs::create_dir(b.path().join("pages"))?;
        std::fs::write(b.path().join("pages/home.html"), "<h1>{{ $this->title }}</h1>\n")?;
        let app = AppConfig {
            discovery_locations: vec![
                DiscoveryLocation { path: a.path().into() },
                DiscoveryLocation { path: b.path().into() },
            ],
        };
        let r = ViewRenderer::new(app, ViewConfig::default());
        let view = GenericView::new("pages/home.html").with("title", "Home");
        assert_eq!(r.render(Some(&view))?, "<h1>Home</h1>");

        let missing = GenericView::new("pages/nope.html");
        assert!(matches!(r.render(Some(&missing)), Err(ViewError::ViewNotFound(_))));
        Ok(())
    }

    #[test]
    fn t_refers_to_this() {
        assert!(refers_to_this("$this"));
        assert!(refers_to_this("$this->x"));
        assert!(refers_to_this("$this['x']"));
        assert!(!refers_to_this("$thisone"));
        assert!(!refers_to_this("$x"));
    }

    #[test]
    fn t_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ViewRenderer>();
    }
}
