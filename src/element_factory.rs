use amarkup::{Attributes, DomElement, DomNode};
use kstring::KString;
use serde::Deserialize;

use crate::{element::{Element, GenericElement, SlotElement, TextElement},
            expression::Data,
            slot::{Slot, Slots},
            view::View};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ElementFactoryConfig {
    /// Tag marking slots, both in templates and in component output.
    pub slot_tag: String,
    /// Tags dropped from the tree together with their content.
    pub ignore_tags: Vec<String>,
}

impl Default for ElementFactoryConfig {
    fn default() -> Self {
        ElementFactoryConfig {
            slot_tag: "x-slot".into(),
            ignore_tags: vec!["x-ignore".into()],
        }
    }
}

/// Turns parsed markup into `Element`s.
#[derive(Debug, Clone, Default)]
pub struct ElementFactory {
    config: ElementFactoryConfig,
}

impl ElementFactory {
    pub fn new(config: ElementFactoryConfig) -> Self {
        ElementFactory { config }
    }

    pub fn config(&self) -> &ElementFactoryConfig {
        &self.config
    }

    fn make_children(&self, view: &dyn View, nodes: &[DomNode]) -> Vec<Element> {
        nodes.iter().map(|node| self.make(view, node)).collect()
    }

    fn make_slot(&self, view: &dyn View, dom: &DomElement) -> Element {
        let mut attributes: Attributes = dom.attributes.clone();
        let name = match attributes.remove("name") {
            Some(Some(name)) if !name.is_empty() => name,
            _ => KString::from_static(Slot::DEFAULT),
        };
        Element::Slot(SlotElement {
            name,
            attributes,
            children: self.make_children(view, &dom.children),
            data: Data::new(),
        })
    }

    pub fn make(&self, view: &dyn View, node: &DomNode) -> Element {
        match node {
            DomNode::Text(text) => Element::Text(TextElement::new(text.as_str())),
            DomNode::Element(dom) => {
                if dom.tag.as_str() == self.config.slot_tag {
                    self.make_slot(view, dom)
                } else if self.config.ignore_tags.iter().any(|t| *t == dom.tag.as_str()) {
                    Element::Empty
                } else {
                    Element::Generic(GenericElement {
                        tag: dom.tag.clone(),
                        attributes: dom.attributes.clone(),
                        children: self.make_children(view, &dom.children),
                        data: Data::new(),
                        slots: Slots::new(),
                    })
                }
            }
            DomNode::Comment(_) => Element::Empty,
            DomNode::Declaration(raw) => Element::Text(TextElement::new(raw.as_str())),
            DomNode::ProcessingInstruction(raw) => {
                trace!("view {:?}: can't classify node {:?}, dropping it",
                       view.path(), raw.as_str());
                Element::Empty
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use amarkup::parse_markup;
    use crate::view::GenericView;

    fn make(markup: &str) -> Vec<Element> {
        let view = GenericView::new(markup);
        let root = parse_markup(markup);
        let factory = ElementFactory::default();
        root.children.iter().map(|n| factory.make(&view, n)).collect()
    }

    #[test]
    fn t_classification() {
        let elements = make(
            "<!DOCTYPE html>text<!-- c --><x-ignore><b>gone</b></x-ignore><?xml x?><div a=\"1\">in</div>");
        assert_eq!(elements.len(), 6);
        assert_eq!(elements[0], Element::text("<!DOCTYPE html>"));
        assert_eq!(elements[1], Element::text("text"));
        assert_eq!(elements[2], Element::Empty);
        assert_eq!(elements[3], Element::Empty);
        assert_eq!(elements[4], Element::Empty);
        match &elements[5] {
            Element::Generic(div) => {
                assert_eq!(div.tag.as_str(), "div");
                assert_eq!(div.attribute("a"), Some("1"));
                assert_eq!(div.children, vec![Element::text("in")]);
            }
            other => panic!("expected generic element, got {other:?}")
        }
    }

    #[test]
    fn t_slots() {
        let elements = make("<x-slot/><x-slot name=\"header\" class=\"h\"><b>dflt</b></x-slot>");
        match &elements[0] {
            Element::Slot(s) => {
                assert_eq!(s.name.as_str(), "default");
                assert!(s.children.is_empty());
            }
            other => panic!("expected slot, got {other:?}")
        }
        match &elements[1] {
            Element::Slot(s) => {
                assert_eq!(s.name.as_str(), "header");
                assert!(!s.attributes.contains("name"));
                assert_eq!(s.attributes.value("class"), Some("h"));
                assert!(matches!(&s.children[0], Element::Generic(b) if b.tag.as_str() == "b"));
            }
            other => panic!("expected slot, got {other:?}")
        }
    }

    #[test]
    fn t_configured_tags() {
        let view = GenericView::new("");
        let factory = ElementFactory::new(ElementFactoryConfig {
            slot_tag: "slot".into(),
            ignore_tags: vec!["noscript".into()],
        });
        let root = parse_markup("<slot name=\"a\"/><noscript>x</noscript><x-slot/>");
        let elements: Vec<_> = root.children.iter().map(|n| factory.make(&view, n)).collect();
        assert!(matches!(&elements[0], Element::Slot(s) if s.name.as_str() == "a"));
        assert_eq!(elements[1], Element::Empty);
        assert!(matches!(&elements[2], Element::Generic(_)));
    }
}
