//! The element tree that templates are turned into. Parsed markup is
//! classified by `ElementFactory`, rewritten by the attribute
//! resolver, then printed by `ViewRenderer`.

use amarkup::Attributes;
use kstring::KString;
use serde_json::Value;

use crate::{expression::Data, slot::Slots};

#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    Text(TextElement),
    /// Renders to nothing (comments, ignored tags, failed conditionals).
    Empty,
    Slot(SlotElement),
    Collection(CollectionElement),
    Generic(GenericElement),
}

/// Raw text, possibly with `{{ $expr }}` placeholders.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TextElement {
    pub text: String,
    pub data: Data,
}

/// `<x-slot name="...">fallback</x-slot>`
#[derive(Debug, Clone, PartialEq)]
pub struct SlotElement {
    pub name: KString,
    pub attributes: Attributes,
    pub children: Vec<Element>,
    pub data: Data,
}

/// The expansion of a loop.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CollectionElement {
    /// The slot name, if the looped element was a slot.
    pub name: Option<KString>,
    pub attributes: Attributes,
    pub elements: Vec<Element>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenericElement {
    pub tag: KString,
    pub attributes: Attributes,
    pub children: Vec<Element>,
    pub data: Data,
    /// Slots captured from the children, set when the element is
    /// handed to a view component.
    pub slots: Slots,
}

impl TextElement {
    pub fn new(text: impl Into<String>) -> Self {
        TextElement { text: text.into(), data: Data::new() }
    }
}

impl SlotElement {
    pub fn new(name: &str) -> Self {
        SlotElement {
            name: KString::from_ref(name),
            attributes: Attributes::new(),
            children: Vec::new(),
            data: Data::new(),
        }
    }
}

impl GenericElement {
    pub fn new(tag: &str) -> Self {
        GenericElement {
            tag: KString::from_ref(tag),
            attributes: Attributes::new(),
            children: Vec::new(),
            data: Data::new(),
            slots: Slots::new(),
        }
    }

    pub fn set_children(&mut self, children: Vec<Element>) {
        self.children = children;
    }

    /// Attribute value; boolean attributes give `Some("")`.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(|v| v.unwrap_or(""))
    }

    pub fn get_slot(&self, name: &str) -> Option<&crate::slot::Slot> {
        self.slots.get(name)
    }
}


impl Element {
    pub fn text(text: impl Into<String>) -> Self {
        Element::Text(TextElement::new(text))
    }

    /// Bind `key` on this element and all of its descendants.
    pub fn add_data(&mut self, key: &KString, value: &Value) {
        let children = match self {
            Element::Empty => return,
            Element::Text(e) => {
                e.data.insert(key.clone(), value.clone());
                return
            }
            Element::Slot(e) => {
                e.data.insert(key.clone(), value.clone());
                &mut e.children
            }
            Element::Generic(e) => {
                e.data.insert(key.clone(), value.clone());
                &mut e.children
            }
            Element::Collection(e) => &mut e.elements,
        };
        for child in children {
            child.add_data(key, value);
        }
    }

    /// The render-local bindings, for the variants that carry them.
    pub fn data(&self) -> Option<&Data> {
        match self {
            Element::Text(e) => Some(&e.data),
            Element::Slot(e) => Some(&e.data),
            Element::Generic(e) => Some(&e.data),
            Element::Empty | Element::Collection(_) => None,
        }
    }

    pub fn attributes(&self) -> Option<&Attributes> {
        match self {
            Element::Slot(e) => Some(&e.attributes),
            Element::Generic(e) => Some(&e.attributes),
            Element::Collection(e) => Some(&e.attributes),
            Element::Text(_) | Element::Empty => None,
        }
    }

    pub fn children(&self) -> &[Element] {
        match self {
            Element::Slot(e) => &e.children,
            Element::Generic(e) => &e.children,
            Element::Collection(e) => &e.elements,
            Element::Text(_) | Element::Empty => &[],
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Element::Empty)
    }

    /// Text consisting of whitespace only; doesn't break up chains of
    /// conditional siblings.
    pub fn is_whitespace_text(&self) -> bool {
        match self {
            Element::Text(e) => e.text.trim().is_empty(),
            _ => false
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn t_add_data_reaches_descendants() {
        let mut inner = GenericElement::new("span");
        inner.children.push(Element::text("{{ $item }}"));
        let mut slot = SlotElement::new("x");
        slot.children.push(Element::text("fallback"));
        let mut outer = GenericElement::new("li");
        outer.children = vec![Element::Generic(inner), Element::Slot(slot), Element::Empty];
        let mut el = Element::Collection(CollectionElement {
            elements: vec![Element::Generic(outer)],
            ..Default::default()
        });

        el.add_data(&KString::from_static("item"), &json!("a"));

        let li = &el.children()[0];
        assert_eq!(li.data().and_then(|d| d.get("item")), Some(&json!("a")));
        let span_text = &li.children()[0].children()[0];
        assert_eq!(span_text.data().and_then(|d| d.get("item")), Some(&json!("a")));
        let slot_text = &li.children()[1].children()[0];
        assert_eq!(slot_text.data().and_then(|d| d.get("item")), Some(&json!("a")));
    }

    #[test]
    fn t_whitespace_text() {
        assert!(Element::text(" \n\t").is_whitespace_text());
        assert!(!Element::text(" x ").is_whitespace_text());
        assert!(!Element::Empty.is_whitespace_text());
    }

    #[test]
    fn t_attribute() {
        let mut e = GenericElement::new("input");
        e.attributes.insert("disabled", None);
        e.attributes.insert("value", Some("3"));
        assert_eq!(e.attribute("disabled"), Some(""));
        assert_eq!(e.attribute("value"), Some("3"));
        assert_eq!(e.attribute("nope"), None);
    }
}
