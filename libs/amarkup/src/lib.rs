//! Parse HTML-like template markup into a plain node tree.
//!
//! The parser never fails: anything it can't make sense of is kept as
//! text. Output of `parse_markup` is always a single synthetic root
//! element holding the parsed nodes.

pub mod attributes;
pub mod parser;

use std::{borrow::Cow, collections::HashSet};

use kstring::KString;
use lazy_static::lazy_static;

pub use attributes::Attributes;
pub use parser::parse_markup;

/// Tag name of the element that `parse_markup` wraps around its
/// input. Can't clash with a real tag since `#` is not a valid tag
/// name character.
pub const SYNTHETIC_ROOT_TAG: &str = "#root";

lazy_static! {
    // https://html.spec.whatwg.org/multipage/syntax.html#void-elements
    static ref VOID_ELEMENTS: HashSet<&'static str> = [
        "area", "base", "br", "col", "embed", "hr", "img", "input",
        "link", "meta", "param", "source", "track", "wbr",
    ].into_iter().collect();

    // Elements whose content is not parsed for tags.
    static ref RAW_TEXT_ELEMENTS: HashSet<&'static str> = [
        "script", "style", "textarea", "title",
    ].into_iter().collect();
}

/// Whether `tag` never has a closing tag (and hence no children).
pub fn is_void_element(tag: &str) -> bool {
    VOID_ELEMENTS.contains(tag.to_ascii_lowercase().as_str())
}

pub fn is_raw_text_element(tag: &str) -> bool {
    RAW_TEXT_ELEMENTS.contains(tag.to_ascii_lowercase().as_str())
}


#[derive(Debug, Clone, PartialEq)]
pub struct DomElement {
    pub tag: KString,
    pub attributes: Attributes,
    pub children: Vec<DomNode>,
}

impl DomElement {
    pub fn new(tag: &str) -> Self {
        DomElement {
            tag: KString::from_ref(tag),
            attributes: Attributes::new(),
            children: Vec::new(),
        }
    }

    pub fn is_synthetic_root(&self) -> bool {
        self.tag.as_str() == SYNTHETIC_ROOT_TAG
    }

    /// Concatenation of all text below this element, for tests and
    /// diagnostics.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        for child in &self.children {
            child.push_text_content(&mut out);
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DomNode {
    Element(DomElement),
    Text(KString),
    /// The comment body, without `<!--` and `-->`.
    Comment(KString),
    /// `<!DOCTYPE ...>` and other `<!...>` forms, kept verbatim.
    Declaration(KString),
    /// `<?...?>`, kept verbatim.
    ProcessingInstruction(KString),
}

impl DomNode {
    pub fn as_element(&self) -> Option<&DomElement> {
        match self {
            DomNode::Element(e) => Some(e),
            _ => None
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            DomNode::Text(s) => Some(s.as_str()),
            _ => None
        }
    }

    fn push_text_content(&self, out: &mut String) {
        match self {
            DomNode::Element(e) =>
                for child in &e.children {
                    child.push_text_content(out);
                },
            DomNode::Text(s) => out.push_str(s),
            DomNode::Comment(_)
                | DomNode::Declaration(_)
                | DomNode::ProcessingInstruction(_) => (),
        }
    }
}


/// Escape text for inclusion in HTML element content or attribute
/// values.
pub fn html_escape(s: &str) -> String {
    let mut buf = String::with_capacity(s.len() + 8);
    for c in s.chars() {
        match c {
            '&' => buf.push_str("&amp;"),
            '<' => buf.push_str("&lt;"),
            '>' => buf.push_str("&gt;"),
            '"' => buf.push_str("&quot;"),
            '\'' => buf.push_str("&#39;"),
            _ => buf.push(c)
        }
    }
    buf
}

/// Attribute values coming from templates are already HTML (entities
/// are not decoded by the parser), hence only the quote delimiting
/// the value needs escaping.
pub fn escape_attribute_value(s: &str) -> Cow<str> {
    if s.contains('"') {
        Cow::Owned(s.replace('"', "&quot;"))
    } else {
        Cow::Borrowed(s)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn t_html_escape() {
        assert_eq!(html_escape("a < b & \"c\""), "a &lt; b &amp; &quot;c&quot;");
        assert_eq!(html_escape("it's"), "it&#39;s");
        assert_eq!(html_escape("plain"), "plain");
    }

    #[test]
    fn t_escape_attribute_value() {
        assert_eq!(escape_attribute_value("a &amp; b"), "a &amp; b");
        assert_eq!(escape_attribute_value("say \"hi\""), "say &quot;hi&quot;");
    }

    #[test]
    fn t_void_elements() {
        assert!(is_void_element("br"));
        assert!(is_void_element("IMG"));
        assert!(!is_void_element("div"));
        assert!(is_raw_text_element("Script"));
    }
}
