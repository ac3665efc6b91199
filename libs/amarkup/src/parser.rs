//! A forgiving parser for HTML-like markup.
//!
//! Elements are built on a stack of open frames; closing tags pop
//! frames up to the matching open element, anything still open at
//! the end of input is closed implicitly. Some start tags also end an
//! open sibling (`<li>` after `<li>`, a block element after `<p>`).
//! Fragments that don't form
//! a tag (a lone `<`, a tag cut off by the end of input, an
//! unterminated comment) are kept as text.

use std::collections::HashSet;

use kstring::KString;
use lazy_static::lazy_static;

use crate::{Attributes, DomElement, DomNode, SYNTHETIC_ROOT_TAG,
            is_raw_text_element, is_void_element};


struct Frame {
    tag: KString,
    attributes: Attributes,
    children: Vec<DomNode>,
}

impl Frame {
    fn into_element(self) -> DomElement {
        DomElement {
            tag: self.tag,
            attributes: self.attributes,
            children: self.children,
        }
    }
}

struct StartTag<'s> {
    name: &'s str,
    attributes: Attributes,
    self_closing: bool,
    /// Number of bytes the tag takes up in the input.
    len: usize,
}


lazy_static! {
    // Start tags that end an open `<p>`.
    static ref CLOSES_P: HashSet<&'static str> = [
        "address", "article", "aside", "blockquote", "details", "div", "dl",
        "fieldset", "figcaption", "figure", "footer", "form", "h1", "h2",
        "h3", "h4", "h5", "h6", "header", "hr", "main", "nav", "ol", "p",
        "pre", "section", "table", "ul",
    ].into_iter().collect();
}

/// Whether an open `open` element ends when a `next` start tag
/// follows inside it.
fn is_implicitly_closed(open: &str, next: &str) -> bool {
    let next = next.to_ascii_lowercase();
    let next = next.as_str();
    match open.to_ascii_lowercase().as_str() {
        "li" => next == "li",
        "dt" | "dd" => matches!(next, "dt" | "dd"),
        "option" => matches!(next, "option" | "optgroup"),
        "tr" => next == "tr",
        "td" | "th" => matches!(next, "td" | "th" | "tr"),
        "p" => CLOSES_P.contains(next),
        _ => false
    }
}

fn is_tag_name_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b':' | b'.')
}

fn is_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r' | b'\x0c')
}

fn skip_space(bytes: &[u8], i: &mut usize) {
    while *i < bytes.len() && is_space(bytes[*i]) {
        *i += 1;
    }
}

/// Parse `<name attr=... >` at the start of `s`. Returns None if the
/// tag isn't terminated.
fn parse_start_tag(s: &str) -> Option<StartTag> {
    let bytes = s.as_bytes();
    let mut i = 1;
    while i < bytes.len() && is_tag_name_char(bytes[i]) {
        i += 1;
    }
    let name = &s[1..i];
    let mut attributes = Attributes::new();
    let self_closing;
    loop {
        skip_space(bytes, &mut i);
        if i >= bytes.len() {
            return None
        }
        match bytes[i] {
            b'>' => {
                self_closing = false;
                i += 1;
                break
            }
            b'/' => {
                if bytes.get(i + 1) == Some(&b'>') {
                    self_closing = true;
                    i += 2;
                    break
                }
                i += 1;
            }
            _ => {
                let start = i;
                while i < bytes.len()
                    && !is_space(bytes[i])
                    && !matches!(bytes[i], b'/' | b'>' | b'=' | b'<')
                {
                    i += 1;
                }
                if i == start {
                    // '=' or '<' where a name should be; skip it
                    i += 1;
                    continue
                }
                let attname = &s[start..i];
                let save = i;
                skip_space(bytes, &mut i);
                let value = if bytes.get(i) == Some(&b'=') {
                    i += 1;
                    skip_space(bytes, &mut i);
                    match bytes.get(i) {
                        None => return None,
                        Some(q @ (b'"' | b'\'')) => {
                            let vstart = i + 1;
                            let vlen = s[vstart..].find(*q as char)?;
                            i = vstart + vlen + 1;
                            Some(&s[vstart..vstart + vlen])
                        }
                        Some(_) => {
                            let vstart = i;
                            while i < bytes.len()
                                && !is_space(bytes[i])
                                && bytes[i] != b'>'
                            {
                                i += 1;
                            }
                            Some(&s[vstart..i])
                        }
                    }
                } else {
                    i = save;
                    None
                };
                attributes.push_if_absent(attname, value);
            }
        }
    }
    Some(StartTag { name, attributes, self_closing, len: i })
}

/// Parse `</name>` at the start of `s`, returning the name and the
/// length of the tag.
fn parse_end_tag(s: &str) -> Option<(&str, usize)> {
    let bytes = s.as_bytes();
    let mut i = 2;
    while i < bytes.len() && is_tag_name_char(bytes[i]) {
        i += 1;
    }
    if i == 2 {
        return None
    }
    let name = &s[2..i];
    skip_space(bytes, &mut i);
    if bytes.get(i) == Some(&b'>') {
        Some((name, i + 1))
    } else {
        None
    }
}


struct Parser<'s> {
    input: &'s str,
    pos: usize,
    /// Open elements; index 0 is the synthetic root and is never
    /// popped before `finish`.
    stack: Vec<Frame>,
}

impl<'s> Parser<'s> {
    fn new(input: &'s str) -> Self {
        Parser {
            input,
            pos: 0,
            stack: vec![Frame {
                tag: KString::from_static(SYNTHETIC_ROOT_TAG),
                attributes: Attributes::new(),
                children: Vec::new(),
            }],
        }
    }

    fn current(&mut self) -> &mut Frame {
        let i = self.stack.len() - 1;
        &mut self.stack[i]
    }

    fn push_node(&mut self, node: DomNode) {
        self.current().children.push(node);
    }

    /// Append text, merging with a preceding text node.
    fn push_text(&mut self, s: &str) {
        if s.is_empty() {
            return
        }
        let children = &mut self.current().children;
        if let Some(DomNode::Text(prev)) = children.last_mut() {
            let mut joined = String::with_capacity(prev.len() + s.len());
            joined.push_str(prev);
            joined.push_str(s);
            *prev = KString::from_string(joined);
        } else {
            children.push(DomNode::Text(KString::from_ref(s)));
        }
    }

    /// Keep the rest of the input as text.
    fn rest_as_text(&mut self) {
        let rest = &self.input[self.pos..];
        self.push_text(rest);
        self.pos = self.input.len();
    }

    fn pop_frame(&mut self) {
        if self.stack.len() > 1 {
            if let Some(frame) = self.stack.pop() {
                self.push_node(DomNode::Element(frame.into_element()));
            }
        }
    }

    fn close(&mut self, name: &str) {
        let found = self.stack.iter().rposition(
            |frame| frame.tag.eq_ignore_ascii_case(name));
        match found {
            Some(i) if i > 0 => {
                while self.stack.len() > i {
                    self.pop_frame();
                }
            }
            // stray closing tag
            _ => ()
        }
    }

    fn open(&mut self, tag: StartTag) {
        while self.stack.len() > 1
            && is_implicitly_closed(&self.current().tag, tag.name)
        {
            self.pop_frame();
        }
        let frame = Frame {
            tag: KString::from_ref(tag.name),
            attributes: tag.attributes,
            children: Vec::new(),
        };
        if tag.self_closing || is_void_element(tag.name) {
            self.push_node(DomNode::Element(frame.into_element()));
        } else if is_raw_text_element(tag.name) {
            self.stack.push(frame);
            self.raw_text(tag.name);
        } else {
            self.stack.push(frame);
        }
    }

    /// Consume the content of a raw text element, up to and including
    /// its closing tag.
    fn raw_text(&mut self, name: &str) {
        let rest = &self.input[self.pos..];
        let needle = format!("</{}", name.to_ascii_lowercase());
        // ASCII lowercasing keeps byte offsets intact
        let lowered = rest.to_ascii_lowercase();
        let mut search_from = 0;
        while let Some(found) = lowered[search_from..].find(&needle) {
            let at = search_from + found;
            if let Some((_, len)) = parse_end_tag(&rest[at..]) {
                self.push_text(&rest[..at]);
                self.pos += at + len;
                self.pop_frame();
                return
            }
            search_from = at + needle.len();
        }
        // unterminated: everything is content
        self.rest_as_text();
        self.pop_frame();
    }

    fn run(&mut self) {
        while self.pos < self.input.len() {
            let rest = &self.input[self.pos..];
            let bytes = rest.as_bytes();
            if rest.starts_with("<!--") {
                match rest[4..].find("-->") {
                    Some(end) => {
                        self.push_node(DomNode::Comment(KString::from_ref(&rest[4..4 + end])));
                        self.pos += 4 + end + 3;
                    }
                    None => self.rest_as_text()
                }
            } else if rest.starts_with("</") {
                match parse_end_tag(rest) {
                    Some((name, len)) => {
                        self.close(name);
                        self.pos += len;
                    }
                    None => {
                        self.push_text("</");
                        self.pos += 2;
                    }
                }
            } else if rest.starts_with("<!") {
                match rest.find('>') {
                    Some(end) => {
                        self.push_node(DomNode::Declaration(KString::from_ref(&rest[..end + 1])));
                        self.pos += end + 1;
                    }
                    None => self.rest_as_text()
                }
            } else if rest.starts_with("<?") {
                match rest.find("?>") {
                    Some(end) => {
                        self.push_node(DomNode::ProcessingInstruction(
                            KString::from_ref(&rest[..end + 2])));
                        self.pos += end + 2;
                    }
                    None => self.rest_as_text()
                }
            } else if bytes[0] == b'<' && bytes.len() > 1 && bytes[1].is_ascii_alphabetic() {
                match parse_start_tag(rest) {
                    Some(tag) => {
                        self.pos += tag.len;
                        self.open(tag);
                    }
                    None => self.rest_as_text()
                }
            } else {
                // text up to the next '<' (a '<' at the start that
                // didn't open anything counts as text)
                let end = rest[1..].find('<').map(|i| i + 1).unwrap_or(rest.len());
                self.push_text(&rest[..end]);
                self.pos += end;
            }
        }
    }

    fn finish(mut self) -> DomElement {
        while self.stack.len() > 1 {
            self.pop_frame();
        }
        match self.stack.pop() {
            Some(root) => root.into_element(),
            None => DomElement::new(SYNTHETIC_ROOT_TAG)
        }
    }
}

/// Parse `input` into a tree below a synthetic root element (see
/// `SYNTHETIC_ROOT_TAG`). Never fails.
pub fn parse_markup(input: &str) -> DomElement {
    let mut parser = Parser::new(input);
    parser.run();
    parser.finish()
}
