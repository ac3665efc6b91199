//! Attribute directives.
//!
//! * `:if`, `:elseif`, `:else`: conditionals over a chain of siblings
//! * `:foreach="$xs as $x"` / `:foreach="$xs as $k => $x"`, with
//!   `:forelse` on the following sibling for the empty case
//! * `:name="expr"`: sets attribute `name` from an expression
//!
//! Anything else is a plain attribute and is left alone.

use amarkup::Attributes;
use kstring::KString;
use serde_json::Value;

use crate::{element::{CollectionElement, Element},
            error::ViewError,
            expression::{Data, EvalError, Evaluator, Scope, is_truthy, value_to_string},
            view::View};

/// A `:foreach` value taken apart.
#[derive(Debug, Clone, PartialEq)]
pub struct Foreach {
    pub expr: String,
    pub key: Option<KString>,
    pub item: KString,
}

fn variable_name(s: &str) -> Option<KString> {
    let name = s.trim().strip_prefix('$')?;
    if !name.is_empty()
        && name != "this"
        && name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
        && !name.as_bytes()[0].is_ascii_digit()
    {
        Some(KString::from_ref(name))
    } else {
        None
    }
}

impl Foreach {
    pub fn parse(value: &str) -> Result<Foreach, ViewError> {
        let invalid = |message: &str| ViewError::invalid_directive(":foreach", value, message);
        let i = value.rfind(" as ").ok_or_else(
            || invalid("expecting \"<expression> as $item\""))?;
        let expr = value[..i].trim();
        if expr.is_empty() {
            return Err(invalid("missing expression before 'as'"))
        }
        let binding = &value[i + 4..];
        let (key, item) = match binding.split_once("=>") {
            Some((key, item)) => (
                Some(variable_name(key).ok_or_else(|| invalid("invalid key variable"))?),
                item,
            ),
            None => (None, binding),
        };
        let item = variable_name(item).ok_or_else(|| invalid("invalid item variable"))?;
        Ok(Foreach { expr: expr.into(), key, item })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Attribute {
    If(String),
    ElseIf(String),
    Else,
    Foreach(Foreach),
    Forelse,
    /// `:name="expr"`; holds `name` without the colon.
    Bind {
        name: KString,
        expr: String,
    },
    Plain,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AttributeFactory;

impl AttributeFactory {
    pub fn make(&self, name: &str, value: Option<&str>) -> Result<Attribute, ViewError> {
        let directive = match name.strip_prefix(':') {
            Some(d) => d,
            None => return Ok(Attribute::Plain)
        };
        let expr = || -> Result<String, ViewError> {
            match value.map(str::trim) {
                Some(v) if !v.is_empty() => Ok(v.into()),
                _ => Err(ViewError::invalid_directive(name, value.unwrap_or(""),
                                                      "missing expression"))
            }
        };
        Ok(match directive {
            "if" => Attribute::If(expr()?),
            "elseif" => Attribute::ElseIf(expr()?),
            "else" => Attribute::Else,
            "foreach" => Attribute::Foreach(Foreach::parse(value.unwrap_or(""))?),
            "forelse" => Attribute::Forelse,
            "" => return Err(ViewError::invalid_directive(name, value.unwrap_or(""),
                                                          "missing attribute name")),
            _ => Attribute::Bind { name: KString::from_ref(directive), expr: expr()? },
        })
    }
}

fn is_conditional(name: &str) -> bool {
    matches!(name, ":if" | ":elseif" | ":else" | ":forelse")
}


/// Where the previous sibling left an `:if`/`:elseif` chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Branch {
    /// Not in a chain.
    #[default]
    None,
    /// In a chain, no branch taken yet.
    Open,
    Taken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopOutcome {
    #[default]
    None,
    Empty,
    NonEmpty,
}

/// What an element tells its next sibling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SiblingState {
    pub branch: Branch,
    pub loop_outcome: LoopOutcome,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Siblings {
    /// Left by the previous sibling.
    pub previous: SiblingState,
    /// Being set by the element the attribute is applied to.
    pub current: SiblingState,
}


fn attributes_mut(element: &mut Element) -> Option<&mut Attributes> {
    match element {
        Element::Generic(e) => Some(&mut e.attributes),
        Element::Slot(e) => Some(&mut e.attributes),
        _ => None
    }
}

fn remove_attribute(element: &mut Element, name: &str) {
    if let Some(atts) = attributes_mut(element) {
        atts.remove(name);
    }
}

fn is_resolvable(element: &Element) -> bool {
    matches!(element, Element::Generic(_) | Element::Slot(_))
}

impl Attribute {
    pub fn apply(
        &self,
        mut element: Element,
        resolver: &AttributeResolver,
        siblings: &mut Siblings,
    ) -> Result<Element, ViewError> {
        match self {
            Attribute::Plain => Ok(element),
            Attribute::If(expr) => {
                remove_attribute(&mut element, ":if");
                if is_truthy(&resolver.eval(&element, expr)?) {
                    siblings.current.branch = Branch::Taken;
                    Ok(element)
                } else {
                    siblings.current.branch = Branch::Open;
                    Ok(Element::Empty)
                }
            }
            Attribute::ElseIf(expr) => {
                remove_attribute(&mut element, ":elseif");
                match siblings.previous.branch {
                    Branch::None => Err(ViewError::invalid_directive(
                        ":elseif", expr, "not preceded by :if or :elseif")),
                    Branch::Taken => {
                        siblings.current.branch = Branch::Taken;
                        Ok(Element::Empty)
                    }
                    Branch::Open =>
                        if is_truthy(&resolver.eval(&element, expr)?) {
                            siblings.current.branch = Branch::Taken;
                            Ok(element)
                        } else {
                            siblings.current.branch = Branch::Open;
                            Ok(Element::Empty)
                        }
                }
            }
            Attribute::Else => {
                remove_attribute(&mut element, ":else");
                siblings.current.branch = Branch::None;
                match siblings.previous.branch {
                    Branch::None => Err(ViewError::invalid_directive(
                        ":else", "", "not preceded by :if or :elseif")),
                    Branch::Taken => Ok(Element::Empty),
                    Branch::Open => Ok(element),
                }
            }
            Attribute::Forelse => {
                remove_attribute(&mut element, ":forelse");
                match siblings.previous.loop_outcome {
                    LoopOutcome::None => Err(ViewError::invalid_directive(
                        ":forelse", "", "not preceded by :foreach")),
                    LoopOutcome::Empty => Ok(element),
                    LoopOutcome::NonEmpty => Ok(Element::Empty),
                }
            }
            Attribute::Foreach(foreach) => {
                remove_attribute(&mut element, ":foreach");
                let (collection, outcome) = resolver.expand_loop(element, foreach)?;
                siblings.current.loop_outcome = outcome;
                Ok(collection)
            }
            Attribute::Bind { name, expr } => {
                let value = resolver.eval(&element, expr)?;
                let source = format!(":{name}");
                if let Some(atts) = attributes_mut(&mut element) {
                    match value {
                        Value::Null | Value::Bool(false) => {
                            atts.remove(&source);
                            atts.remove(name);
                        }
                        Value::Bool(true) => atts.replace(&source, name.clone(), None),
                        v => atts.replace(&source, name.clone(),
                                          Some(KString::from_string(value_to_string(&v)))),
                    }
                }
                Ok(element)
            }
        }
    }
}


/// Applies the attributes of a whole element tree, children before
/// their parents. Loops are the exception: they are expanded before
/// anything inside them is resolved, so that the loop variables are
/// visible to nested directives.
pub struct AttributeResolver<'a> {
    factory: &'a AttributeFactory,
    view: &'a dyn View,
    evaluator: &'a dyn Evaluator,
}

impl<'a> AttributeResolver<'a> {
    pub fn new(
        factory: &'a AttributeFactory,
        view: &'a dyn View,
        evaluator: &'a dyn Evaluator,
    ) -> Self {
        AttributeResolver { factory, view, evaluator }
    }

    /// Evaluate `expr` with `$this` bound to the view and the
    /// element's render-local bindings as variables.
    pub fn eval(&self, element: &Element, expr: &str) -> Result<Value, ViewError> {
        let empty = Data::new();
        let locals = element.data().unwrap_or(&empty);
        self.evaluator.eval(expr, &Scope::new(Some(self.view.data()), locals))
            .map_err(|e| ViewError::expression(expr, e))
    }

    pub fn resolve(&self, element: Element) -> Result<Element, ViewError> {
        Ok(self.resolve_element(element, SiblingState::default())?.0)
    }

    fn apply_named(
        &self,
        element: Element,
        name: &str,
        siblings: &mut Siblings,
    ) -> Result<Element, ViewError> {
        let value = match element.attributes().and_then(|atts| atts.get(name)) {
            Some(value) => value.map(KString::from_ref),
            // removed by an earlier attribute
            None => return Ok(element)
        };
        let attribute = self.factory.make(name, value.as_deref())?;
        attribute.apply(element, self, siblings)
    }

    fn resolve_element(
        &self,
        element: Element,
        previous: SiblingState,
    ) -> Result<(Element, SiblingState), ViewError> {
        let names = match &element {
            Element::Generic(e) => e.attributes.names(),
            Element::Slot(e) => e.attributes.names(),
            _ => return Ok((element, SiblingState::default()))
        };
        let mut siblings = Siblings { previous, current: SiblingState::default() };

        if names.iter().any(|n| n.as_str() == ":foreach") {
            let element = self.apply_named(element, ":foreach", &mut siblings)?;
            return Ok((element, siblings.current))
        }

        // Conditionals go first so that the content of a dropped
        // element is never looked at.
        let mut element = element;
        for name in names.iter().filter(|n| is_conditional(n)) {
            element = self.apply_named(element, name, &mut siblings)?;
            if !is_resolvable(&element) {
                return Ok((element, siblings.current))
            }
        }

        match &mut element {
            Element::Generic(e) => {
                let children = std::mem::take(&mut e.children);
                e.set_children(self.resolve_children(children)?);
            }
            Element::Slot(e) => {
                let children = std::mem::take(&mut e.children);
                e.children = self.resolve_children(children)?;
            }
            _ => ()
        }

        for name in names.iter().filter(|n| !is_conditional(n)) {
            if !is_resolvable(&element) {
                break
            }
            element = self.apply_named(element, name, &mut siblings)?;
        }
        Ok((element, siblings.current))
    }

    fn resolve_children(&self, children: Vec<Element>) -> Result<Vec<Element>, ViewError> {
        let mut resolved = Vec::with_capacity(children.len());
        let mut previous = SiblingState::default();
        for child in children {
            // whitespace and comments don't interrupt sibling chains
            if child.is_whitespace_text() || child.is_empty() {
                resolved.push(child);
                continue
            }
            let (child, state) = self.resolve_element(child, previous)?;
            previous = state;
            resolved.push(child);
        }
        Ok(resolved)
    }

    /// Clone `element` once per item, bind the loop variables on each
    /// clone and resolve it.
    fn expand_loop(
        &self,
        element: Element,
        foreach: &Foreach,
    ) -> Result<(Element, LoopOutcome), ViewError> {
        let items: Vec<(Value, Value)> = match self.eval(&element, &foreach.expr)? {
            Value::Array(items) => items.into_iter().enumerate()
                .map(|(i, v)| (Value::from(i), v))
                .collect(),
            Value::Object(map) => map.into_iter()
                .map(|(k, v)| (Value::String(k), v))
                .collect(),
            Value::Null => {
                trace!("view {:?}: :foreach over null ({:?}), no iterations",
                       self.view.path(), foreach.expr);
                Vec::new()
            }
            other => return Err(ViewError::expression(
                &foreach.expr,
                EvalError::Type(format!("can't iterate over {other}")))),
        };
        let outcome = if items.is_empty() {
            LoopOutcome::Empty
        } else {
            LoopOutcome::NonEmpty
        };

        let name = match &element {
            Element::Slot(e) => Some(e.name.clone()),
            _ => None
        };
        let mut attributes = Attributes::new();
        if let Some(atts) = element.attributes() {
            for (k, v) in atts.iter().filter(|(k, _)| !k.starts_with(':')) {
                attributes.insert(k, v);
            }
        }

        let mut elements = Vec::with_capacity(items.len());
        for (key, item) in items {
            let mut clone = element.clone();
            if let Some(k) = &foreach.key {
                clone.add_data(k, &key);
            }
            clone.add_data(&foreach.item, &item);
            elements.push(self.resolve_element(clone, SiblingState::default())?.0);
        }
        Ok((Element::Collection(CollectionElement { name, attributes, elements }), outcome))
    }
}
