use std::collections::BTreeMap;

use amarkup::Attributes;
use kstring::KString;

use crate::{element::Element, error::ViewError, renderer::RenderContext};

pub type Slots = BTreeMap<KString, Slot>;

/// Content passed into a view component, already rendered.
#[derive(Debug, Clone, PartialEq)]
pub struct Slot {
    pub name: KString,
    pub attributes: Attributes,
    pub content: String,
}

impl Slot {
    pub const DEFAULT: &'static str = "default";

    /// Build a slot from a slot element or a named collection (a looped
    /// slot). Other elements give `None`.
    pub fn from_element(
        element: &Element,
        ctx: &RenderContext,
    ) -> Result<Option<Slot>, ViewError> {
        let (name, attributes) = match element {
            Element::Slot(e) => (e.name.clone(), &e.attributes),
            Element::Collection(e) => match &e.name {
                Some(name) => (name.clone(), &e.attributes),
                None => return Ok(None)
            },
            _ => return Ok(None)
        };
        Ok(Some(Slot {
            name,
            attributes: attributes.clone(),
            content: ctx.render_slot_content(element)?,
        }))
    }

    /// Attribute of the slot element; boolean attributes give `Some("")`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(|v| v.unwrap_or(""))
    }
}
