//! Attribute maps that keep the order in which attributes were
//! written. Values are optional: `<input disabled>` has the attribute
//! `disabled` with no value.

use kstring::KString;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes(Vec<(KString, Option<KString>)>);

impl Attributes {
    pub fn new() -> Self {
        Attributes(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.0.iter().position(|(k, _)| k.as_str() == name)
    }

    /// Set `name` to `value`. If `name` is already present, its value
    /// is replaced in place (the position is kept) and the old value
    /// returned.
    pub fn insert_kstring(
        &mut self,
        name: KString,
        value: Option<KString>
    ) -> Option<Option<KString>> {
        if let Some(i) = self.position(&name) {
            Some(std::mem::replace(&mut self.0[i].1, value))
        } else {
            self.0.push((name, value));
            None
        }
    }

    pub fn insert(&mut self, name: &str, value: Option<&str>) -> Option<Option<KString>> {
        self.insert_kstring(KString::from_ref(name), value.map(KString::from_ref))
    }

    /// Add `name` only if it isn't present yet; returns whether it was
    /// added. HTML parsers keep the first of repeated attributes.
    pub fn push_if_absent(&mut self, name: &str, value: Option<&str>) -> bool {
        if self.position(name).is_some() {
            false
        } else {
            self.0.push((KString::from_ref(name), value.map(KString::from_ref)));
            true
        }
    }

    /// `None` if the attribute is missing, `Some(None)` if present
    /// without value.
    pub fn get(&self, name: &str) -> Option<Option<&str>> {
        self.0.iter()
            .find(|(k, _)| k.as_str() == name)
            .map(|(_, v)| v.as_ref().map(|v| v.as_str()))
    }

    /// The value of `name`, treating boolean attributes as missing.
    pub fn value(&self, name: &str) -> Option<&str> {
        self.get(name).flatten()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Put `name` with `value` where `old` was (at the end if `old` is
    /// missing). Another attribute already called `name` is dropped.
    pub fn replace(&mut self, old: &str, name: KString, value: Option<KString>) {
        if old != name.as_str() {
            if let Some(j) = self.position(&name) {
                self.0.remove(j);
            }
        }
        match self.position(old) {
            Some(i) => self.0[i] = (name, value),
            None => self.0.push((name, value)),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Option<KString>> {
        let i = self.position(name)?;
        Some(self.0.remove(i).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_ref().map(|v| v.as_str())))
    }

    /// Snapshot of the names, in order. Useful when the attributes are
    /// going to be changed while walking them.
    pub fn names(&self) -> Vec<KString> {
        self.0.iter().map(|(k, _)| k.clone()).collect()
    }
}

impl FromIterator<(KString, Option<KString>)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (KString, Option<KString>)>>(iter: I) -> Self {
        let mut atts = Attributes::new();
        for (k, v) in iter {
            atts.insert_kstring(k, v);
        }
        atts
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn t_insert_keeps_position() {
        let mut atts = Attributes::new();
        atts.insert("class", Some("a"));
        atts.insert("id", Some("x"));
        atts.insert("disabled", None);
        assert_eq!(atts.insert("class", Some("b")),
                   Some(Some(KString::from_static("a"))));
        let v: Vec<_> = atts.iter().collect();
        assert_eq!(v, vec![("class", Some("b")), ("id", Some("x")), ("disabled", None)]);
    }

    #[test]
    fn t_get_and_remove() {
        let mut atts = Attributes::new();
        atts.insert(":if", Some("$this->show"));
        atts.insert("hidden", None);
        assert_eq!(atts.get(":if"), Some(Some("$this->show")));
        assert_eq!(atts.get("hidden"), Some(None));
        assert_eq!(atts.value("hidden"), None);
        assert_eq!(atts.get("nope"), None);
        assert_eq!(atts.remove(":if"), Some(Some(KString::from_static("$this->show"))));
        assert!(!atts.contains(":if"));
        assert_eq!(atts.len(), 1);
    }

    #[test]
    fn t_replace() {
        let mut atts = Attributes::new();
        atts.insert("id", Some("1"));
        atts.insert(":class", Some("$c"));
        atts.insert("class", Some("old"));
        atts.insert("title", Some("t"));
        atts.replace(":class", KString::from_static("class"), Some(KString::from_static("new")));
        let v: Vec<_> = atts.iter().collect();
        assert_eq!(v, vec![("id", Some("1")), ("class", Some("new")), ("title", Some("t"))]);

        atts.replace(":hidden", KString::from_static("hidden"), None);
        assert_eq!(atts.get("hidden"), Some(None));
        assert_eq!(atts.len(), 4);
    }

    #[test]
    fn t_push_if_absent() {
        let mut atts = Attributes::new();
        assert!(atts.push_if_absent("a", Some("1")));
        assert!(!atts.push_if_absent("a", Some("2")));
        assert_eq!(atts.value("a"), Some("1"));
    }
}
