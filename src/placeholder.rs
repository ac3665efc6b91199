//! Single-pass scanners for the two placeholder forms: `{{ $expr }}` in
//! text and `<x-slot name="..."/>` markers in component output.
//! Replacement text is copied to the output as is, never rescanned.

/// Replace each `{{ $expr }}` in `text` by what `eval` returns for the
/// (trimmed) expression. `{{ ... }}` not starting with `$` and an
/// unclosed `{{` are copied literally.
pub fn interpolate<E>(
    text: &str,
    mut eval: impl FnMut(&str) -> Result<String, E>,
) -> Result<String, E> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(open) = rest.find("{{") {
        let after_open = &rest[open + 2..];
        let close = match after_open.find("}}") {
            Some(close) => close,
            None => break
        };
        let expr = after_open[..close].trim();
        out.push_str(&rest[..open]);
        if expr.starts_with('$') {
            out.push_str(&eval(expr)?);
        } else {
            out.push_str(&rest[open..open + 2 + close + 2]);
        }
        rest = &after_open[close + 2..];
    }
    out.push_str(rest);
    Ok(out)
}

fn is_slot_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-'
}

/// Parse a slot marker at the start of `s`: `<TAG/>`, `<TAG />`,
/// `<TAG name="N"/>` or `<TAG name="N" />`. Returns the slot name
/// (None for the default slot) and the length of the marker.
fn parse_marker<'s>(s: &'s str, tag: &str) -> Option<(Option<&'s str>, usize)> {
    let rest = s.strip_prefix('<')?.strip_prefix(tag)?;
    let mut i = s.len() - rest.len();
    let trimmed = rest.trim_start();
    let had_space = trimmed.len() < rest.len();
    i += rest.len() - trimmed.len();
    let mut name = None;
    let mut rest = trimmed;
    if let Some(after) = rest.strip_prefix("name=\"") {
        if !had_space {
            return None
        }
        let len = after.find('"')?;
        let n = &after[..len];
        if n.is_empty() || !n.chars().all(is_slot_name_char) {
            return None
        }
        name = Some(n);
        let consumed = "name=\"".len() + len + 1;
        i += consumed;
        rest = &rest[consumed..];
        let trimmed = rest.trim_start();
        i += rest.len() - trimmed.len();
        rest = trimmed;
    }
    if rest.starts_with("/>") {
        Some((name, i + 2))
    } else {
        None
    }
}

/// Replace slot markers using `lookup`, which gets the slot name
/// ("default" for a marker without name). A marker `lookup` has no
/// content for stays in the output.
pub fn substitute_slots<'c>(
    output: &str,
    tag: &str,
    mut lookup: impl FnMut(&str) -> Option<&'c str>,
) -> String {
    let mut out = String::with_capacity(output.len());
    let mut rest = output;
    while let Some(open) = rest.find('<') {
        out.push_str(&rest[..open]);
        let candidate = &rest[open..];
        match parse_marker(candidate, tag) {
            Some((name, len)) => {
                let name = name.unwrap_or(crate::slot::Slot::DEFAULT);
                match lookup(name) {
                    Some(content) => out.push_str(content),
                    None => {
                        trace!("no content for slot {:?}, leaving marker in place", name);
                        out.push_str(&candidate[..len]);
                    }
                }
                rest = &candidate[len..];
            }
            None => {
                out.push('<');
                rest = &candidate[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// The marker that `substitute_slots` replaces by the content of slot
/// `name`.
pub fn slot_marker(tag: &str, name: &str) -> String {
    if name == crate::slot::Slot::DEFAULT {
        format!("<{tag}/>")
    } else {
        format!("<{tag} name=\"{name}\"/>")
    }
}
