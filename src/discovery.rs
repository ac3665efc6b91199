//! Finding templates and anonymous components in the discovery
//! locations.

use std::{collections::HashSet, iter, path::PathBuf};

use kstring::KString;

use crate::{component::AnonymousViewComponent,
            config::DiscoveryLocation,
            easy_fs::{FileKind, file_kind, files_below, read_file},
            error::ViewError};

/// Locate the template `path`: as given, then relative to each
/// discovery location in turn. The first candidate that is a file
/// wins.
pub fn resolve_template_path(
    path: &str,
    locations: &[DiscoveryLocation],
) -> Result<PathBuf, ViewError> {
    let candidates = iter::once(PathBuf::from(path))
        .chain(locations.iter().map(|l| l.path.join(path)));
    let mut not_a_file = None;
    for candidate in candidates {
        match file_kind(&candidate) {
            Some(FileKind::File) => return Ok(candidate),
            Some(_) => {
                if not_a_file.is_none() {
                    not_a_file = Some(candidate);
                }
            }
            None => ()
        }
    }
    match not_a_file {
        Some(p) => Err(ViewError::PathWasNotAFile(p)),
        None => Err(ViewError::ViewNotFound(path.into())),
    }
}

/// The tag for a component file name, e.g. `x-card` for
/// `x-card.view.html`.
pub fn component_tag(file_name: &str, suffix: &str) -> Option<KString> {
    let tag = file_name.strip_suffix(suffix)?;
    if tag.len() > 2 && tag.starts_with("x-") {
        Some(KString::from_ref(tag))
    } else {
        None
    }
}

/// Read all `x-<name><suffix>` files below the discovery locations.
/// On name conflicts, the file from the earlier location (or, within
/// a location, the first in sorted path order) wins.
pub fn discover_view_components(
    locations: &[DiscoveryLocation],
    suffix: &str,
) -> Result<Vec<(KString, AnonymousViewComponent)>, ViewError> {
    let mut seen = HashSet::new();
    let mut found = Vec::new();
    for location in locations {
        if file_kind(&location.path) != Some(FileKind::Dir) {
            trace!("discovery location {:?} is not a directory, skipping it", location.path);
            continue
        }
        for file in files_below(&location.path)? {
            let tag = match file.file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| component_tag(n, suffix))
            {
                Some(tag) => tag,
                None => continue
            };
            if !seen.insert(tag.clone()) {
                trace!("<{}> is defined already, ignoring {:?}", tag, file);
                continue
            }
            let markup = read_file(&file)?;
            found.push((tag, AnonymousViewComponent::from_file(markup, file)));
        }
    }
    Ok(found)
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    use anyhow::Result;

    use crate::{config::{AppConfig, ViewConfig},
                renderer::ViewRenderer,
                view::GenericView};

    #[test]
    fn t_resolve_falls_back_to_later_root() -> Result<()> {
        let a = tempfile::tempdir()?;
        let b = tempfile::tempdir()?;
        fs::write(b.path().join("index.html"), "b")?;
        let app = AppConfig::new([a.path(), b.path()]);
        assert_eq!(resolve_template_path("index.html", &app.discovery_locations)?,
                   b.path().join("index.html"));

        fs::write(a.path().join("index.html"), "a")?;
        assert_eq!(resolve_template_path("index.html", &app.discovery_locations)?,
                   a.path().join("index.html"));
        Ok(())
    }

    #[test]
    fn t_resolve_errors() -> Result<()> {
        let a = tempfile::tempdir()?;
        fs::create_dir(a.path().join("dir.html"))?;
        let app = AppConfig::new([a.path()]);
        assert!(matches!(resolve_template_path("dir.html", &app.discovery_locations),
                         Err(ViewError::PathWasNotAFile(_))));
        assert!(matches!(resolve_template_path("gone.html", &app.discovery_locations),
                         Err(ViewError::ViewNotFound(_))));
        Ok(())
    }

    #[test]
    fn t_component_tag() {
        assert_eq!(component_tag("x-card.view.html", ".view.html").as_deref(), Some("x-card"));
        assert_eq!(component_tag("card.view.html", ".view.html"), None);
        assert_eq!(component_tag("x-.view.html", ".view.html"), None);
        assert_eq!(component_tag("x-card.html", ".view.html"), None);
    }

    #[test]
    fn t_discover_earlier_root_wins() -> Result<()> {
        let a = tempfile::tempdir()?;
        let b = tempfile::tempdir()?;
        fs::create_dir(a.path().join("components"))?;
        fs::write(a.path().join("components/x-card.view.html"), "A")?;
        fs::write(b.path().join("x-card.view.html"), "B")?;
        fs::write(b.path().join("x-note.view.html"), "N")?;
        fs::write(b.path().join("page.html"), "P")?;
        let app = AppConfig::new([a.path(), b.path()]);
        let found = discover_view_components(&app.discovery_locations, ".view.html")?;
        let summary: Vec<_> = found.iter()
            .map(|(tag, c)| (tag.as_str(), c.markup.as_str()))
            .collect();
        assert_eq!(summary, vec![("x-card", "A"), ("x-note", "N")]);
        Ok(())
    }

    #[test]
    fn t_discovered_component_renders_with_fallback() -> Result<()> {
        let root = tempfile::tempdir()?;
        fs::write(root.path().join("x-panel.view.html"),
                  "<section :title=\"$this->title\">\n\
                   <h2><x-slot name=\"heading\">Untitled</x-slot></h2>\n\
                   <x-slot/>\n\
                   </section>\n")?;
        let app = AppConfig::new([root.path()]);
        let config = ViewConfig::default().discover(&app)?;
        let renderer = ViewRenderer::new(app, config);

        let view = GenericView::new("<x-panel title=\"T\"><p>body</p></x-panel>");
        assert_eq!(renderer.render(Some(&view))?,
                   "<section title=\"T\">\n<h2>Untitled</h2>\n<p>body</p>\n</section>");
        Ok(())
    }

    #[test]
    fn t_explicit_registration_wins() -> Result<()> {
        let root = tempfile::tempdir()?;
        fs::write(root.path().join("x-card.view.html"), "file")?;
        let app = AppConfig::new([root.path()]);
        let config = ViewConfig::default()
            .with_component("x-card", std::sync::Arc::new(
                AnonymousViewComponent::new("explicit")))
            .discover(&app)?;
        let renderer = ViewRenderer::new(app, config);
        let view = GenericView::new("<x-card></x-card>");
        assert_eq!(renderer.render(Some(&view))?, "explicit");
        Ok(())
    }
}
