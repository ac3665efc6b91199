use std::{path::{Path, PathBuf}, sync::Arc};

use anyhow::{Result, Context, anyhow};
use serde::{Deserialize, Serialize};

use crate::{component::{ComponentEntry, ComponentRegistry, ViewComponent},
            discovery::discover_view_components,
            element_factory::ElementFactoryConfig,
            error::ViewError,
            util::getenv};

/// Name of the env var `AppConfig::from_env` reads; a list of
/// directories in the platform's `PATH` syntax.
pub const DISCOVERY_PATHS_VAR: &str = "AVIEW_DISCOVERY_PATHS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryLocation {
    pub path: PathBuf,
}

/// Application-wide settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Searched in order, for templates and for anonymous components.
    pub discovery_locations: Vec<DiscoveryLocation>,
}

impl AppConfig {
    pub fn new<P: Into<PathBuf>>(paths: impl IntoIterator<Item = P>) -> Self {
        AppConfig {
            discovery_locations: paths.into_iter()
                .map(|p| DiscoveryLocation { path: p.into() })
                .collect()
        }
    }

    pub fn from_env() -> Result<Self> {
        match getenv(DISCOVERY_PATHS_VAR)? {
            Some(s) => Ok(AppConfig::new(
                std::env::split_paths(&s).filter(|p| !p.as_os_str().is_empty()))),
            None => Ok(AppConfig::default()),
        }
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path).with_context(
            || anyhow!("reading config file {:?}", path.to_string_lossy()))?;
        serde_json::from_str(&s).with_context(
            || anyhow!("parsing config file {:?}", path.to_string_lossy()))
    }

    pub fn add_location(&mut self, path: impl Into<PathBuf>) {
        self.discovery_locations.push(DiscoveryLocation { path: path.into() });
    }
}


/// Settings of the view layer.
#[derive(Debug, Clone)]
pub struct ViewConfig {
    pub components: ComponentRegistry,
    pub element_factory: ElementFactoryConfig,
    /// Views whose path ends with this are loaded from files.
    pub template_suffix: String,
    /// Files named `x-<name>` plus this suffix are anonymous components.
    pub component_suffix: String,
    /// HTML-escape the values of `{{ }}` placeholders.
    pub escape_interpolations: bool,
}

impl Default for ViewConfig {
    fn default() -> Self {
        ViewConfig {
            components: ComponentRegistry::new(),
            element_factory: ElementFactoryConfig::default(),
            template_suffix: ".html".into(),
            component_suffix: ".view.html".into(),
            escape_interpolations: false,
        }
    }
}

impl ViewConfig {
    pub fn with_components(mut self, components: ComponentRegistry) -> Self {
        self.components = components;
        self
    }

    pub fn with_component(mut self, tag: &str, component: Arc<dyn ViewComponent>) -> Self {
        self.components.register_instance(tag, component);
        self
    }

    pub fn with_component_type(mut self, tag: &str, type_ref: &str) -> Self {
        self.components.register_type(tag, type_ref);
        self
    }

    pub fn with_element_factory(mut self, config: ElementFactoryConfig) -> Self {
        self.element_factory = config;
        self
    }

    pub fn with_template_suffix(mut self, suffix: &str) -> Self {
        self.template_suffix = suffix.into();
        self
    }

    pub fn with_component_suffix(mut self, suffix: &str) -> Self {
        self.component_suffix = suffix.into();
        self
    }

    pub fn escape_interpolations(mut self, on: bool) -> Self {
        self.escape_interpolations = on;
        self
    }

    /// Register the anonymous components found in the discovery
    /// locations. Tags registered already are left alone.
    pub fn discover(mut self, app_config: &AppConfig) -> Result<Self, ViewError> {
        let found = discover_view_components(&app_config.discovery_locations,
                                             &self.component_suffix)?;
        for (tag, component) in found {
            let file = component.file.clone();
            if !self.components.register_if_absent(
                &tag, ComponentEntry::Instance(Arc::new(component)))
            {
                trace!("<{}> is registered explicitly, ignoring {:?}", tag, file);
            }
        }
        Ok(self)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn t_from_json_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let file = dir.path().join("aview.json");
        std::fs::write(&file, r#"{"discovery_locations": [{"path": "views"}, {"path": "/srv/x"}]}"#)?;
        let config = AppConfig::from_json_file(&file)?;
        assert_eq!(config, AppConfig::new(["views", "/srv/x"]));

        std::fs::write(&file, "{}")?;
        assert_eq!(AppConfig::from_json_file(&file)?, AppConfig::default());

        std::fs::write(&file, "[")?;
        assert!(AppConfig::from_json_file(&file).is_err());
        Ok(())
    }

    #[test]
    fn t_view_config_builder() {
        let config = ViewConfig::default()
            .with_component_type("x-alert", "Alert")
            .with_template_suffix(".tpl")
            .escape_interpolations(true);
        assert!(config.components.contains("x-alert"));
        assert_eq!(config.template_suffix, ".tpl");
        assert_eq!(config.component_suffix, ".view.html");
        assert!(config.escape_interpolations);
        assert_eq!(config.element_factory.slot_tag, "x-slot");
    }
}
