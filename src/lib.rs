#[macro_use]
pub mod warn;

pub mod util;
pub mod error;
pub mod expression;
pub mod view;
pub mod element;
pub mod element_factory;
pub mod attribute;
pub mod slot;
pub mod placeholder;
pub mod component;
pub mod renderer;
pub mod config;
pub mod discovery;
pub mod easy_fs;

pub use crate::{component::{AnonymousViewComponent, ComponentFactory, ComponentRegistry,
                            TypeMapFactory, ViewComponent},
                config::{AppConfig, DiscoveryLocation, ViewConfig},
                element::Element,
                error::ViewError,
                expression::{Evaluator, ExpressionEvaluator},
                renderer::ViewRenderer,
                view::{GenericView, View}};
