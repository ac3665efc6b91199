use std::path::PathBuf;

use thiserror::Error;

use crate::expression::EvalError;

#[derive(Error, Debug)]
pub enum ViewError {
    #[error("view {0:?} not found")]
    ViewNotFound(String),

    #[error("path {0:?} exists but is not a file")]
    PathWasNotAFile(PathBuf),

    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("evaluating expression {expr:?}: {source}")]
    Expression {
        expr: String,
        source: EvalError,
    },

    #[error("invalid directive {name}={value:?}: {message}")]
    InvalidDirective {
        name: String,
        value: String,
        message: String,
    },

    #[error("can't resolve view component for tag <{tag}> (type {type_ref:?})")]
    ComponentNotResolvable {
        tag: String,
        type_ref: String,
        /// The factory's error; None if there is no factory.
        #[source]
        source: Option<Box<ViewError>>,
    },

    #[error("{0:#}")]
    Other(#[from] anyhow::Error),
}

impl ViewError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ViewError::Io { path: path.into(), source }
    }

    pub fn expression(expr: &str, source: EvalError) -> Self {
        ViewError::Expression { expr: expr.into(), source }
    }

    pub fn invalid_directive(name: &str, value: &str, message: impl Into<String>) -> Self {
        ViewError::InvalidDirective {
            name: name.into(),
            value: value.into(),
            message: message.into(),
        }
    }
}
