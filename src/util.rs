use std::env::VarError;

use anyhow::{Result, bail};

/// Get an env var as a String; decoding failures are reported as
/// errors.
pub fn getenv(name: &str) -> Result<Option<String>> {
    match std::env::var(name) {
        Ok(s) => Ok(Some(s)),
        Err(e) => match e {
            VarError::NotPresent => Ok(None),
            VarError::NotUnicode(_) => bail!("{name:?} env var is not unicode"),
        }
    }
}

/// Get an env var holding a boolean. Unset and the empty string count
/// as false.
pub fn getenv_bool(name: &str) -> Result<bool> {
    match getenv(name)? {
        None => Ok(false),
        Some(s) => parse_bool(&s).ok_or_else(
            || anyhow::anyhow!("{name:?} env var: expecting a boolean, got {s:?}"))
    }
}

pub fn parse_bool(s: &str) -> Option<bool> {
    match s.trim() {
        "" | "0" | "false" | "no" | "off" => Some(false),
        "1" | "true" | "yes" | "on" => Some(true),
        _ => None
    }
}
