//! Environment variable loading utilities

use crate::{Result, ToolingError};
use std::env;
use std::str::FromStr;

/// Load an environment variable as a string
///
/// Returns `Ok(None)` when the variable is unset and an error when it holds
/// invalid UTF-8.
pub fn get_env(key: &str) -> Result<Option<String>> {
    match env::var(key) {
        Ok(val) => Ok(Some(val)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(env::VarError::NotUnicode(_)) => Err(ToolingError::General(format!(
            "Environment variable {} contains invalid UTF-8",
            key
        ))),
    }
}

/// Load and parse an environment variable
///
/// ```rust,ignore
/// let port: Option<u16> = get_env_parse("KRAMEN_PORT")?;
/// ```
pub fn get_env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match get_env(key)? {
        Some(val) => val.trim().parse::<T>().map(Some).map_err(|e| {
            ToolingError::General(format!(
                "Failed to parse environment variable {}: {}",
                key, e
            ))
        }),
        None => Ok(None),
    }
}

/// Build a prefixed environment variable name
///
/// ```rust,ignore
/// let key = build_env_key("KRAMEN_", "port"); // "KRAMEN_PORT"
/// ```
pub fn build_env_key(prefix: &str, name: &str) -> String {
    format!("{}{}", prefix, name.to_uppercase())
}

/// Reads variables sharing a common prefix.
///
/// Each `apply_*` method overwrites the target only when the variable is set,
/// which lets file-based configuration act as the baseline.
#[derive(Debug, Clone)]
pub struct EnvOverrides {
    prefix: String,
}

impl EnvOverrides {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn key(&self, name: &str) -> String {
        build_env_key(&self.prefix, name)
    }

    pub fn apply_string(&self, name: &str, target: &mut String) -> Result<bool> {
        match get_env(&self.key(name))? {
            Some(value) => {
                *target = value;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn apply_optional(&self, name: &str, target: &mut Option<String>) -> Result<bool> {
        match get_env(&self.key(name))? {
            Some(value) => {
                *target = if value.is_empty() { None } else { Some(value) };
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn apply_parse<T>(&self, name: &str, target: &mut T) -> Result<bool>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match get_env_parse(&self.key(name))? {
            Some(value) => {
                *target = value;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
