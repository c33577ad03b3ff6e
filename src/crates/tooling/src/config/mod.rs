//! Configuration management utilities
//!
//! Layered configuration: a file or compiled-in defaults form the baseline,
//! prefixed environment variables override it, and `ConfigBuilder::validate`
//! runs last.
//!
//! ```rust,ignore
//! use tooling::config::{ConfigBuilder, EnvOverrides};
//!
//! let mut config = ServerSettings::default();
//! let env = EnvOverrides::new("KRAMEN_");
//! env.apply_parse("port", &mut config.port)?;
//! config.validate()?;
//! ```

mod builder;
mod env;

pub use builder::ConfigBuilder;
pub use env::{build_env_key, get_env, get_env_parse, EnvOverrides};
