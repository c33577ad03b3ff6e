//! Configuration builder trait

use crate::Result;

/// Common shape for configuration types.
///
/// `from_env` reads a complete value from prefixed variables on top of the
/// defaults; `merge` overlays the non-default parts of another value.
pub trait ConfigBuilder: Default + Clone {
    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// Load configuration from environment variables
    fn from_env(prefix: &str) -> Result<Self>;

    /// Overlay `other` onto `self`
    fn merge(&mut self, other: Self) -> &mut Self;

    /// Build a validated default configuration
    fn build() -> Result<Self> {
        let config = Self::default();
        config.validate()?;
        Ok(config)
    }

    /// Load from the environment on top of defaults, then validate
    fn from_env_validated(prefix: &str) -> Result<Self> {
        let config = Self::from_env(prefix)?;
        config.validate()?;
        Ok(config)
    }
}
