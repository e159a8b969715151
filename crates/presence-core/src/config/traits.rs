//! Core configuration trait

use crate::PresenceError;
use std::path::Path;

/// Common lifecycle of a loadable configuration type.
///
/// Load from a file, overlay environment variables, then validate before use.
pub trait Configuration: Clone + Default + Send + Sync + 'static {
    /// Environment variable prefix for overrides (e.g. `PRESENCE_`)
    const ENV_PREFIX: &'static str;

    /// Get default configuration values
    fn defaults() -> Self {
        Self::default()
    }

    /// Load configuration from a file
    fn load_from_file(path: &Path) -> Result<Self, PresenceError>;

    /// Set a configuration value from a dotted key (`section.key`)
    fn set_from_string(&mut self, key: &str, value: &str) -> Result<(), PresenceError>;

    /// Validate the configuration
    fn validate(&self) -> Result<(), PresenceError>;

    /// Overlay `<PREFIX><SECTION>_<KEY>` variables from the given iterator.
    ///
    /// The first segment after the prefix names the section; the rest, joined
    /// with `_`, names the key.
    fn merge_with_vars<I>(&mut self, vars: I) -> Result<(), PresenceError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (name, value) in vars {
            let Some(rest) = name.strip_prefix(Self::ENV_PREFIX) else {
                continue;
            };
            let rest = rest.to_lowercase();
            let Some((section, key)) = rest.split_once('_') else {
                continue;
            };
            self.set_from_string(&format!("{section}.{key}"), &value)?;
        }
        Ok(())
    }

    /// Merge with process environment variables
    fn merge_with_env(&mut self) -> Result<(), PresenceError> {
        self.merge_with_vars(std::env::vars())
    }
}
