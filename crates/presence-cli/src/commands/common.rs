// Shared command context

use anyhow::Context;
use presence_core::effects::DeviceEffects;
use presence_core::{Configuration, DeviceFingerprint, PresenceConfig};
use presence_effects::StaticDeviceFingerprint;
use std::path::{Path, PathBuf};

/// Configuration plus where and as which device the commands operate.
#[derive(Debug, Clone)]
pub struct CliContext {
    /// Validated configuration
    pub config: PresenceConfig,
    /// Where local state lives
    pub data_dir: PathBuf,
    /// Fingerprint of this host
    pub device: DeviceFingerprint,
}

impl CliContext {
    /// Load configuration and resolve the data directory and device.
    pub async fn load(
        config_path: &Path,
        data_dir: Option<PathBuf>,
        device: Option<String>,
    ) -> anyhow::Result<Self> {
        let config = load_config_with_vars(config_path, std::env::vars())?;
        let data_dir = data_dir.unwrap_or_else(default_data_dir);
        let device = match device {
            Some(device) => DeviceFingerprint::new(device),
            None => host_fingerprint().await?,
        };
        Ok(Self {
            config,
            data_dir,
            device,
        })
    }
}

/// Load `path` if it exists (defaults otherwise), overlay `PRESENCE_*`
/// variables from `vars`, and validate.
pub fn load_config_with_vars<I>(path: &Path, vars: I) -> anyhow::Result<PresenceConfig>
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut config = if path.exists() {
        PresenceConfig::load_from_file(path)
            .with_context(|| format!("loading {}", path.display()))?
    } else {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        PresenceConfig::defaults()
    };
    config
        .merge_with_vars(vars)
        .context("applying environment overrides")?;
    config.validate().context("validating configuration")?;
    Ok(config)
}

/// Per-user data directory, falling back to `.presence`.
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("presence")
}

async fn host_fingerprint() -> anyhow::Result<DeviceFingerprint> {
    let home = dirs::home_dir()
        .map(|p| p.display().to_string())
        .unwrap_or_default();
    let device = StaticDeviceFingerprint::from_attributes([
        std::env::consts::OS,
        std::env::consts::ARCH,
        home.as_str(),
    ]);
    Ok(device.device_fingerprint().await?)
}
