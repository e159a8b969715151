//! Presence subsystem configuration
//!
//! One TOML document with a section per component. Every field has a
//! default, so an empty file is a valid configuration.

use super::traits::Configuration;
use super::validation::ConfigValidator;
use crate::PresenceError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Handshake timing budgets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandshakeConfig {
    /// Soft budget for phase 1 (visual liveness)
    pub phase1_budget_ms: u64,
    /// Soft budget for phase 2 (tactile identity)
    pub phase2_budget_ms: u64,
    /// Soft budget for phase 3 (vital pulse)
    pub phase3_budget_ms: u64,
    /// Reserved inside the ceiling for the cohesion verify step
    pub buffer_margin_ms: u64,
    /// Hard ceiling from phase-1 start to verify completion
    pub cohesion_timeout_ms: u64,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            phase1_budget_ms: 600,
            phase2_budget_ms: 400,
            phase3_budget_ms: 400,
            buffer_margin_ms: 100,
            cohesion_timeout_ms: 1500,
        }
    }
}

impl HandshakeConfig {
    /// Soft budgets for phases 1..=3, in order.
    pub fn phase_budgets(&self) -> [Duration; 3] {
        [
            Duration::from_millis(self.phase1_budget_ms),
            Duration::from_millis(self.phase2_budget_ms),
            Duration::from_millis(self.phase3_budget_ms),
        ]
    }

    /// Hard cohesion ceiling.
    pub fn cohesion_timeout(&self) -> Duration {
        Duration::from_millis(self.cohesion_timeout_ms)
    }

    /// Soft budget for the verify step.
    pub fn buffer_margin(&self) -> Duration {
        Duration::from_millis(self.buffer_margin_ms)
    }
}

/// Proof generation and verification settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProofConfig {
    /// How long consumed challenges are remembered and proofs stay fresh
    pub replay_window_ms: u64,
    /// Timeout handed to the platform authenticator
    pub authenticator_timeout_ms: u64,
    /// Relying-party identifier
    pub rp_id: String,
}

impl Default for ProofConfig {
    fn default() -> Self {
        Self {
            replay_window_ms: 5 * 60 * 1000,
            authenticator_timeout_ms: 60_000,
            rp_id: "localhost".to_string(),
        }
    }
}

impl ProofConfig {
    /// Replay window as a duration.
    pub fn replay_window(&self) -> Duration {
        Duration::from_millis(self.replay_window_ms)
    }
}

/// Device anchor storage and key derivation settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnchorConfig {
    /// Fixed storage key of the sealed record
    pub storage_key: String,
    /// Application secret the record key is derived from
    pub app_secret: String,
    /// Fixed salt for key derivation
    pub key_salt: String,
    /// Fixed salt mixed into the one-way anchor token
    pub token_salt: String,
    /// Argon2id memory cost in KiB
    pub kdf_memory_kib: u32,
    /// Argon2id iterations
    pub kdf_iterations: u32,
    /// Argon2id lanes
    pub kdf_parallelism: u32,
    /// SHA-256 hex digests of device fingerprints granted the privileged
    /// device capability. Empty unless explicitly provisioned.
    pub privileged_devices: Vec<String>,
}

impl Default for AnchorConfig {
    fn default() -> Self {
        Self {
            storage_key: "presence_device_anchor".to_string(),
            app_secret: "presence-anchor-application-secret".to_string(),
            key_salt: "presence-anchor-key-salt-v1".to_string(),
            token_salt: "presence-anchor-token-salt-v1".to_string(),
            kdf_memory_kib: 64 * 1024,
            kdf_iterations: 3,
            kdf_parallelism: 4,
            privileged_devices: Vec::new(),
        }
    }
}

/// Session Security Gateway schedule and redirect targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Periodic re-validation interval
    pub revalidate_interval_ms: u64,
    /// Inactivity check interval
    pub inactivity_check_interval_ms: u64,
    /// Inactivity after which a verified session is purged
    pub inactivity_timeout_ms: u64,
    /// Upper bound on the initial presence check
    pub initial_check_timeout_ms: u64,
    /// Maximum age of a backend-verified handshake
    pub presence_expiry_ms: u64,
    /// Redirect target after a purge
    pub public_entry: String,
    /// Redirect target after a purge on a privileged device
    pub privileged_landing: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            revalidate_interval_ms: 30_000,
            inactivity_check_interval_ms: 10_000,
            inactivity_timeout_ms: 10 * 60 * 1000,
            initial_check_timeout_ms: 5_000,
            presence_expiry_ms: 24 * 60 * 60 * 1000,
            public_entry: "/".to_string(),
            privileged_landing: "/dashboard".to_string(),
        }
    }
}

impl GatewayConfig {
    /// Re-validation interval as a duration
    pub fn revalidate_interval(&self) -> Duration {
        Duration::from_millis(self.revalidate_interval_ms)
    }

    /// Inactivity check interval as a duration
    pub fn inactivity_check_interval(&self) -> Duration {
        Duration::from_millis(self.inactivity_check_interval_ms)
    }

    /// Initial check bound as a duration
    pub fn initial_check_timeout(&self) -> Duration {
        Duration::from_millis(self.initial_check_timeout_ms)
    }
}

/// Route tiers consumed by the capability gate. Entries are path prefixes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutesConfig {
    /// Routes requiring a verified session
    pub verified: Vec<String>,
    /// Routes additionally requiring an active license
    pub licensed: Vec<String>,
    /// Redirect target when the license check fails
    pub license_redirect: String,
}

impl Default for RoutesConfig {
    fn default() -> Self {
        Self {
            verified: vec![
                "/dashboard".to_string(),
                "/wallet".to_string(),
                "/vault".to_string(),
                "/settings".to_string(),
            ],
            licensed: vec!["/treasury".to_string()],
            license_redirect: "/activate".to_string(),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PresenceConfig {
    /// Handshake timing
    pub handshake: HandshakeConfig,
    /// Proof generation and replay window
    pub proof: ProofConfig,
    /// Anchor sealing and privileged devices
    pub anchor: AnchorConfig,
    /// Gateway schedule and redirects
    pub gateway: GatewayConfig,
    /// Route tiers
    pub routes: RoutesConfig,
}

impl PresenceConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, PresenceError> {
        toml::from_str(text).map_err(|e| PresenceError::invalid(format!("invalid config: {e}")))
    }

    /// Render as TOML.
    pub fn to_toml_string(&self) -> Result<String, PresenceError> {
        toml::to_string_pretty(self).map_err(|e| PresenceError::serialization(e.to_string()))
    }

    /// Defaults with cheap key derivation, for tests and simulations.
    pub fn for_testing() -> Self {
        let mut config = Self::default();
        config.anchor.kdf_memory_kib = 64;
        config.anchor.kdf_iterations = 1;
        config.anchor.kdf_parallelism = 1;
        config
    }
}

fn parse_u64(key: &str, value: &str) -> Result<u64, PresenceError> {
    value
        .trim()
        .parse()
        .map_err(|_| PresenceError::invalid(format!("{key}: expected an integer, got '{value}'")))
}

fn parse_u32(key: &str, value: &str) -> Result<u32, PresenceError> {
    value
        .trim()
        .parse()
        .map_err(|_| PresenceError::invalid(format!("{key}: expected an integer, got '{value}'")))
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl Configuration for PresenceConfig {
    const ENV_PREFIX: &'static str = "PRESENCE_";

    fn load_from_file(path: &Path) -> Result<Self, PresenceError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PresenceError::invalid(format!(
                "failed to read config file {}: {e}",
                path.display()
            ))
        })?;
        Self::from_toml_str(&content)
    }

    fn set_from_string(&mut self, key: &str, value: &str) -> Result<(), PresenceError> {
        match key {
            "handshake.phase1_budget_ms" => self.handshake.phase1_budget_ms = parse_u64(key, value)?,
            "handshake.phase2_budget_ms" => self.handshake.phase2_budget_ms = parse_u64(key, value)?,
            "handshake.phase3_budget_ms" => self.handshake.phase3_budget_ms = parse_u64(key, value)?,
            "handshake.buffer_margin_ms" => self.handshake.buffer_margin_ms = parse_u64(key, value)?,
            "handshake.cohesion_timeout_ms" => {
                self.handshake.cohesion_timeout_ms = parse_u64(key, value)?;
            }
            "proof.replay_window_ms" => self.proof.replay_window_ms = parse_u64(key, value)?,
            "proof.authenticator_timeout_ms" => {
                self.proof.authenticator_timeout_ms = parse_u64(key, value)?;
            }
            "proof.rp_id" => self.proof.rp_id = value.to_string(),
            "anchor.storage_key" => self.anchor.storage_key = value.to_string(),
            "anchor.app_secret" => self.anchor.app_secret = value.to_string(),
            "anchor.key_salt" => self.anchor.key_salt = value.to_string(),
            "anchor.token_salt" => self.anchor.token_salt = value.to_string(),
            "anchor.kdf_memory_kib" => self.anchor.kdf_memory_kib = parse_u32(key, value)?,
            "anchor.kdf_iterations" => self.anchor.kdf_iterations = parse_u32(key, value)?,
            "anchor.kdf_parallelism" => self.anchor.kdf_parallelism = parse_u32(key, value)?,
            "anchor.privileged_devices" => self.anchor.privileged_devices = parse_list(value),
            "gateway.revalidate_interval_ms" => {
                self.gateway.revalidate_interval_ms = parse_u64(key, value)?;
            }
            "gateway.inactivity_check_interval_ms" => {
                self.gateway.inactivity_check_interval_ms = parse_u64(key, value)?;
            }
            "gateway.inactivity_timeout_ms" => {
                self.gateway.inactivity_timeout_ms = parse_u64(key, value)?;
            }
            "gateway.initial_check_timeout_ms" => {
                self.gateway.initial_check_timeout_ms = parse_u64(key, value)?;
            }
            "gateway.presence_expiry_ms" => {
                self.gateway.presence_expiry_ms = parse_u64(key, value)?;
            }
            "gateway.public_entry" => self.gateway.public_entry = value.to_string(),
            "gateway.privileged_landing" => self.gateway.privileged_landing = value.to_string(),
            "routes.verified" => self.routes.verified = parse_list(value),
            "routes.licensed" => self.routes.licensed = parse_list(value),
            "routes.license_redirect" => self.routes.license_redirect = value.to_string(),
            other => {
                return Err(PresenceError::invalid(format!(
                    "unknown configuration key: {other}"
                )))
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), PresenceError> {
        let root = ConfigValidator::new();

        let mut handshake = root.for_field("handshake");
        let h = &self.handshake;
        handshake
            .range("phase1_budget_ms", h.phase1_budget_ms, Some(1), None)
            .range("phase2_budget_ms", h.phase2_budget_ms, Some(1), None)
            .range("phase3_budget_ms", h.phase3_budget_ms, Some(1), None)
            .range("cohesion_timeout_ms", h.cohesion_timeout_ms, Some(1), None)
            .custom(
                "cohesion_timeout_ms",
                h.phase1_budget_ms
                    .saturating_add(h.phase2_budget_ms)
                    .saturating_add(h.phase3_budget_ms)
                    .saturating_add(h.buffer_margin_ms)
                    <= h.cohesion_timeout_ms,
                "phase budgets plus buffer margin must fit inside the cohesion timeout",
            );

        let mut proof = root.for_field("proof");
        proof
            .range("replay_window_ms", self.proof.replay_window_ms, Some(1), None)
            .range(
                "authenticator_timeout_ms",
                self.proof.authenticator_timeout_ms,
                Some(1),
                None,
            )
            .non_empty("rp_id", &self.proof.rp_id);

        let mut anchor = root.for_field("anchor");
        let a = &self.anchor;
        anchor
            .non_empty("storage_key", &a.storage_key)
            .non_empty("app_secret", &a.app_secret)
            .non_empty("token_salt", &a.token_salt)
            .range("kdf_iterations", u64::from(a.kdf_iterations), Some(1), None)
            .range("kdf_parallelism", u64::from(a.kdf_parallelism), Some(1), None)
            .range(
                "kdf_memory_kib",
                u64::from(a.kdf_memory_kib),
                Some(8 * u64::from(a.kdf_parallelism)),
                None,
            )
            .custom(
                "key_salt",
                a.key_salt.len() >= 8,
                "key salt must be at least 8 bytes",
            )
            .custom(
                "privileged_devices",
                a.privileged_devices
                    .iter()
                    .all(|d| d.len() == 64 && d.chars().all(|c| c.is_ascii_hexdigit())),
                "entries must be SHA-256 hex digests",
            );

        let mut gateway = root.for_field("gateway");
        let g = &self.gateway;
        gateway
            .range("revalidate_interval_ms", g.revalidate_interval_ms, Some(1), None)
            .range(
                "inactivity_check_interval_ms",
                g.inactivity_check_interval_ms,
                Some(1),
                None,
            )
            .range(
                "inactivity_timeout_ms",
                g.inactivity_timeout_ms,
                Some(g.inactivity_check_interval_ms),
                None,
            )
            .range("initial_check_timeout_ms", g.initial_check_timeout_ms, Some(1), None)
            .range("presence_expiry_ms", g.presence_expiry_ms, Some(1), None)
            .custom(
                "public_entry",
                g.public_entry.starts_with('/'),
                "must be an absolute path",
            )
            .custom(
                "privileged_landing",
                g.privileged_landing.starts_with('/'),
                "must be an absolute path",
            );

        let mut routes = root.for_field("routes");
        routes.custom(
            "verified",
            self.routes
                .verified
                .iter()
                .chain(self.routes.licensed.iter())
                .all(|r| r.starts_with('/') && r != &g.public_entry),
            "protected routes must be absolute and distinct from the public entry",
        );

        let mut all = root;
        all.merge(handshake);
        all.merge(proof);
        all.merge(anchor);
        all.merge(gateway);
        all.merge(routes);
        all.result().map_err(PresenceError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        PresenceConfig::default().validate().unwrap();
        PresenceConfig::for_testing().validate().unwrap();
    }

    #[test]
    fn budgets_must_fit_inside_ceiling() {
        let mut config = PresenceConfig::default();
        config.handshake.cohesion_timeout_ms = 1400;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("handshake.cohesion_timeout_ms"));
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = PresenceConfig::from_toml_str(
            r#"
            [handshake]
            cohesion_timeout_ms = 2000

            [gateway]
            public_entry = "/welcome"
            "#,
        )
        .unwrap();
        assert_eq!(config.handshake.cohesion_timeout_ms, 2000);
        assert_eq!(config.handshake.phase1_budget_ms, 600);
        assert_eq!(config.gateway.public_entry, "/welcome");
        assert_eq!(config.anchor.storage_key, "presence_device_anchor");
    }

    #[test]
    fn env_vars_override_by_section() {
        let mut config = PresenceConfig::default();
        config
            .merge_with_vars(vec![
                ("PRESENCE_HANDSHAKE_COHESION_TIMEOUT_MS".to_string(), "1800".to_string()),
                ("PRESENCE_ROUTES_LICENSED".to_string(), "/a, /b".to_string()),
                ("UNRELATED_VAR".to_string(), "x".to_string()),
            ])
            .unwrap();
        assert_eq!(config.handshake.cohesion_timeout_ms, 1800);
        assert_eq!(config.routes.licensed, vec!["/a", "/b"]);
    }

    #[test]
    fn bad_env_value_is_rejected() {
        let mut config = PresenceConfig::default();
        let result = config.merge_with_vars(vec![(
            "PRESENCE_GATEWAY_INACTIVITY_TIMEOUT_MS".to_string(),
            "ten minutes".to_string(),
        )]);
        assert!(matches!(result, Err(PresenceError::Invalid { .. })));
    }

    #[test]
    fn toml_round_trip() {
        let config = PresenceConfig::default();
        let text = config.to_toml_string().unwrap();
        assert_eq!(PresenceConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn load_from_file_reads_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("presence.toml");
        std::fs::write(&path, "[proof]\nrp_id = \"example.org\"\n").unwrap();
        let config = PresenceConfig::load_from_file(&path).unwrap();
        assert_eq!(config.proof.rp_id, "example.org");
    }
}
