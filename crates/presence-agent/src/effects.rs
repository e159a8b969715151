//! Effect bundle handed to the agent builder

use presence_core::effects::{
    DeviceEffects, IdentityBackendEffects, LicenseEffects, PlatformAuthenticatorEffects,
    RandomEffects, StorageEffects, TimeEffects,
};
use presence_core::DeviceFingerprint;
use presence_effects::{
    FallbackAuthenticatorHandler, FilesystemStorageHandler, OfflineIdentityBackend,
    RealRandomHandler, RealTimeHandler, StaticDeviceFingerprint, UnlicensedHandler,
};
use std::path::PathBuf;
use std::sync::Arc;

/// Every side effect the agent performs, one handler per seam.
#[derive(Clone)]
pub struct AgentEffects {
    /// Clock
    pub time: Arc<dyn TimeEffects>,
    /// CSPRNG
    pub random: Arc<dyn RandomEffects>,
    /// Local persistence for the anchor record
    pub storage: Arc<dyn StorageEffects>,
    /// Platform authenticator
    pub authenticator: Arc<dyn PlatformAuthenticatorEffects>,
    /// Remote identity store
    pub backend: Arc<dyn IdentityBackendEffects>,
    /// Entitlement lookup
    pub license: Arc<dyn LicenseEffects>,
    /// Device fingerprint source
    pub device: Arc<dyn DeviceEffects>,
}

impl AgentEffects {
    /// Production handlers with files under `data_dir`.
    ///
    /// No identity backend, license service or platform authenticator is
    /// assumed; wire real ones in with the `with_*` methods.
    pub fn production(data_dir: PathBuf, device: DeviceFingerprint) -> Self {
        Self {
            time: Arc::new(RealTimeHandler::new()),
            random: Arc::new(RealRandomHandler::new()),
            storage: Arc::new(FilesystemStorageHandler::new(data_dir)),
            authenticator: Arc::new(FallbackAuthenticatorHandler::new(false)),
            backend: Arc::new(OfflineIdentityBackend::new()),
            license: Arc::new(UnlicensedHandler::new()),
            device: Arc::new(StaticDeviceFingerprint::new(device)),
        }
    }

    /// Replace the clock.
    pub fn with_time(mut self, time: Arc<dyn TimeEffects>) -> Self {
        self.time = time;
        self
    }

    /// Replace the random source.
    pub fn with_random(mut self, random: Arc<dyn RandomEffects>) -> Self {
        self.random = random;
        self
    }

    /// Replace local storage.
    pub fn with_storage(mut self, storage: Arc<dyn StorageEffects>) -> Self {
        self.storage = storage;
        self
    }

    /// Replace the platform authenticator.
    pub fn with_authenticator(mut self, authenticator: Arc<dyn PlatformAuthenticatorEffects>) -> Self {
        self.authenticator = authenticator;
        self
    }

    /// Replace the identity backend.
    pub fn with_backend(mut self, backend: Arc<dyn IdentityBackendEffects>) -> Self {
        self.backend = backend;
        self
    }

    /// Replace the license service.
    pub fn with_license(mut self, license: Arc<dyn LicenseEffects>) -> Self {
        self.license = license;
        self
    }

    /// Replace the device fingerprint source.
    pub fn with_device(mut self, device: Arc<dyn DeviceEffects>) -> Self {
        self.device = device;
        self
    }
}
