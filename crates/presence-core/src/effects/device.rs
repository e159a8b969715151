//! Device identity effect trait

use crate::types::DeviceFingerprint;
use crate::Result;
use async_trait::async_trait;

/// Source of the stable local device fingerprint.
#[async_trait]
pub trait DeviceEffects: Send + Sync {
    /// Fingerprint of the device this process runs on.
    async fn device_fingerprint(&self) -> Result<DeviceFingerprint>;
}
