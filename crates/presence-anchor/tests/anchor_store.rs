//! Anchor, clear and deep recovery against mock and filesystem storage.

use assert_matches::assert_matches;
use async_trait::async_trait;
use presence_anchor::{AnchorError, DeviceAnchorStore, PrivilegedDevicePolicy};
use presence_core::config::AnchorConfig;
use presence_core::effects::{BackendIdentityRecord, DeviceEffects, StorageEffects, StorageError};
use presence_core::{codec, DeviceFingerprint, IdentityHash, PalmHash, PhoneRef, PresenceError};
use presence_effects::{FilesystemStorageHandler, StaticDeviceFingerprint};
use presence_testkit::{test_config, MemoryStorage, MockIdentityBackend, SeededRandom};
use std::sync::Arc;

const DEVICE: &str = "device-d1";

struct Fixture {
    storage: MemoryStorage,
    backend: MockIdentityBackend,
    config: AnchorConfig,
    store: DeviceAnchorStore,
}

fn store_with(config: AnchorConfig, storage: Arc<dyn StorageEffects>, backend: &MockIdentityBackend) -> DeviceAnchorStore {
    DeviceAnchorStore::new(
        storage,
        Arc::new(backend.clone()),
        Arc::new(StaticDeviceFingerprint::new(DEVICE)),
        Arc::new(SeededRandom::new(42)),
        &config,
    )
    .unwrap()
}

fn fixture() -> Fixture {
    let storage = MemoryStorage::new();
    let backend = MockIdentityBackend::new();
    let config = test_config().anchor;
    let store = store_with(config.clone(), Arc::new(storage.clone()), &backend);
    Fixture {
        storage,
        backend,
        config,
        store,
    }
}

fn h1() -> IdentityHash {
    IdentityHash::new("identity-h1")
}

fn d1() -> DeviceFingerprint {
    DeviceFingerprint::new(DEVICE)
}

#[tokio::test]
async fn anchored_record_round_trips_and_mirrors_pointer() {
    let f = fixture();
    assert!(!f.store.is_anchored().await);

    let token = f
        .store
        .anchor(&h1(), &d1(), Some(PhoneRef::new("+15550100")), None)
        .await
        .unwrap();

    assert!(f.store.is_anchored().await);
    let record = f.store.load().await.unwrap().unwrap();
    assert_eq!(record.identity_hash, h1());
    assert_eq!(record.phone_ref, Some(PhoneRef::new("+15550100")));
    assert_eq!(record.token, token);

    let pointer = f.backend.pointer(&d1()).unwrap();
    assert_eq!(pointer.token, token.as_str());
}

#[tokio::test]
async fn stored_blob_is_opaque_base64() {
    let f = fixture();
    f.store
        .anchor(&h1(), &d1(), None, Some(PalmHash::new("palm-77")))
        .await
        .unwrap();

    let raw = String::from_utf8(f.storage.raw(&f.config.storage_key).unwrap()).unwrap();
    assert!(!raw.contains("identity-h1"));
    assert!(!raw.contains("palm-77"));
    assert!(codec::decode_b64(&raw).unwrap().len() > 12);
    assert_eq!(
        f.store.load().await.unwrap().unwrap().palm_hash,
        Some(PalmHash::new("palm-77"))
    );
}

#[tokio::test]
async fn token_is_deterministic_and_device_bound() {
    let f = fixture();
    let first = f.store.anchor(&h1(), &d1(), None, None).await.unwrap();
    let again = f.store.anchor(&h1(), &d1(), None, None).await.unwrap();
    assert_eq!(first, again);

    let other = f.store.token_for(&h1(), &DeviceFingerprint::new("device-d2"));
    assert_ne!(first, other);
}

#[tokio::test]
async fn corrupt_record_reads_as_not_anchored() {
    let f = fixture();
    f.store.anchor(&h1(), &d1(), None, None).await.unwrap();
    f.storage
        .put_raw(&f.config.storage_key, b"definitely not a sealed record".to_vec());

    assert!(!f.store.is_anchored().await);
    assert_eq!(f.store.load().await.unwrap(), None);
}

#[tokio::test]
async fn record_from_another_secret_is_not_anchored() {
    let f = fixture();
    f.store.anchor(&h1(), &d1(), None, None).await.unwrap();

    let mut foreign = f.config.clone();
    foreign.app_secret = "another-application".to_string();
    let other = store_with(foreign, Arc::new(f.storage.clone()), &f.backend);
    assert!(!other.is_anchored().await);
}

#[tokio::test]
async fn record_copied_from_another_device_is_not_anchored() {
    let f = fixture();
    f.store
        .anchor(&h1(), &DeviceFingerprint::new("device-d2"), None, None)
        .await
        .unwrap();
    assert!(f.store.load().await.unwrap().is_some());
    assert!(!f.store.is_anchored().await);
}

#[tokio::test]
async fn clear_is_idempotent_and_removes_pointer() {
    let f = fixture();
    f.store.anchor(&h1(), &d1(), None, None).await.unwrap();

    f.store.clear().await.unwrap();
    f.store.clear().await.unwrap();

    assert!(!f.store.is_anchored().await);
    assert!(f.backend.pointer(&d1()).is_none());
}

#[tokio::test]
async fn deep_recovery_restores_anchor_without_handshake() {
    let f = fixture();
    f.store.anchor(&h1(), &d1(), None, None).await.unwrap();
    f.storage.wipe();
    assert!(!f.store.is_anchored().await);

    f.backend.insert_record(
        d1(),
        BackendIdentityRecord {
            identity_hash: Some(h1()),
            phone_ref: Some(PhoneRef::new("+15550100")),
            palm_hash: None,
        },
    );

    assert!(f.store.recover(&d1()).await.unwrap());
    assert!(f.store.is_anchored().await);
    assert_eq!(f.store.anchored_identity().await, Some(h1()));
}

#[tokio::test]
async fn recovery_without_enrolled_identity_changes_nothing() {
    let f = fixture();
    f.backend.insert_record(
        d1(),
        BackendIdentityRecord {
            identity_hash: None,
            phone_ref: Some(PhoneRef::new("+15550100")),
            palm_hash: None,
        },
    );

    assert!(!f.store.recover(&d1()).await.unwrap());
    assert!(!f.store.recover(&DeviceFingerprint::new("unknown")).await.unwrap());
    assert!(f.storage.is_empty());

    f.backend.set_online(false);
    assert!(!f.store.recover(&d1()).await.unwrap());
    assert!(f.storage.is_empty());
}

#[tokio::test]
async fn offline_backend_does_not_block_anchoring() {
    let f = fixture();
    f.backend.set_online(false);
    f.store.anchor(&h1(), &d1(), None, None).await.unwrap();
    assert!(f.store.is_anchored().await);
}

#[tokio::test]
async fn failed_local_delete_still_removes_pointer() {
    let f = fixture();
    f.store.anchor(&h1(), &d1(), None, None).await.unwrap();
    f.storage.set_fail_removes(true);

    let err = f.store.clear().await.unwrap_err();
    assert_matches!(err, AnchorError::Storage(StorageError::DeleteFailed(_)));
    assert!(f.backend.pointer(&d1()).is_none());
    assert!(f.store.is_anchored().await);
}

struct NoFingerprint;

#[async_trait]
impl DeviceEffects for NoFingerprint {
    async fn device_fingerprint(&self) -> presence_core::Result<DeviceFingerprint> {
        Err(PresenceError::permission_denied("fingerprint unavailable"))
    }
}

#[tokio::test]
async fn unknown_device_is_not_anchored() {
    let f = fixture();
    f.store.anchor(&h1(), &d1(), None, None).await.unwrap();

    let blind = DeviceAnchorStore::new(
        Arc::new(f.storage.clone()),
        Arc::new(f.backend.clone()),
        Arc::new(NoFingerprint),
        Arc::new(SeededRandom::new(42)),
        &f.config,
    )
    .unwrap();
    assert!(blind.load().await.unwrap().is_some());
    assert!(!blind.is_anchored().await);
}

#[tokio::test]
async fn local_write_failure_is_reported() {
    let f = fixture();
    f.storage.set_fail_writes(true);
    let err = f.store.anchor(&h1(), &d1(), None, None).await.unwrap_err();
    assert_matches!(err, AnchorError::Storage(_));
}

#[tokio::test]
async fn empty_inputs_are_rejected() {
    let f = fixture();
    let err = f
        .store
        .anchor(&IdentityHash::new(""), &d1(), None, None)
        .await
        .unwrap_err();
    assert_matches!(err, AnchorError::Invalid { .. });
}

#[tokio::test]
async fn privileged_device_counts_as_anchored_only_when_listed() {
    let backend = MockIdentityBackend::new();
    let mut config = test_config().anchor;
    config.privileged_devices = vec![PrivilegedDevicePolicy::digest_of(&d1())];
    let store = store_with(config, Arc::new(MemoryStorage::new()), &backend);

    assert!(store.is_privileged_device().await);
    assert!(store.is_anchored().await);
    assert!(!fixture().store.is_privileged_device().await);
}

#[tokio::test]
async fn filesystem_storage_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let backend = MockIdentityBackend::new();
    let storage = Arc::new(FilesystemStorageHandler::new(dir.path().to_path_buf()));
    let store = store_with(test_config().anchor, storage.clone(), &backend);

    store.anchor(&h1(), &d1(), None, None).await.unwrap();
    let reopened = store_with(test_config().anchor, storage, &backend);
    assert!(reopened.is_anchored().await);

    let leftovers: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty());
}
