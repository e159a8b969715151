// Device anchor commands

use crate::commands::common::CliContext;
use clap::Subcommand;
use presence_anchor::DeviceAnchorStore;
use presence_core::{IdentityHash, PalmHash, PhoneRef};
use presence_effects::{
    FilesystemStorageHandler, OfflineIdentityBackend, RealRandomHandler, StaticDeviceFingerprint,
};
use serde::Serialize;
use std::sync::Arc;

/// Device anchor maintenance.
#[derive(Subcommand)]
pub enum AnchorCommand {
    /// Show whether this device is anchored
    Status,
    /// Anchor an identity to this device
    Set {
        /// Identity hash
        #[arg(long)]
        identity: String,

        /// Phone number or account reference for recovery lookups
        #[arg(long)]
        phone: Option<String>,

        /// Enrolled palm hash
        #[arg(long)]
        palm: Option<String>,
    },
    /// Delete the local anchor record
    Clear,
    /// Rebuild the anchor from the identity backend
    Recover,
}

/// JSON report printed by `presence anchor`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum AnchorReport {
    /// Current anchor state
    Status {
        /// Device fingerprint in use
        device: String,
        /// A sealed record opens for this device
        anchored: bool,
        /// Device is on the privileged allow-list
        privileged_device: bool,
        /// Short prefix only
        identity: Option<String>,
    },
    /// Anchor written
    Set {
        /// Hex token of the new binding
        token: String,
    },
    /// Anchor removed
    Clear,
    /// Deep recovery attempted
    Recover {
        /// The backend record restored the anchor
        recovered: bool,
    },
}

/// Anchor store over the filesystem; no identity backend is configured for
/// the CLI, so pointer mirroring is skipped and recovery finds nothing.
pub fn open_store(ctx: &CliContext) -> anyhow::Result<DeviceAnchorStore> {
    Ok(DeviceAnchorStore::new(
        Arc::new(FilesystemStorageHandler::new(ctx.data_dir.clone())),
        Arc::new(OfflineIdentityBackend::new()),
        Arc::new(StaticDeviceFingerprint::new(ctx.device.clone())),
        Arc::new(RealRandomHandler::new()),
        &ctx.config.anchor,
    )?)
}

/// Run one `anchor` subcommand against the data directory.
pub async fn handle_anchor_command(
    cmd: AnchorCommand,
    ctx: &CliContext,
) -> anyhow::Result<AnchorReport> {
    let store = open_store(ctx)?;
    match cmd {
        AnchorCommand::Status => Ok(AnchorReport::Status {
            device: ctx.device.to_string(),
            anchored: store.is_anchored().await,
            privileged_device: store.is_privileged_device().await,
            identity: store
                .anchored_identity()
                .await
                .map(|identity| identity.short().to_string()),
        }),
        AnchorCommand::Set {
            identity,
            phone,
            palm,
        } => {
            let token = store
                .anchor(
                    &IdentityHash::new(identity),
                    &ctx.device,
                    phone.map(PhoneRef::new),
                    palm.map(PalmHash::new),
                )
                .await?;
            Ok(AnchorReport::Set {
                token: token.as_str().to_string(),
            })
        }
        AnchorCommand::Clear => {
            store.clear().await?;
            Ok(AnchorReport::Clear)
        }
        AnchorCommand::Recover => Ok(AnchorReport::Recover {
            recovered: store.recover(&ctx.device).await?,
        }),
    }
}
