//! PBX configuration management for the AVRD control plane.
//!
//! Keeps Asterisk text configuration in sync with the database through
//! marker-delimited blocks: each phone, inbound number, and trunk owns
//! exactly one `; BEGIN <kind>-<id>` / `; END <kind>-<id>` region inside
//! `extensions.conf` or `pjsip.conf`. Writes are idempotent read-modify-write
//! cycles guarded by a per-file lock; after every change the affected
//! Asterisk module is reloaded over ARI.
//!
//! The file on disk is the source of truth. A failed reload is logged and
//! swallowed — the next reload or PBX restart picks the change up — and
//! deprovisioning never fails destructively.

mod ari;
mod blocks;
mod error;
mod writer;

pub use ari::{AriClient, AriConfig};
pub use blocks::{NumberEntry, PhoneEntry, TrunkEntry};
pub use error::PbxError;
pub use writer::{ConfigWriter, PbxPaths};

use async_trait::async_trait;

/// Asterisk module owning the dial-plan (`extensions.conf`).
pub const DIALPLAN_MODULE: &str = "pbx_config.so";

/// Asterisk module owning SIP endpoints and trunks (`pjsip.conf`).
pub const PJSIP_MODULE: &str = "res_pjsip.so";

/// The PBX control-channel seam: ask the switch to reload one module.
///
/// Implemented by [`AriClient`]; tests substitute a recorder.
#[async_trait]
pub trait ReloadModule: Send + Sync {
    async fn reload_module(&self, module: &str) -> Result<(), PbxError>;
}
