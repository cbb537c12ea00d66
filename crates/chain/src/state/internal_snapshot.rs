//! # State Snapshot Export / Import
//!
//! ```text
//! {dir}/
//! ├── state.bin        : bincode(ChainState)
//! └── metadata.json    : SnapshotMetadata (height, time, context weight, state_root)
//! ```
//!
//! Body memakai bincode karena index ber-key tuple tidak bisa direpresentasikan
//! sebagai object JSON. Metadata tetap JSON agar bisa dibaca operator.
//!
//! ## Verifikasi saat import
//!
//! 1. Decode `state.bin`
//! 2. Hitung ulang `compute_state_root()`
//! 3. Bandingkan dengan `metadata.state_root`; beda → error, state tidak dipakai
//! 4. Config di dalam state harus lolos `validate()`
//! 5. `total_active_disciplines_reward_weight` dihitung ulang dari discipline
//!    (tercakup root); nilai di metadata yang berbeda → error

use std::fs;
use std::path::Path;

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{ChainState, LedgerContext};
use crate::error::{LedgerError, Result};
use crate::types::Hash;

pub const SNAPSHOT_STATE_FILE: &str = "state.bin";
pub const SNAPSHOT_METADATA_FILE: &str = "metadata.json";

/// Metadata satu snapshot, disimpan sebagai `metadata.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SnapshotMetadata {
    /// `ctx.head_block_num` saat snapshot dibuat.
    pub height: u64,
    /// `ctx.time` saat snapshot dibuat.
    pub time: u64,
    /// Informatif saja: import menghitung ulang nilai ini dari discipline.
    pub total_active_disciplines_reward_weight: u64,
    /// Root dari state yang di-export. CONSENSUS-CRITICAL untuk verifikasi.
    pub state_root: Hash,
}

impl ChainState {
    /// Jumlah `total_active_reward_weight` seluruh discipline, yaitu nilai
    /// yang selalu dijaga sama dengan `ctx.total_active_disciplines_reward_weight`.
    pub fn active_disciplines_reward_weight(&self) -> Result<u64> {
        self.disciplines.values().try_fold(0u64, |acc, d| {
            acc.checked_add(d.total_active_reward_weight)
                .ok_or(LedgerError::Overflow("total_active_disciplines_reward_weight"))
        })
    }

    /// Tulis snapshot ke `dir` (dibuat jika belum ada).
    pub fn export_snapshot(&self, ctx: &LedgerContext, dir: &Path) -> anyhow::Result<SnapshotMetadata> {
        fs::create_dir_all(dir).with_context(|| format!("creating snapshot dir {}", dir.display()))?;

        let metadata = SnapshotMetadata {
            height: ctx.head_block_num,
            time: ctx.time,
            total_active_disciplines_reward_weight: ctx.total_active_disciplines_reward_weight,
            state_root: self.compute_state_root()?,
        };

        let body = bincode::serialize(self).context("encoding snapshot state")?;
        fs::write(dir.join(SNAPSHOT_STATE_FILE), body).context("writing snapshot state")?;
        let meta = serde_json::to_string_pretty(&metadata).context("encoding snapshot metadata")?;
        fs::write(dir.join(SNAPSHOT_METADATA_FILE), meta).context("writing snapshot metadata")?;

        info!(height = metadata.height, state_root = %metadata.state_root, dir = %dir.display(), "snapshot exported");
        Ok(metadata)
    }

    /// Baca snapshot dari `dir` dan verifikasi state root-nya.
    pub fn import_snapshot(dir: &Path) -> anyhow::Result<(ChainState, LedgerContext, SnapshotMetadata)> {
        let meta_raw = fs::read_to_string(dir.join(SNAPSHOT_METADATA_FILE))
            .with_context(|| format!("reading {} in {}", SNAPSHOT_METADATA_FILE, dir.display()))?;
        let metadata: SnapshotMetadata = serde_json::from_str(&meta_raw).context("parsing snapshot metadata")?;

        let body = fs::read(dir.join(SNAPSHOT_STATE_FILE))
            .with_context(|| format!("reading {} in {}", SNAPSHOT_STATE_FILE, dir.display()))?;
        let state: ChainState = bincode::deserialize(&body).context("decoding snapshot state")?;

        let root = state.compute_state_root()?;
        if root != metadata.state_root {
            bail!("snapshot state root mismatch: metadata {}, computed {}", metadata.state_root, root);
        }

        state.config.validate().context("snapshot config")?;

        let weight = state.active_disciplines_reward_weight()?;
        if weight != metadata.total_active_disciplines_reward_weight {
            bail!(
                "snapshot context weight mismatch: metadata {}, disciplines {}",
                metadata.total_active_disciplines_reward_weight,
                weight
            );
        }

        let ctx = LedgerContext {
            time: metadata.time,
            head_block_num: metadata.height,
            total_active_disciplines_reward_weight: weight,
        };
        info!(height = metadata.height, state_root = %root, "snapshot imported");
        Ok((state, ctx, metadata))
    }
}
