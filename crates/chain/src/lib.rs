//! # Sciledger Chain Core Library
//!
//! State-transition core deterministik untuk ledger keahlian ilmiah:
//! account & common tokens, expert token per discipline, voting/reward-weight
//! engine, research hierarchy, dan reward distribution.
//!
//! ## Module Overview
//!
//! | Module | Fungsi |
//! |--------|--------|
//! | `types` | AccountName, PublicKey, Authority, Hash, id aliases, konstanta persen |
//! | `asset` | Symbol, Asset, Price (fixed-point, simbol dicek) |
//! | `config` | ProtocolConfig: default → TOML `[ledger]` → env `SCILEDGER_*` |
//! | `error` | LedgerError (thiserror), satu variant per kegagalan |
//! | `reward_curve` | power1.5 curve, reverse auction decay, calculate_share |
//! | `operation` | Operation (24 evaluator) & VirtualOp |
//! | `state` | ChainState: store, evaluator, maintenance, reward pass, state root |
//!
//! ## Alur Per Blok
//!
//! ```text
//! for tx in block:
//!     state.apply_transaction(&mut ctx, &tx.operations)   // all-or-nothing
//! state.process_grants(&ctx)
//! state.process_block(&mut ctx)                            // maintenance pass
//! state.distribute_reward(&ctx, &budget)                   // dipanggil scheduler
//! ```
//!
//! ## Consensus-Critical Components
//!
//! - Urutan langkah di setiap evaluator (`# Langkah (URUT - CONSENSUS-CRITICAL)`)
//! - Aritmatika curve & share (u128, narrowing checked)
//! - Urutan store di `compute_state_root`
//!
//! ## Di Luar Core
//!
//! Verifikasi signature, block production, networking, dan persistence
//! jangka panjang ada di luar crate ini. `Operation::required_authorities`
//! memberi tahu layer luar authority mana yang harus diverifikasi.
//!
//! ## Usage Example
//!
//! ```text
//! let mut ledger = Ledger::from_genesis(ProtocolConfig::load()?, &genesis)?;
//! ledger.apply_transaction(&[op])?;
//! let vops = ledger.end_block(3)?;
//! ```

pub mod asset;
pub mod config;
pub mod error;
pub mod operation;
pub mod reward_curve;
pub mod state;
pub mod types;

use tracing::debug;

pub use asset::{Asset, Price, Symbol, PRIMARY_SYMBOL};
pub use config::ProtocolConfig;
pub use error::{LedgerError, Result};
pub use operation::{Operation, RequiredAuthorities, VirtualOp};
pub use state::{ChainState, Genesis, LedgerContext, RewardReport};
pub use types::{AccountName, Authority, Hash, PublicKey};

// ════════════════════════════════════════════════════════════════════════════
// LEDGER
// ════════════════════════════════════════════════════════════════════════════
//
// Pasangan ChainState + LedgerContext. Caller yang tidak ingin mengelola
// context sendiri memakai struct ini; semua logic tetap di ChainState.
//
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct Ledger {
    pub state: ChainState,
    pub ctx: LedgerContext,
}

impl Ledger {
    pub fn new(config: ProtocolConfig, ctx: LedgerContext) -> Result<Self> {
        Ok(Self { state: ChainState::new(config)?, ctx })
    }

    pub fn from_genesis(config: ProtocolConfig, genesis: &Genesis) -> Result<Self> {
        let (state, ctx) = ChainState::from_genesis(config, genesis)?;
        Ok(Self { state, ctx })
    }

    pub fn apply_operation(&mut self, op: &Operation) -> Result<Vec<VirtualOp>> {
        self.state.apply_operation(&mut self.ctx, op)
    }

    pub fn apply_transaction(&mut self, operations: &[Operation]) -> Result<Vec<VirtualOp>> {
        self.state.apply_transaction(&mut self.ctx, operations)
    }

    /// Tutup blok: maju `seconds`, bayar grant, jalankan maintenance.
    pub fn end_block(&mut self, seconds: u64) -> Result<Vec<VirtualOp>> {
        self.ctx.advance(seconds);
        let mut ops = self.state.process_grants(&self.ctx)?;
        ops.extend(self.state.process_block(&mut self.ctx)?);
        debug!(block = self.ctx.head_block_num, time = self.ctx.time, virtual_ops = ops.len(), "block closed");
        Ok(ops)
    }

    pub fn distribute_reward(&mut self, budget: &Asset) -> Result<RewardReport> {
        self.state.distribute_reward(&self.ctx, budget)
    }

    pub fn state_root(&self) -> Result<Hash> {
        self.state.compute_state_root()
    }
}
