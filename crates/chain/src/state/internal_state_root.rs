//! # State Root
//!
//! Root = SHA3-512 atas seluruh store, diurutkan tetap:
//!
//! ```text
//! for store in STORE_ORDER:
//!     hasher ← tag(store) || len(bytes) || bincode(store)
//! ```
//!
//! Semua store adalah `BTreeMap`/`BTreeSet`, sehingga encoding bincode
//! sudah berurutan key tanpa sorting tambahan. `config` tidak ikut di-hash:
//! root hanya mencakup data ledger.
//!
//! Dua state dengan data yang sama SELALU menghasilkan root yang sama;
//! urutan store di bawah ini consensus-critical.

use serde::Serialize;
use sha3::{Digest, Sha3_512};

use super::ChainState;
use crate::error::{LedgerError, Result};
use crate::types::Hash;

fn absorb<T: Serialize + ?Sized>(hasher: &mut Sha3_512, tag: &str, store: &T) -> Result<()> {
    let bytes = bincode::serialize(store).map_err(|e| LedgerError::Serialization(e.to_string()))?;
    hasher.update(tag.as_bytes());
    hasher.update((bytes.len() as u64).to_be_bytes());
    hasher.update(&bytes);
    Ok(())
}

impl ChainState {
    pub fn compute_state_root(&self) -> Result<Hash> {
        let mut hasher = Sha3_512::new();

        // accounts
        absorb(&mut hasher, "accounts", &self.accounts)?;
        absorb(&mut hasher, "authorities", &self.authorities)?;
        absorb(&mut hasher, "owner_history", &self.owner_history)?;
        absorb(&mut hasher, "recovery_requests", &self.recovery_requests)?;
        absorb(&mut hasher, "change_recovery_requests", &self.change_recovery_requests)?;

        // common tokens
        absorb(&mut hasher, "withdraw_routes", &self.withdraw_routes)?;
        absorb(&mut hasher, "delegations", &self.delegations)?;
        absorb(&mut hasher, "expiring_delegations", &self.expiring_delegations)?;

        // expertise & votes
        absorb(&mut hasher, "expert_tokens", &self.expert_tokens)?;
        absorb(&mut hasher, "votes", &self.votes)?;
        absorb(&mut hasher, "review_votes", &self.review_votes)?;
        absorb(&mut hasher, "total_votes", &self.total_votes)?;

        // research hierarchy
        absorb(&mut hasher, "disciplines", &self.disciplines)?;
        absorb(&mut hasher, "research_groups", &self.research_groups)?;
        absorb(&mut hasher, "group_tokens", &self.group_tokens)?;
        absorb(&mut hasher, "researches", &self.researches)?;
        absorb(&mut hasher, "research_contents", &self.research_contents)?;
        absorb(&mut hasher, "reviews", &self.reviews)?;
        absorb(&mut hasher, "research_tokens", &self.research_tokens)?;
        absorb(&mut hasher, "reviews_by_content", &self.reviews_by_content)?;
        absorb(&mut hasher, "group_permlinks", &self.group_permlinks)?;
        absorb(&mut hasher, "research_permlinks", &self.research_permlinks)?;
        absorb(&mut hasher, "content_permlinks", &self.content_permlinks)?;

        // witness
        absorb(&mut hasher, "witnesses", &self.witnesses)?;
        absorb(&mut hasher, "witness_votes", &self.witness_votes)?;

        // grants & proposals
        absorb(&mut hasher, "grants", &self.grants)?;
        absorb(&mut hasher, "proposals", &self.proposals)?;

        absorb(&mut hasher, "next_ids", &self.next_ids)?;

        let digest = hasher.finalize();
        let mut out = [0u8; 64];
        out.copy_from_slice(&digest);
        Ok(Hash::from_bytes(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::Asset;
    use crate::types::AccountName;

    #[test]
    fn test_state_root_deterministic() {
        let a = ChainState::default();
        let b = ChainState::default();
        assert_eq!(a.compute_state_root().unwrap(), b.compute_state_root().unwrap());
    }

    #[test]
    fn test_state_root_changes_with_balance() {
        let mut state = ChainState::default();
        let name = AccountName::new("alice").unwrap();
        state.accounts.insert(
            name.clone(),
            crate::state::Account::new(name.clone(), Default::default(), 0),
        );
        let before = state.compute_state_root().unwrap();
        if let Some(acc) = state.accounts.get_mut(&name) {
            acc.balance = Asset::primary(5);
        }
        assert_ne!(before, state.compute_state_root().unwrap());
    }

    #[test]
    fn test_state_root_ignores_config() {
        let a = ChainState::default();
        let mut b = ChainState::default();
        b.config.max_withdraw_routes += 1;
        assert_eq!(a.compute_state_root().unwrap(), b.compute_state_root().unwrap());
    }
}
