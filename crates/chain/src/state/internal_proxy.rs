//! # Proxy Graph (witness-vote weight propagation)
//!
//! Setiap account bisa menyerahkan bobot witness-vote ke satu proxy.
//! Bobot dipropagasi ke atas rantai dengan loop terbatas; tidak ada rekursi.
//!
//! ```text
//! alice ──proxy──▶ bob ──proxy──▶ carol (self) ──votes──▶ witness W
//!   depth 0          slot[0] += Δ     slot[1] += Δ            W.votes += Σ residu
//! ```
//!
//! - Di account tanpa proxy, residu diteruskan ke tally setiap witness yang di-approve.
//! - Pada depth `MAX_PROXY_RECURSION_DEPTH`, residu dibuang.
//!
//! Semua perhitungan menghasilkan `ProxyEffects` (delta murni) di fase validate;
//! fase apply hanya menjumlahkan delta ke store.

use std::collections::{BTreeMap, BTreeSet};

use super::ChainState;
use crate::error::{LedgerError, Result};
use crate::types::{AccountName, ShareType, MAX_PROXY_RECURSION_DEPTH};

/// Array delta bertanda per depth. Index 0 = stake milik account itu sendiri.
pub type ProxyDelta = [ShareType; MAX_PROXY_RECURSION_DEPTH + 1];

/// Akumulasi delta dari satu atau lebih propagasi proxy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProxyEffects {
    /// account → delta per slot `proxied_vsf_votes`
    pub proxied: BTreeMap<AccountName, [ShareType; MAX_PROXY_RECURSION_DEPTH]>,
    /// witness → delta `votes`
    pub witness_votes: BTreeMap<AccountName, ShareType>,
}

impl ProxyEffects {
    pub fn is_empty(&self) -> bool {
        self.proxied.is_empty() && self.witness_votes.is_empty()
    }
}

/// Plan untuk `account_witness_proxy`.
#[derive(Debug, Clone)]
pub(crate) struct ProxyPlan {
    pub account: AccountName,
    pub new_proxy: Option<AccountName>,
    pub effects: ProxyEffects,
    /// Witness vote milik account yang dihapus (hanya saat proxy diset).
    pub cleared_votes: Vec<AccountName>,
}

impl ChainState {
    /// Propagasi `delta` mulai dari `start`, memakai `start_proxy` sebagai
    /// proxy milik `start` (bisa berbeda dari nilai tersimpan saat proxy sedang diganti).
    ///
    /// # Langkah (URUT - CONSENSUS-CRITICAL)
    ///
    /// Untuk setiap level `depth`:
    /// 1. Account punya proxy dan `depth >= MAX` → berhenti, residu dibuang
    /// 2. Account punya proxy → `proxy.proxied[i + depth] += delta[i]` untuk `i < MAX - depth`, naik satu level
    /// 3. Account tanpa proxy → `Σ delta[0..=MAX - depth]` ke semua witness yang di-approve
    pub(crate) fn collect_proxied_witness_votes(
        &self,
        start: &AccountName,
        start_proxy: Option<&AccountName>,
        delta: &ProxyDelta,
        effects: &mut ProxyEffects,
    ) -> Result<()> {
        let mut current = start.clone();
        let mut proxy = start_proxy.cloned();
        let mut depth = 0usize;

        loop {
            match proxy {
                Some(proxy_name) => {
                    if depth >= MAX_PROXY_RECURSION_DEPTH {
                        return Ok(());
                    }
                    let next = self.get_account(&proxy_name)?;
                    let slots = effects
                        .proxied
                        .entry(proxy_name.clone())
                        .or_insert([0; MAX_PROXY_RECURSION_DEPTH]);
                    for i in 0..(MAX_PROXY_RECURSION_DEPTH - depth) {
                        slots[i + depth] += delta[i];
                    }
                    proxy = next.proxy.clone();
                    current = proxy_name;
                    depth += 1;
                }
                None => {
                    let total: ShareType = delta[..=(MAX_PROXY_RECURSION_DEPTH - depth)].iter().sum();
                    if total != 0 {
                        for witness in self.witnesses_voted_by(&current) {
                            *effects.witness_votes.entry(witness.clone()).or_insert(0) += total;
                        }
                    }
                    return Ok(());
                }
            }
        }
    }

    /// Versi satu nilai: perubahan stake milik `account` sendiri.
    pub(crate) fn collect_single_proxied_delta(
        &self,
        account: &AccountName,
        amount: ShareType,
        effects: &mut ProxyEffects,
    ) -> Result<()> {
        let acc = self.get_account(account)?;
        let mut delta: ProxyDelta = [0; MAX_PROXY_RECURSION_DEPTH + 1];
        delta[0] = amount;
        self.collect_proxied_witness_votes(account, acc.proxy.as_ref(), &delta, effects)
    }

    /// Tulis hasil propagasi ke store. Infallible.
    pub(crate) fn apply_proxy_effects(&mut self, effects: &ProxyEffects) {
        for (name, slots) in &effects.proxied {
            if let Some(acc) = self.accounts.get_mut(name) {
                for (slot, d) in acc.proxied_vsf_votes.iter_mut().zip(slots.iter()) {
                    *slot = slot.saturating_add(*d);
                }
            }
        }
        for (owner, d) in &effects.witness_votes {
            if let Some(witness) = self.witnesses.get_mut(owner) {
                witness.votes = witness.votes.saturating_add(*d);
            }
        }
    }

    // ════════════════════════════════════════════════════════════════════
    // account_witness_proxy
    // ════════════════════════════════════════════════════════════════════

    /// # Langkah (URUT - CONSENSUS-CRITICAL)
    ///
    /// 1. Bangun delta bertanda: `[-common_tokens, -proxied[0], ..., -proxied[MAX-1]]`
    /// 2. Hapus bobot account dari rantai lama
    /// 3. Telusuri rantai proxy baru: tolak loop (`ProxyLoop`) dan rantai > MAX (`ProxyChainTooLong`)
    /// 4. Hapus witness vote milik account sendiri
    /// 5. Terapkan ulang delta dengan tanda dibalik mulai dari proxy baru
    pub(crate) fn validate_account_witness_proxy(
        &self,
        account: &AccountName,
        proxy: Option<&AccountName>,
    ) -> Result<ProxyPlan> {
        let acc = self.get_account(account)?;
        if acc.proxy.as_ref() == proxy {
            return Err(LedgerError::ProxyUnchanged);
        }

        // 1. delta
        let mut delta: ProxyDelta = [0; MAX_PROXY_RECURSION_DEPTH + 1];
        delta[0] = -acc.common_tokens;
        for i in 0..MAX_PROXY_RECURSION_DEPTH {
            delta[i + 1] = -acc.proxied_vsf_votes[i];
        }

        // 3. loop check dulu supaya tidak ada kerja sia-sia
        if let Some(new_proxy) = proxy {
            self.check_proxy_chain(account, new_proxy)?;
        }

        // 2. keluarkan dari rantai lama
        let mut effects = ProxyEffects::default();
        self.collect_proxied_witness_votes(account, acc.proxy.as_ref(), &delta, &mut effects)?;

        // 4. witness vote sendiri dihapus hanya kalau proxy diset
        let cleared_votes: Vec<AccountName> = match proxy {
            Some(_) => self.witnesses_voted_by(account).cloned().collect(),
            None => Vec::new(),
        };

        // 5. masuk ke rantai baru
        let flipped: ProxyDelta = delta.map(|d| -d);
        self.collect_proxied_witness_votes(account, proxy, &flipped, &mut effects)?;

        Ok(ProxyPlan { account: account.clone(), new_proxy: proxy.cloned(), effects, cleared_votes })
    }

    pub(crate) fn apply_account_witness_proxy(&mut self, plan: ProxyPlan) {
        self.apply_proxy_effects(&plan.effects);
        if !plan.cleared_votes.is_empty() {
            self.witness_votes.remove(&plan.account);
        }
        if let Some(acc) = self.accounts.get_mut(&plan.account) {
            if !plan.cleared_votes.is_empty() {
                acc.witnesses_voted_for = 0;
            }
            acc.proxy = plan.new_proxy;
        }
    }

    /// Rantai {account, new_proxy, new_proxy.proxy, ...} harus unik dan
    /// panjangnya ≤ `MAX_PROXY_RECURSION_DEPTH`.
    fn check_proxy_chain(&self, account: &AccountName, new_proxy: &AccountName) -> Result<()> {
        if account == new_proxy {
            return Err(LedgerError::ProxyLoop);
        }
        let mut chain: BTreeSet<&AccountName> = BTreeSet::new();
        chain.insert(account);
        chain.insert(new_proxy);

        let mut cursor = self.get_account(new_proxy)?;
        while let Some(next_name) = cursor.proxy.as_ref() {
            let next = self.get_account(next_name)?;
            if !chain.insert(&next.name) {
                return Err(LedgerError::ProxyLoop);
            }
            if chain.len() > MAX_PROXY_RECURSION_DEPTH {
                return Err(LedgerError::ProxyChainTooLong);
            }
            cursor = next;
        }
        Ok(())
    }
}
