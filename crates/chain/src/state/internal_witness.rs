//! Witness registry & approval votes

use tracing::debug;

use super::{ChainProperties, ChainState, LedgerContext, Witness};
use crate::asset::PRIMARY_SYMBOL;
use crate::error::{LedgerError, Result};
use crate::types::{AccountName, PublicKey, ShareType};

#[derive(Debug, Clone)]
pub(crate) struct WitnessVotePlan {
    pub account: AccountName,
    pub witness: AccountName,
    pub approve: bool,
    pub weight: ShareType,
}

impl ChainState {
    /// Witness dengan vote terbanyak; seri dipecah dengan nama terkecil.
    pub fn get_top_witness(&self) -> Result<&Witness> {
        self.witnesses
            .values()
            .max_by(|a, b| a.votes.cmp(&b.votes).then_with(|| b.owner.cmp(&a.owner)))
            .ok_or(LedgerError::NoTopWitness)
    }

    pub(crate) fn validate_witness_update(
        &self,
        owner: &AccountName,
        url: &str,
        props: &ChainProperties,
    ) -> Result<()> {
        self.check_account_existence(owner)?;
        if url.len() > self.config.max_witness_url_length {
            return Err(LedgerError::WitnessUrlTooLong);
        }
        props.account_creation_fee.ensure_symbol(PRIMARY_SYMBOL)?;
        if props.account_creation_fee.amount < 0 {
            return Err(LedgerError::NonPositiveAmount);
        }
        Ok(())
    }

    /// Buat witness baru atau perbarui url/key/props. Tally vote dipertahankan.
    pub(crate) fn apply_witness_update(
        &mut self,
        ctx: &LedgerContext,
        owner: &AccountName,
        url: &str,
        block_signing_key: &PublicKey,
        props: &ChainProperties,
    ) {
        let witness = self.witnesses.entry(owner.clone()).or_insert_with(|| Witness {
            owner: owner.clone(),
            url: String::new(),
            signing_key: PublicKey::default(),
            props: ChainProperties::default(),
            votes: 0,
            created: ctx.time,
        });
        witness.url = url.to_string();
        witness.signing_key = block_signing_key.clone();
        witness.props = props.clone();
        debug!(witness = %owner, "witness updated");
    }

    /// # Langkah
    ///
    /// 1. Account dengan proxy aktif tidak boleh vote langsung (`ProxyIsSet`)
    /// 2. Approve: harus `can_vote`, belum ada vote, dan di bawah batas vote
    /// 3. Reject: vote harus ada
    pub(crate) fn validate_account_witness_vote(
        &self,
        account: &AccountName,
        witness: &AccountName,
        approve: bool,
    ) -> Result<WitnessVotePlan> {
        let voter = self.get_account(account)?;
        if voter.proxy.is_some() {
            return Err(LedgerError::ProxyIsSet);
        }
        self.get_witness(witness)?;
        let existing = self
            .witness_votes
            .get(account)
            .map(|set| set.contains(witness))
            .unwrap_or(false);

        if approve {
            if !voter.can_vote {
                return Err(LedgerError::VotingDeclined(account.clone()));
            }
            if existing {
                return Err(LedgerError::WitnessVoteExists);
            }
            if voter.witnesses_voted_for >= self.config.max_account_witness_votes {
                return Err(LedgerError::TooManyWitnessVotes(self.config.max_account_witness_votes));
            }
        } else if !existing {
            return Err(LedgerError::WitnessVoteNotFound);
        }

        Ok(WitnessVotePlan {
            account: account.clone(),
            witness: witness.clone(),
            approve,
            weight: voter.witness_vote_weight(),
        })
    }

    pub(crate) fn apply_account_witness_vote(&mut self, plan: WitnessVotePlan) {
        let WitnessVotePlan { account, witness, approve, weight } = plan;
        if let Some(w) = self.witnesses.get_mut(&witness) {
            w.votes = if approve { w.votes.saturating_add(weight) } else { w.votes.saturating_sub(weight) };
        }
        if let Some(acc) = self.accounts.get_mut(&account) {
            if approve {
                acc.witnesses_voted_for += 1;
            } else {
                acc.witnesses_voted_for = acc.witnesses_voted_for.saturating_sub(1);
            }
        }
        if approve {
            self.witness_votes.entry(account.clone()).or_default().insert(witness.clone());
        } else if let Some(set) = self.witness_votes.get_mut(&account) {
            set.remove(&witness);
            if set.is_empty() {
                self.witness_votes.remove(&account);
            }
        }
        debug!(account = %account, witness = %witness, approve, weight, "witness vote");
    }
}
