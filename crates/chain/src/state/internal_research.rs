//! # Research Hierarchy
//!
//! | Operasi | Syarat | Efek |
//! |---------|--------|------|
//! | `create_research_group` | permlink unik global | creator memegang 100% group token |
//! | `create_research` | creator anggota group | `owned_tokens = 100%` |
//! | `create_research_content` | authors & references ada | content active selama activity window |
//! | `transfer_research_tokens` | anggota group / holder | token research berpindah |
//!
//! Group token dan research token memakai basis `PERCENT_100`.

use std::collections::BTreeSet;

use tracing::debug;

use super::{ActivityState, ChainState, ContentType, LedgerContext, Research, ResearchContent, ResearchGroup};
use crate::error::{LedgerError, Result};
use crate::types::{AccountName, ContentId, DisciplineId, ResearchGroupId, ResearchId, PERCENT_100};

pub const MAX_PERMLINK_LENGTH: usize = 256;

/// Permlink: 1..256 karakter `[a-z0-9-]`.
pub fn validate_permlink(permlink: &str) -> Result<()> {
    let ok = !permlink.is_empty()
        && permlink.len() < MAX_PERMLINK_LENGTH
        && permlink.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-');
    if !ok {
        return Err(LedgerError::InvalidPermlink(permlink.to_string()));
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub(crate) struct ResearchTokenTransferPlan {
    pub research_id: ResearchId,
    pub sender: AccountName,
    pub receiver: AccountName,
    pub amount: u16,
    pub from_research_owned: bool,
}

impl ChainState {
    fn check_group_member(&self, group_id: ResearchGroupId, account: &AccountName) -> Result<()> {
        self.get_research_group(group_id)?;
        if self.group_token_amount(group_id, account) == 0 {
            return Err(LedgerError::NotGroupMember { account: account.clone(), group: group_id });
        }
        Ok(())
    }

    // ════════════════════════════════════════════════════════════════════
    // create_research_group
    // ════════════════════════════════════════════════════════════════════

    pub(crate) fn validate_create_research_group(
        &self,
        creator: &AccountName,
        name: &str,
        permlink: &str,
        description: &str,
        quorum_percent: u16,
    ) -> Result<ResearchGroup> {
        self.check_account_existence(creator)?;
        validate_permlink(permlink)?;
        if quorum_percent == 0 || quorum_percent > PERCENT_100 {
            return Err(LedgerError::InvalidPercent(quorum_percent));
        }
        if self.group_permlinks.contains_key(permlink) {
            return Err(LedgerError::DuplicatePermlink(permlink.to_string()));
        }
        Ok(ResearchGroup {
            id: self.next_ids.research_group,
            name: name.to_string(),
            permlink: permlink.to_string(),
            description: description.to_string(),
            quorum_percent,
            total_tokens: PERCENT_100 as u32,
            balance: 0,
        })
    }

    pub(crate) fn apply_create_research_group(&mut self, creator: &AccountName, group: ResearchGroup) {
        let id = group.id;
        self.next_ids.research_group += 1;
        self.group_permlinks.insert(group.permlink.clone(), id);
        self.group_tokens.entry(id).or_default().insert(creator.clone(), group.total_tokens);
        self.research_groups.insert(id, group);
        debug!(group_id = id, creator = %creator, "research group created");
    }

    // ════════════════════════════════════════════════════════════════════
    // create_research
    // ════════════════════════════════════════════════════════════════════

    /// `review_share_in_percent` dibatasi agar reviews + references + curators ≤ 100%.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn validate_create_research(
        &self,
        ctx: &LedgerContext,
        creator: &AccountName,
        research_group_id: ResearchGroupId,
        title: &str,
        abstract_text: &str,
        permlink: &str,
        review_share_in_percent: u16,
        disciplines: &[DisciplineId],
    ) -> Result<Research> {
        self.check_group_member(research_group_id, creator)?;
        validate_permlink(permlink)?;
        if self.research_permlinks.contains_key(&(research_group_id, permlink.to_string())) {
            return Err(LedgerError::DuplicatePermlink(permlink.to_string()));
        }

        let max_review_share = PERCENT_100
            .saturating_sub(self.config.references_reward_share)
            .saturating_sub(self.config.curators_reward_share);
        if review_share_in_percent > max_review_share {
            return Err(LedgerError::InvalidPercent(review_share_in_percent));
        }

        if disciplines.is_empty() {
            return Err(LedgerError::InvalidOperation("research must have at least one discipline".into()));
        }
        for d in disciplines {
            self.get_discipline(*d)?;
        }

        Ok(Research {
            id: self.next_ids.research,
            research_group_id,
            title: title.to_string(),
            abstract_text: abstract_text.to_string(),
            permlink: permlink.to_string(),
            owned_tokens: PERCENT_100,
            review_share_in_percent,
            disciplines: disciplines.iter().copied().collect::<BTreeSet<_>>(),
            created_at: ctx.time,
        })
    }

    pub(crate) fn apply_create_research(&mut self, research: Research) {
        let id = research.id;
        self.next_ids.research += 1;
        self.research_permlinks.insert((research.research_group_id, research.permlink.clone()), id);
        debug!(research_id = id, group_id = research.research_group_id, "research created");
        self.researches.insert(id, research);
    }

    // ════════════════════════════════════════════════════════════════════
    // create_research_content
    // ════════════════════════════════════════════════════════════════════

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn validate_create_research_content(
        &self,
        ctx: &LedgerContext,
        creator: &AccountName,
        research_id: ResearchId,
        content_type: ContentType,
        title: &str,
        content: &str,
        permlink: &str,
        authors: &[AccountName],
        references: &[ContentId],
        external_references: &[String],
    ) -> Result<ResearchContent> {
        let research = self.get_research(research_id)?;
        self.check_group_member(research.research_group_id, creator)?;
        validate_permlink(permlink)?;
        if self.content_permlinks.contains_key(&(research_id, permlink.to_string())) {
            return Err(LedgerError::DuplicatePermlink(permlink.to_string()));
        }
        if authors.is_empty() {
            return Err(LedgerError::InvalidOperation("research content must have at least one author".into()));
        }
        for author in authors {
            self.check_account_existence(author)?;
        }
        for reference in references {
            self.get_research_content(*reference)?;
        }

        let mut unique_authors: Vec<AccountName> = Vec::with_capacity(authors.len());
        for author in authors {
            if !unique_authors.contains(author) {
                unique_authors.push(author.clone());
            }
        }

        Ok(ResearchContent {
            id: self.next_ids.research_content,
            research_id,
            content_type,
            title: title.to_string(),
            content: content.to_string(),
            permlink: permlink.to_string(),
            authors: unique_authors,
            references: references.to_vec(),
            external_references: external_references.to_vec(),
            created_at: ctx.time,
            activity_state: ActivityState::Active,
            activity_window_end: ctx.time.saturating_add(self.config.content_activity_window_seconds),
        })
    }

    pub(crate) fn apply_create_research_content(&mut self, content: ResearchContent) {
        let id = content.id;
        self.next_ids.research_content += 1;
        self.content_permlinks.insert((content.research_id, content.permlink.clone()), id);
        debug!(content_id = id, research_id = content.research_id, content_type = ?content.content_type, "research content created");
        self.research_contents.insert(id, content);
    }

    // ════════════════════════════════════════════════════════════════════
    // transfer_research_tokens
    // ════════════════════════════════════════════════════════════════════

    /// # Langkah
    ///
    /// - `from_research_owned`: sender anggota group, token diambil dari
    ///   `research.owned_tokens`
    /// - selain itu: sender harus memegang token research ≥ amount
    pub(crate) fn validate_transfer_research_tokens(
        &self,
        research_id: ResearchId,
        sender: &AccountName,
        receiver: &AccountName,
        amount: u16,
        from_research_owned: bool,
    ) -> Result<ResearchTokenTransferPlan> {
        if amount == 0 {
            return Err(LedgerError::NonPositiveAmount);
        }
        if amount > PERCENT_100 {
            return Err(LedgerError::InvalidPercent(amount));
        }
        let research = self.get_research(research_id)?;
        self.check_account_existence(sender)?;
        self.check_account_existence(receiver)?;

        let available = if from_research_owned {
            self.check_group_member(research.research_group_id, sender)?;
            research.owned_tokens
        } else {
            if sender == receiver {
                return Err(LedgerError::InvalidOperation("cannot transfer research tokens to self".into()));
            }
            self.research_token_amount(research_id, sender)
        };
        if available < amount {
            return Err(LedgerError::InsufficientResearchTokens { required: amount, available });
        }

        Ok(ResearchTokenTransferPlan {
            research_id,
            sender: sender.clone(),
            receiver: receiver.clone(),
            amount,
            from_research_owned,
        })
    }

    pub(crate) fn apply_transfer_research_tokens(&mut self, plan: ResearchTokenTransferPlan) {
        let holders = self.research_tokens.entry(plan.research_id).or_default();
        if plan.from_research_owned {
            if let Some(research) = self.researches.get_mut(&plan.research_id) {
                research.owned_tokens -= plan.amount;
            }
        } else if let Some(balance) = holders.get_mut(&plan.sender) {
            *balance -= plan.amount;
            if *balance == 0 {
                holders.remove(&plan.sender);
            }
        }
        *holders.entry(plan.receiver.clone()).or_insert(0) += plan.amount;
        debug!(
            research_id = plan.research_id,
            sender = %plan.sender,
            receiver = %plan.receiver,
            amount = plan.amount,
            "research tokens transferred"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_permlink() {
        assert!(validate_permlink("quantum-gravity-2").is_ok());
        assert!(validate_permlink("").is_err());
        assert!(validate_permlink("Upper").is_err());
        assert!(validate_permlink("with space").is_err());
        assert!(validate_permlink(&"a".repeat(MAX_PERMLINK_LENGTH)).is_err());
    }
}
