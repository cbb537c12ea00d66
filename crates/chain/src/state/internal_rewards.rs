//! # Reward Distribution Pass
//!
//! Budget dibagi turun bertingkat. Setiap pembagian memakai
//! `calculate_share` (floor, u128); sisa pembulatan tidak dibagi ulang dan
//! dilaporkan sebagai `unused`.
//!
//! ```text
//! budget
//!   └─ discipline     : total_active_reward_weight / ctx.total_active_disciplines_reward_weight
//!        └─ content   : tvo.total_research_reward_weight / discipline.total_active_research_reward_weight
//!             ├─ reviews        (research.review_share_in_percent)
//!             │    ├─ voters    (10%, vote.weight / curation weight)
//!             │    └─ author    (sisa, + expertise)
//!             ├─ references     (10%, rata per reference → token holders)
//!             ├─ curators       (5%, vote.weight / total_curators_reward_weight)
//!             └─ token holders  (sisa: group owned_tokens, holder amount)
//! ```
//!
//! Expertise yang diberikan ke author bukan uang dan tidak dihitung dalam
//! `distributed`.
//!
//! ## Atomicity
//!
//! Seluruh pembagian dihitung read-only ke dalam `RewardPlan`, baru kemudian
//! ditulis ke state. Error di tengah perhitungan tidak meninggalkan mutasi.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ChainState, LedgerContext, ResearchContent};
use crate::asset::{Asset, PRIMARY_SYMBOL};
use crate::error::{LedgerError, Result};
use crate::operation::VirtualOp;
use crate::reward_curve::{calculate_share, percent_share};
use crate::types::{AccountName, ContentId, DisciplineId, ResearchGroupId, ResearchId, ShareType, PERCENT_100};

/// Ringkasan satu reward pass. `distributed + unused == budget`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardReport {
    pub budget: ShareType,
    pub distributed: ShareType,
    pub unused: ShareType,
    pub ops: Vec<VirtualOp>,
}

#[derive(Debug, Default)]
struct RewardPlan {
    balances: BTreeMap<AccountName, ShareType>,
    groups: BTreeMap<ResearchGroupId, ShareType>,
    expertise: BTreeMap<(AccountName, DisciplineId), ShareType>,
    distributed: ShareType,
    ops: Vec<VirtualOp>,
}

impl RewardPlan {
    fn pay_account(&mut self, account: &AccountName, amount: ShareType) -> Result<()> {
        let entry = self.balances.entry(account.clone()).or_insert(0);
        *entry = entry.checked_add(amount).ok_or(LedgerError::Overflow("reward balance"))?;
        self.distributed = self.distributed.checked_add(amount).ok_or(LedgerError::Overflow("distributed"))?;
        Ok(())
    }

    fn pay_group(&mut self, group: ResearchGroupId, amount: ShareType) -> Result<()> {
        let entry = self.groups.entry(group).or_insert(0);
        *entry = entry.checked_add(amount).ok_or(LedgerError::Overflow("group reward"))?;
        self.distributed = self.distributed.checked_add(amount).ok_or(LedgerError::Overflow("distributed"))?;
        Ok(())
    }

    /// Expertise dibagi rata ke semua author; sisa floor hilang.
    fn grant_expertise(&mut self, authors: &[AccountName], discipline_id: DisciplineId, amount: ShareType) -> Result<()> {
        if authors.is_empty() || amount <= 0 {
            return Ok(());
        }
        let each = calculate_share(amount, 1, authors.len() as u128)?;
        if each == 0 {
            return Ok(());
        }
        for author in authors {
            let entry = self.expertise.entry((author.clone(), discipline_id)).or_insert(0);
            *entry = entry.checked_add(each).ok_or(LedgerError::Overflow("expertise reward"))?;
            self.ops.push(VirtualOp::ExpertiseReward { account: author.clone(), discipline_id, amount: each });
        }
        Ok(())
    }
}

impl ChainState {
    /// Bagi `budget` ke seluruh content aktif, lalu tulis hasilnya ke state.
    ///
    /// Budget nol, atau tidak ada reward weight aktif, menghasilkan report
    /// dengan seluruh budget sebagai `unused` tanpa mutasi.
    pub fn distribute_reward(&mut self, ctx: &LedgerContext, budget: &Asset) -> Result<RewardReport> {
        budget.ensure_symbol(PRIMARY_SYMBOL)?;
        if budget.amount < 0 {
            return Err(LedgerError::NonPositiveAmount);
        }
        let plan = self.plan_reward_distribution(ctx, budget.amount)?;
        let unused = budget.amount - plan.distributed;

        let report = RewardReport {
            budget: budget.amount,
            distributed: plan.distributed,
            unused,
            ops: plan.ops,
        };
        for (account, amount) in plan.balances {
            self.credit_balance(&account, amount);
        }
        for (group, amount) in plan.groups {
            if let Some(g) = self.research_groups.get_mut(&group) {
                g.balance = g.balance.saturating_add(amount);
            }
        }
        for ((account, discipline_id), amount) in plan.expertise {
            self.credit_expertise(&account, discipline_id, amount, ctx.time);
        }
        debug!(budget = report.budget, distributed = report.distributed, unused = report.unused, "reward distributed");
        Ok(report)
    }

    fn plan_reward_distribution(&self, ctx: &LedgerContext, budget: ShareType) -> Result<RewardPlan> {
        let mut plan = RewardPlan::default();
        let total = ctx.total_active_disciplines_reward_weight;
        if budget == 0 || total == 0 {
            return Ok(plan);
        }

        for discipline in self.disciplines.values() {
            if discipline.total_active_reward_weight == 0 {
                continue;
            }
            let discipline_reward =
                calculate_share(budget, discipline.total_active_reward_weight as u128, total as u128)?;
            if discipline_reward == 0 || discipline.total_active_research_reward_weight == 0 {
                continue;
            }

            for ((content_id, d), tvo) in &self.total_votes {
                if *d != discipline.id || tvo.total_research_reward_weight == 0 {
                    continue;
                }
                let content = self.get_research_content(*content_id)?;
                if !content.is_active() {
                    continue;
                }
                let content_reward = calculate_share(
                    discipline_reward,
                    tvo.total_research_reward_weight as u128,
                    discipline.total_active_research_reward_weight as u128,
                )?;
                if content_reward == 0 {
                    continue;
                }
                plan.ops.push(VirtualOp::ResearchContentReward {
                    research_content_id: *content_id,
                    discipline_id: discipline.id,
                    reward: content_reward,
                });
                self.plan_content_reward(content, discipline.id, content_reward, &mut plan)?;
            }
        }
        Ok(plan)
    }

    /// # Langkah (URUT - CONSENSUS-CRITICAL)
    ///
    /// 1. reviews    = reward * review_share_in_percent
    /// 2. references = reward * references_reward_share
    /// 3. curators   = reward * curators_reward_share
    /// 4. holders    = reward - (1) - (2) - (3)
    fn plan_content_reward(
        &self,
        content: &ResearchContent,
        discipline_id: DisciplineId,
        reward: ShareType,
        plan: &mut RewardPlan,
    ) -> Result<()> {
        let research = self.get_research(content.research_id)?;
        let reviews_pool = percent_share(reward, research.review_share_in_percent)?;
        let references_pool = percent_share(reward, self.config.references_reward_share)?;
        let curators_pool = percent_share(reward, self.config.curators_reward_share)?;
        let holders_pool = reward - reviews_pool - references_pool - curators_pool;

        self.plan_review_rewards(content.id, discipline_id, reviews_pool, plan)?;
        self.plan_reference_rewards(content, discipline_id, references_pool, plan)?;
        self.plan_curator_rewards(content.id, discipline_id, curators_pool, plan)?;

        if holders_pool > 0 {
            self.plan_research_token_holders(research.id, holders_pool, plan)?;
            plan.grant_expertise(&content.authors, discipline_id, holders_pool)?;
        }
        Ok(())
    }

    fn plan_review_rewards(
        &self,
        content_id: ContentId,
        discipline_id: DisciplineId,
        pool: ShareType,
        plan: &mut RewardPlan,
    ) -> Result<()> {
        if pool <= 0 {
            return Ok(());
        }
        let mut weighted = Vec::new();
        let mut total: u128 = 0;
        for review in self.reviews_of_content(content_id) {
            if !review.is_positive {
                continue;
            }
            let rw = review.reward_weights_per_discipline.get(&discipline_id).copied().unwrap_or(0);
            let modifier = review.weight_modifiers.get(&discipline_id).copied().unwrap_or(PERCENT_100 as u32);
            let weight = rw as u128 * modifier as u128 / PERCENT_100 as u128;
            if weight == 0 {
                continue;
            }
            total += weight;
            weighted.push((review, weight));
        }
        if total == 0 {
            return Ok(());
        }

        for (review, weight) in weighted {
            let review_reward = calculate_share(pool, weight, total)?;
            if review_reward == 0 {
                continue;
            }
            let voters_pool = percent_share(review_reward, self.config.review_voters_reward_share)?;
            let curation_total = review
                .curation_reward_weights_per_discipline
                .get(&discipline_id)
                .copied()
                .unwrap_or(0);
            if curation_total > 0 {
                if let Some(votes) = self.review_votes.get(&(review.id, discipline_id)) {
                    for vote in votes.values() {
                        let share = calculate_share(voters_pool, vote.weight as u128, curation_total as u128)?;
                        if share == 0 {
                            continue;
                        }
                        plan.pay_account(&vote.voter, share)?;
                        plan.ops.push(VirtualOp::ReviewVoterReward {
                            voter: vote.voter.clone(),
                            review_id: review.id,
                            reward: share,
                        });
                    }
                }
            }

            let author_reward = review_reward - voters_pool;
            plan.pay_account(&review.author, author_reward)?;
            plan.ops.push(VirtualOp::ReviewReward {
                author: review.author.clone(),
                review_id: review.id,
                reward: author_reward,
            });
            plan.grant_expertise(std::slice::from_ref(&review.author), discipline_id, author_reward)?;
        }
        Ok(())
    }

    fn plan_reference_rewards(
        &self,
        content: &ResearchContent,
        discipline_id: DisciplineId,
        pool: ShareType,
        plan: &mut RewardPlan,
    ) -> Result<()> {
        if pool <= 0 || content.references.is_empty() {
            return Ok(());
        }
        let each = calculate_share(pool, 1, content.references.len() as u128)?;
        if each == 0 {
            return Ok(());
        }
        for reference_id in &content.references {
            let reference = self.get_research_content(*reference_id)?;
            self.plan_research_token_holders(reference.research_id, each, plan)?;
            plan.grant_expertise(&reference.authors, discipline_id, each)?;
        }
        Ok(())
    }

    fn plan_curator_rewards(
        &self,
        content_id: ContentId,
        discipline_id: DisciplineId,
        pool: ShareType,
        plan: &mut RewardPlan,
    ) -> Result<()> {
        if pool <= 0 {
            return Ok(());
        }
        let total = match self.find_total_votes(content_id, discipline_id) {
            Some(tvo) if tvo.total_curators_reward_weight > 0 => tvo.total_curators_reward_weight,
            _ => return Ok(()),
        };
        let Some(votes) = self.votes.get(&(content_id, discipline_id)) else {
            return Ok(());
        };
        for vote in votes.values() {
            let share = calculate_share(pool, vote.weight as u128, total as u128)?;
            if share == 0 {
                continue;
            }
            plan.pay_account(&vote.voter, share)?;
            plan.ops.push(VirtualOp::CurationReward {
                curator: vote.voter.clone(),
                research_content_id: content_id,
                reward: share,
            });
        }
        Ok(())
    }

    /// Group menerima `owned_tokens / 100%`, tiap holder `amount / 100%`.
    fn plan_research_token_holders(&self, research_id: ResearchId, amount: ShareType, plan: &mut RewardPlan) -> Result<()> {
        let research = self.get_research(research_id)?;
        let group_share = calculate_share(amount, research.owned_tokens as u128, PERCENT_100 as u128)?;
        if group_share > 0 {
            plan.pay_group(research.research_group_id, group_share)?;
            plan.ops.push(VirtualOp::ResearchGroupReward {
                research_group_id: research.research_group_id,
                research_id,
                reward: group_share,
            });
        }
        if let Some(holders) = self.research_tokens.get(&research_id) {
            for (holder, tokens) in holders {
                let share = calculate_share(amount, *tokens as u128, PERCENT_100 as u128)?;
                if share == 0 {
                    continue;
                }
                plan.pay_account(holder, share)?;
                plan.ops.push(VirtualOp::ResearchTokenHolderReward {
                    account: holder.clone(),
                    research_id,
                    reward: share,
                });
            }
        }
        Ok(())
    }

    /// Bagi `amount` langsung ke token holder satu research (tanpa pass penuh).
    pub fn reward_research_token_holders(
        &mut self,
        research_id: ResearchId,
        amount: &Asset,
    ) -> Result<RewardReport> {
        amount.ensure_symbol(PRIMARY_SYMBOL)?;
        if amount.amount < 0 {
            return Err(LedgerError::NonPositiveAmount);
        }
        let mut plan = RewardPlan::default();
        self.plan_research_token_holders(research_id, amount.amount, &mut plan)?;
        for (account, value) in plan.balances {
            self.credit_balance(&account, value);
        }
        for (group, value) in plan.groups {
            if let Some(g) = self.research_groups.get_mut(&group) {
                g.balance = g.balance.saturating_add(value);
            }
        }
        Ok(RewardReport {
            budget: amount.amount,
            distributed: plan.distributed,
            unused: amount.amount - plan.distributed,
            ops: plan.ops,
        })
    }
}
