//! # Voting / Reward-Weight Engine
//!
//! Setiap vote pada (content, discipline) atau (review, discipline):
//!
//! ```text
//! tokens   = floor(amount * used_power / 100%)
//! rshares  = power1.5(tokens)
//! curator  = power1.5(total_after) - power1.5(total_before)
//! decayed  = curator * min(now - created_at, WINDOW) / WINDOW
//! ```
//!
//! Semua nilai baru (agregat, discipline, context) dihitung di fase validate
//! dengan aritmatika checked, lalu ditulis balik utuh di fase apply.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use super::internal_expert_token::VotingPowerUse;
use super::{ChainState, Discipline, LedgerContext, Review, ReviewVote, TotalVotes, Vote};
use crate::error::{LedgerError, Result};
use crate::reward_curve::{curve_delta, evaluate_reward_curve, reverse_auction_decay, review_weight_modifier, CurveId};
use crate::types::{AccountName, ContentId, DisciplineId, ResearchId, ReviewId, COMMON_DISCIPLINE_ID, PERCENT_100};

const RESEARCH_REWARD_CURVE: CurveId = CurveId::Power1Dot5;
const CURATORS_REWARD_CURVE: CurveId = CurveId::Power1Dot5;
const REVIEW_REWARD_CURVE: CurveId = CurveId::Power1Dot5;

/// Hasil validate satu content vote: record baru + snapshot pasca-vote.
#[derive(Debug, Clone)]
pub(crate) struct ContentVotePlan {
    pub vote: Vote,
    pub new_power: u16,
    pub total_votes: TotalVotes,
    pub discipline: Discipline,
    pub total_active_disciplines_reward_weight: u64,
}

#[derive(Debug, Clone)]
pub(crate) struct ReviewVotePlan {
    pub vote: ReviewVote,
    pub new_power: u16,
    pub discipline: Discipline,
    pub review: Review,
}

#[derive(Debug, Clone)]
pub(crate) struct MakeReviewPlan {
    pub review: Review,
    pub votes: Vec<ContentVotePlan>,
}

fn checked_add(a: u64, b: u64, what: &'static str) -> Result<u64> {
    a.checked_add(b).ok_or(LedgerError::Overflow(what))
}

impl ChainState {
    /// Discipline yang dipakai vote harus termasuk discipline research,
    /// kecuali discipline common (0).
    fn check_discipline_in_research(&self, research_id: ResearchId, discipline_id: DisciplineId) -> Result<()> {
        if discipline_id == COMMON_DISCIPLINE_ID {
            return Ok(());
        }
        let research = self.get_research(research_id)?;
        if !research.disciplines.contains(&discipline_id) {
            return Err(LedgerError::DisciplineNotInResearch(discipline_id));
        }
        Ok(())
    }

    /// Inti content vote, dipakai oleh `vote` dan `make_review`.
    ///
    /// `ctx_weight` adalah nilai berjalan `total_active_disciplines_reward_weight`
    /// (make_review memberi beberapa vote dalam satu operasi).
    ///
    /// # Langkah (URUT - CONSENSUS-CRITICAL)
    ///
    /// 1. Duplicate (voter, discipline, content) → `DuplicateVote`
    /// 2. Agregat (content, discipline) diambil atau dibuat nol
    /// 3. `rshares = curve(tokens)`
    /// 4. Update total: weight & research reward weight (varian active hanya jika content active)
    /// 5. `curator = curve(new_total_weight) - curve(old_total_weight)`
    /// 6. Decay reverse auction berdasarkan `content.created_at`
    /// 7. Tambah decayed weight ke total curator weight
    fn plan_content_vote(
        &self,
        now: u64,
        ctx_weight: u64,
        voter: &AccountName,
        discipline_id: DisciplineId,
        content_id: ContentId,
        vote_percent: i16,
        power: VotingPowerUse,
    ) -> Result<ContentVotePlan> {
        // 1.
        if self.find_vote(voter, discipline_id, content_id).is_some() {
            return Err(LedgerError::DuplicateVote);
        }
        let content = self.get_research_content(content_id)?;
        let content_is_active = content.is_active();

        // 2.
        let mut tvo = self.find_total_votes(content_id, discipline_id).cloned().unwrap_or(TotalVotes {
            research_content_id: content_id,
            discipline_id,
            research_id: content.research_id,
            ..TotalVotes::default()
        });
        let mut discipline = self.get_discipline(discipline_id)?.clone();
        let mut ctx_weight = ctx_weight;

        // 3.
        let tokens = power.abs_used_tokens;
        let rshares = evaluate_reward_curve(tokens, RESEARCH_REWARD_CURVE)?;

        // 4.
        let old_total_weight = tvo.total_weight;
        tvo.total_weight = checked_add(tvo.total_weight, tokens, "total_weight")?;
        tvo.total_research_reward_weight =
            checked_add(tvo.total_research_reward_weight, rshares, "total_research_reward_weight")?;
        if content_is_active {
            tvo.total_active_weight = checked_add(tvo.total_active_weight, tokens, "total_active_weight")?;
            tvo.total_active_research_reward_weight = checked_add(
                tvo.total_active_research_reward_weight,
                rshares,
                "total_active_research_reward_weight",
            )?;
            ctx_weight = checked_add(ctx_weight, tokens, "total_active_disciplines_reward_weight")?;
            discipline.total_active_reward_weight =
                checked_add(discipline.total_active_reward_weight, tokens, "discipline reward weight")?;
        }
        discipline.total_active_research_reward_weight = checked_add(
            discipline.total_active_research_reward_weight,
            rshares,
            "discipline research reward weight",
        )?;

        // 5. & 6.
        let curator = curve_delta(old_total_weight, tvo.total_weight, CURATORS_REWARD_CURVE)?;
        let decayed = reverse_auction_decay(
            curator,
            now.saturating_sub(content.created_at),
            self.config.reverse_auction_window_seconds,
        );

        // 7.
        tvo.total_curators_reward_weight =
            checked_add(tvo.total_curators_reward_weight, decayed, "total_curators_reward_weight")?;
        if content_is_active {
            tvo.total_active_curators_reward_weight = checked_add(
                tvo.total_active_curators_reward_weight,
                decayed,
                "total_active_curators_reward_weight",
            )?;
        }

        Ok(ContentVotePlan {
            vote: Vote {
                voter: voter.clone(),
                discipline_id,
                research_id: content.research_id,
                research_content_id: content_id,
                vote_percent,
                weight: decayed,
                voting_power: power.used_power,
                tokens_amount: tokens,
                voting_time: now,
            },
            new_power: power.new_power,
            total_votes: tvo,
            discipline,
            total_active_disciplines_reward_weight: ctx_weight,
        })
    }

    fn store_content_vote(&mut self, ctx: &mut LedgerContext, plan: ContentVotePlan) {
        let ContentVotePlan { vote, new_power, total_votes, discipline, total_active_disciplines_reward_weight } = plan;
        debug!(
            voter = %vote.voter,
            content_id = vote.research_content_id,
            discipline_id = vote.discipline_id,
            tokens = vote.tokens_amount,
            curator_weight = vote.weight,
            "content vote applied"
        );
        self.spend_voting_power(&vote.voter, vote.discipline_id, new_power, ctx.time);
        ctx.total_active_disciplines_reward_weight = total_active_disciplines_reward_weight;
        self.disciplines.insert(discipline.id, discipline);
        let key = (vote.research_content_id, vote.discipline_id);
        self.total_votes.insert(key, total_votes);
        self.votes.entry(key).or_default().insert(vote.voter.clone(), vote);
    }

    // ════════════════════════════════════════════════════════════════════
    // vote
    // ════════════════════════════════════════════════════════════════════

    pub(crate) fn validate_vote(
        &self,
        ctx: &LedgerContext,
        voter: &AccountName,
        discipline_id: DisciplineId,
        weight: i16,
        research_id: ResearchId,
        research_content_id: ContentId,
    ) -> Result<ContentVotePlan> {
        let account = self.get_account(voter)?;
        if !account.can_vote {
            return Err(LedgerError::VotingDeclined(voter.clone()));
        }
        self.get_research(research_id)?;
        self.get_discipline(discipline_id)?;
        let token = self.get_expert_token(voter, discipline_id)?;
        let content = self.get_research_content(research_content_id)?;
        if content.research_id != research_id {
            return Err(LedgerError::InvalidOperation(format!(
                "content {} does not belong to research {}",
                research_content_id, research_id
            )));
        }
        self.check_discipline_in_research(research_id, discipline_id)?;
        if self.find_vote(voter, discipline_id, research_content_id).is_some() {
            return Err(LedgerError::DuplicateVote);
        }

        let power = self.compute_voting_power_use(token, weight, ctx.time)?;
        self.plan_content_vote(
            ctx.time,
            ctx.total_active_disciplines_reward_weight,
            voter,
            discipline_id,
            research_content_id,
            weight,
            power,
        )
    }

    pub(crate) fn apply_vote(&mut self, ctx: &mut LedgerContext, plan: ContentVotePlan) {
        self.store_content_vote(ctx, plan);
    }

    // ════════════════════════════════════════════════════════════════════
    // vote_for_review
    // ════════════════════════════════════════════════════════════════════

    /// Algoritma sama dengan content vote, tetapi running total adalah
    /// `discipline.total_active_review_reward_weight` dan decay dihitung
    /// dari `review.created_at`.
    pub(crate) fn validate_vote_for_review(
        &self,
        ctx: &LedgerContext,
        voter: &AccountName,
        discipline_id: DisciplineId,
        weight: i16,
        review_id: ReviewId,
    ) -> Result<ReviewVotePlan> {
        let account = self.get_account(voter)?;
        if !account.can_vote {
            return Err(LedgerError::VotingDeclined(voter.clone()));
        }
        let review = self.get_review(review_id)?;
        let content = self.get_research_content(review.research_content_id)?;
        let mut discipline = self.get_discipline(discipline_id)?.clone();
        let token = self.get_expert_token(voter, discipline_id)?;
        self.check_discipline_in_research(content.research_id, discipline_id)?;
        if self.find_review_vote(voter, discipline_id, review_id).is_some() {
            return Err(LedgerError::DuplicateVote);
        }

        let power = self.compute_voting_power_use(token, weight, ctx.time)?;
        let tokens = power.abs_used_tokens;
        let rshares = evaluate_reward_curve(tokens, REVIEW_REWARD_CURVE)?;

        let old_total = discipline.total_active_review_reward_weight;
        discipline.total_active_review_reward_weight =
            checked_add(old_total, rshares, "discipline review reward weight")?;

        let mut review = review.clone();
        let review_weight = review.reward_weights_per_discipline.entry(discipline_id).or_insert(0);
        *review_weight = checked_add(*review_weight, rshares, "review reward weight")?;
        let review_weight = *review_weight;

        let curator = curve_delta(old_total, discipline.total_active_review_reward_weight, CURATORS_REWARD_CURVE)?;
        let decayed = reverse_auction_decay(
            curator,
            ctx.time.saturating_sub(review.created_at),
            self.config.reverse_auction_window_seconds,
        );

        let curation = review.curation_reward_weights_per_discipline.entry(discipline_id).or_insert(0);
        *curation = checked_add(*curation, decayed, "review curation weight")?;
        review.weight_modifiers.insert(
            discipline_id,
            review_weight_modifier(review_weight, discipline.total_active_review_reward_weight),
        );

        Ok(ReviewVotePlan {
            vote: ReviewVote {
                voter: voter.clone(),
                discipline_id,
                review_id,
                vote_percent: weight,
                weight: decayed,
                voting_power: power.used_power,
                tokens_amount: tokens,
                voting_time: ctx.time,
            },
            new_power: power.new_power,
            discipline,
            review,
        })
    }

    pub(crate) fn apply_vote_for_review(&mut self, ctx: &mut LedgerContext, plan: ReviewVotePlan) {
        let ReviewVotePlan { vote, new_power, discipline, review } = plan;
        debug!(
            voter = %vote.voter,
            review_id = vote.review_id,
            discipline_id = vote.discipline_id,
            curator_weight = vote.weight,
            "review vote applied"
        );
        self.spend_voting_power(&vote.voter, vote.discipline_id, new_power, ctx.time);
        self.disciplines.insert(discipline.id, discipline);
        self.reviews.insert(review.id, review);
        self.review_votes
            .entry((vote.review_id, vote.discipline_id))
            .or_default()
            .insert(vote.voter.clone(), vote);
    }

    // ════════════════════════════════════════════════════════════════════
    // make_review
    // ════════════════════════════════════════════════════════════════════

    /// # Langkah
    ///
    /// 1. Discipline review = expert token reviewer ∩ discipline research; kosong → `InsufficientExpertise`
    /// 2. Semua reference harus ada
    /// 3. Review positif: satu content vote 100% per token tersebut,
    ///    `expertise_amounts_used[d] = token.amount`
    pub(crate) fn validate_make_review(
        &self,
        ctx: &LedgerContext,
        author: &AccountName,
        research_content_id: ContentId,
        content_text: &str,
        is_positive: bool,
        references: &[ContentId],
        external_references: &[String],
    ) -> Result<MakeReviewPlan> {
        let account = self.get_account(author)?;
        let content = self.get_research_content(research_content_id)?;
        let research = self.get_research(content.research_id)?;

        // 1.
        let review_disciplines: BTreeSet<DisciplineId> = self
            .expert_tokens_of(author)
            .map(|t| t.discipline_id)
            .filter(|d| research.disciplines.contains(d))
            .collect();
        if review_disciplines.is_empty() {
            return Err(LedgerError::InsufficientExpertise);
        }

        // 2.
        for reference in references {
            self.get_research_content(*reference)?;
        }

        let mut review = Review {
            id: self.next_ids.review,
            research_content_id,
            author: author.clone(),
            content: content_text.to_string(),
            is_positive,
            disciplines: review_disciplines.clone(),
            references: references.to_vec(),
            external_references: external_references.to_vec(),
            created_at: ctx.time,
            reward_weights_per_discipline: review_disciplines.iter().map(|d| (*d, 0)).collect(),
            curation_reward_weights_per_discipline: review_disciplines.iter().map(|d| (*d, 0)).collect(),
            weight_modifiers: review_disciplines.iter().map(|d| (*d, PERCENT_100 as u32)).collect(),
            expertise_amounts_used: BTreeMap::new(),
        };

        // 3.
        let mut votes = Vec::new();
        if is_positive {
            if !account.can_vote {
                return Err(LedgerError::VotingDeclined(author.clone()));
            }
            let mut ctx_weight = ctx.total_active_disciplines_reward_weight;
            for discipline_id in &review_disciplines {
                let token = self.get_expert_token(author, *discipline_id)?;
                let power = self.compute_voting_power_use(token, PERCENT_100 as i16, ctx.time)?;
                let plan = self.plan_content_vote(
                    ctx.time,
                    ctx_weight,
                    author,
                    *discipline_id,
                    research_content_id,
                    PERCENT_100 as i16,
                    power,
                )?;
                ctx_weight = plan.total_active_disciplines_reward_weight;
                review.expertise_amounts_used.insert(*discipline_id, token.amount);
                votes.push(plan);
            }
        }

        Ok(MakeReviewPlan { review, votes })
    }

    pub(crate) fn apply_make_review(&mut self, ctx: &mut LedgerContext, plan: MakeReviewPlan) {
        let MakeReviewPlan { review, votes } = plan;
        debug!(review_id = review.id, author = %review.author, positive = review.is_positive, "review created");
        self.next_ids.review += 1;
        self.reviews_by_content.insert((review.research_content_id, review.id));
        self.reviews.insert(review.id, review);
        for vote in votes {
            self.store_content_vote(ctx, vote);
        }
    }
}
