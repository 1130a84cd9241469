use crate::aggregates::ActivityAggregates;
use crate::score::ScoreEngine;
use crate::sinks::{ActivityLog, ActivityRecord, LeaderboardSink, Notification, NotificationSink};
use chrono::{DateTime, Duration, Utc};
use rewards_ledger::{
    Badge, BadgeAward, CoinEconomy, CreditOptions, GamificationState, ItemEffect, LedgerStore,
};
use rewards_types::{Rank, RankTable, Result, UserId};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub const DAILY_LOGIN_XP: u64 = 10;
pub const WEEKLY_STREAK_BONUS: u64 = 50;
pub const MONTHLY_STREAK_BONUS: u64 = 200;
pub const TASK_APPROVAL_XP: u64 = 50;
pub const FIRST_TASK_BONUS_XP: u64 = 100;
pub const REFERRAL_XP: u64 = 200;
pub const REFERRAL_COIN_REWARD: u64 = 5_000;
pub const REFERRAL_COIN_LOCK_HOURS: i64 = 24;

pub const XP_METRIC: &str = "xp";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BadgeRequirement {
    TasksApproved(u64),
    ReferralsVerified(u64),
    RankReached(Rank),
    StreakDays(u32),
}

/// Fixed rule table. Rules are evaluated independently on every check;
/// a higher tier never suppresses a missed lower tier. Idempotency is
/// delegated to `award_badge`.
pub const BADGE_RULES: &[(&str, BadgeRequirement)] = &[
    ("first_task", BadgeRequirement::TasksApproved(1)),
    ("ten_tasks", BadgeRequirement::TasksApproved(10)),
    ("fifty_tasks", BadgeRequirement::TasksApproved(50)),
    ("first_referral", BadgeRequirement::ReferralsVerified(1)),
    ("ten_referrals", BadgeRequirement::ReferralsVerified(10)),
    ("rank_pro", BadgeRequirement::RankReached(Rank::Pro)),
    ("rank_elite", BadgeRequirement::RankReached(Rank::Elite)),
    ("rank_master", BadgeRequirement::RankReached(Rank::Master)),
    ("week_streak", BadgeRequirement::StreakDays(7)),
    ("month_streak", BadgeRequirement::StreakDays(30)),
];

/// Populates the badge catalog rows backing `BADGE_RULES`. The catalog is
/// admin-managed in production; tests and fresh deployments seed it here.
pub async fn seed_badge_catalog(store: &dyn LedgerStore) -> Result<()> {
    let entries = [
        ("first_task", "First Steps", "Complete your first task"),
        ("ten_tasks", "Getting Busy", "Complete 10 tasks"),
        ("fifty_tasks", "Workhorse", "Complete 50 tasks"),
        ("first_referral", "Recruiter", "Refer your first verified user"),
        ("ten_referrals", "Talent Magnet", "Refer 10 verified users"),
        ("rank_pro", "Going Pro", "Reach PRO rank"),
        ("rank_elite", "Elite Circle", "Reach ELITE rank"),
        ("rank_master", "Master Class", "Reach MASTER rank"),
        ("week_streak", "One Week Wonder", "Log in 7 days in a row"),
        ("month_streak", "Iron Habit", "Log in 30 days in a row"),
    ];
    for (code, name, description) in entries {
        store
            .put_badge(Badge {
                code: code.to_string(),
                name: name.to_string(),
                description: description.to_string(),
            })
            .await?;
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XpAward {
    pub new_xp: u64,
    pub new_rank: Rank,
    pub rank_upgraded: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreakUpdate {
    pub streak_days: u32,
    pub streak_bonus: u64,
}

/// Owns every gamification-state mutation: XP awards (with boost
/// multiplier), rank upgrades, the login-streak state machine, badge awards
/// and the task/referral workflow handlers.
///
/// Public entry points take the mutation lock shared with `CoinEconomy` and
/// `ShopService` for the whole read-modify-write: the store's snapshot
/// transaction has a single slot, so every writer must serialize on the
/// same lock. `*_inner` methods assume the lock is held.
pub struct ProgressionEngine {
    store: Arc<dyn LedgerStore>,
    economy: Arc<CoinEconomy>,
    aggregates: Arc<dyn ActivityAggregates>,
    score: Arc<ScoreEngine>,
    ranks: RankTable,
    activity_log: Arc<dyn ActivityLog>,
    leaderboard: Arc<dyn LeaderboardSink>,
    notifier: Arc<dyn NotificationSink>,
    mutation_lock: Arc<Mutex<()>>,
}

impl ProgressionEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn LedgerStore>,
        economy: Arc<CoinEconomy>,
        aggregates: Arc<dyn ActivityAggregates>,
        score: Arc<ScoreEngine>,
        activity_log: Arc<dyn ActivityLog>,
        leaderboard: Arc<dyn LeaderboardSink>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        let mutation_lock = economy.mutation_lock();
        Self {
            store,
            economy,
            aggregates,
            score,
            ranks: RankTable::default(),
            activity_log,
            leaderboard,
            notifier,
            mutation_lock,
        }
    }

    pub fn with_rank_table(mut self, ranks: RankTable) -> Self {
        self.ranks = ranks;
        self
    }

    pub async fn award_xp(
        &self,
        user: UserId,
        amount: u64,
        reason: &str,
        metadata: Option<serde_json::Value>,
    ) -> Result<XpAward> {
        let _guard = self.mutation_lock.lock().await;
        self.award_xp_inner(user, amount, reason, metadata).await
    }

    /// Single place where the Double-XP multiplier is decided; both the
    /// create-state and update-state paths of `award_xp_inner` go through
    /// it. One active boost caps the multiplier at 2x, never stacking.
    async fn active_boost_multiplier(&self, user: UserId, now: DateTime<Utc>) -> Result<u64> {
        for entry in self.store.inventory_for(user).await? {
            if entry.quantity == 0 {
                continue;
            }
            if let Some(expires_at) = entry.expires_at {
                if expires_at <= now {
                    continue;
                }
            }
            if let Some(item) = self.store.get_item(entry.item_id).await? {
                if item.effect == Some(ItemEffect::DoubleXp) {
                    return Ok(2);
                }
            }
        }
        Ok(1)
    }

    async fn award_xp_inner(
        &self,
        user: UserId,
        amount: u64,
        reason: &str,
        metadata: Option<serde_json::Value>,
    ) -> Result<XpAward> {
        let now = Utc::now();
        self.store.begin_transaction().await?;

        let applied = match self.apply_xp(user, amount, now).await {
            Ok(applied) => {
                self.store.commit_transaction().await?;
                applied
            }
            Err(e) => {
                self.store.rollback_transaction().await?;
                return Err(e);
            }
        };

        let (old_xp, old_rank, award) = applied;
        info!(
            user = %user,
            reason = reason,
            xp_before = old_xp,
            xp_after = award.new_xp,
            rank_before = %old_rank,
            rank_after = %award.new_rank,
            rank_upgraded = award.rank_upgraded,
            "⭐ XP awarded"
        );

        // Advisory projections: logged on failure, never surfaced.
        if let Err(e) = self
            .activity_log
            .append(ActivityRecord {
                user,
                action: reason.to_string(),
                xp_before: old_xp,
                xp_after: award.new_xp,
                rank_before: old_rank,
                rank_after: award.new_rank,
                metadata,
                at: now,
            })
            .await
        {
            warn!(user = %user, error = %e, "Activity log append failed");
        }
        if let Err(e) = self
            .leaderboard
            .publish(user, XP_METRIC, award.new_xp as i64)
            .await
        {
            warn!(user = %user, error = %e, "Leaderboard push failed");
        }
        if let Err(e) = self.score.calculate_smart_score(user).await {
            warn!(user = %user, error = %e, "Smart score recompute failed");
        }

        Ok(award)
    }

    async fn apply_xp(
        &self,
        user: UserId,
        amount: u64,
        now: DateTime<Utc>,
    ) -> Result<(u64, Rank, XpAward)> {
        let mut state = self
            .store
            .get_state(user)
            .await?
            .unwrap_or_else(|| GamificationState::new(user));

        let multiplier = self.active_boost_multiplier(user, now).await?;
        let applied = amount.saturating_mul(multiplier);
        if multiplier > 1 {
            debug!(user = %user, base = amount, applied = applied, "Double XP boost active");
        }

        let old_xp = state.xp;
        let old_rank = state.rank;
        state.xp = state.xp.saturating_add(applied);
        state.rank = self.ranks.rank_for(state.xp);
        let award = XpAward {
            new_xp: state.xp,
            new_rank: state.rank,
            rank_upgraded: state.rank != old_rank,
        };
        self.store.put_state(state).await?;

        Ok((old_xp, old_rank, award))
    }

    pub async fn update_streak(&self, user: UserId) -> Result<StreakUpdate> {
        self.update_streak_at(user, Utc::now()).await
    }

    /// Streak state machine, evaluated once per call on whole days since the
    /// last login: first ping starts at 1, a same-day repeat is a no-op, the
    /// next day increments, any longer gap resets to 1.
    pub async fn update_streak_at(&self, user: UserId, now: DateTime<Utc>) -> Result<StreakUpdate> {
        let _guard = self.mutation_lock.lock().await;

        self.store.begin_transaction().await?;
        let outcome = match self.apply_streak(user, now).await {
            Ok(outcome) => {
                self.store.commit_transaction().await?;
                outcome
            }
            Err(e) => {
                self.store.rollback_transaction().await?;
                return Err(e);
            }
        };

        let (update, counted_today) = outcome;
        if !counted_today {
            return Ok(update);
        }

        info!(
            user = %user,
            streak_days = update.streak_days,
            bonus = update.streak_bonus,
            "📅 Login streak updated"
        );

        self.award_xp_inner(
            user,
            DAILY_LOGIN_XP + update.streak_bonus,
            "daily_login",
            Some(serde_json::json!({ "streak_days": update.streak_days })),
        )
        .await?;

        Ok(update)
    }

    async fn apply_streak(
        &self,
        user: UserId,
        now: DateTime<Utc>,
    ) -> Result<(StreakUpdate, bool)> {
        let mut state = self
            .store
            .get_state(user)
            .await?
            .unwrap_or_else(|| GamificationState::new(user));

        let days_since_last = state
            .last_login_at
            .map(|last| (now - last).num_days())
            .unwrap_or(i64::MAX);

        if days_since_last == 0 {
            // Already counted today; repeat calls are a no-op
            return Ok((
                StreakUpdate {
                    streak_days: state.streak_days,
                    streak_bonus: 0,
                },
                false,
            ));
        }

        let streak_days = if days_since_last == 1 {
            state.streak_days + 1
        } else {
            // First-ever ping or a broken streak
            1
        };

        // The two bonus tiers are checked independently, weekly first. At
        // day 30 only the monthly bonus fires because 30 % 7 != 0.
        let streak_bonus = if days_since_last == 1 {
            if streak_days % 7 == 0 {
                WEEKLY_STREAK_BONUS
            } else if streak_days % 30 == 0 {
                MONTHLY_STREAK_BONUS
            } else {
                0
            }
        } else {
            0
        };

        state.streak_days = streak_days;
        state.last_login_at = Some(now);
        self.store.put_state(state).await?;

        Ok((
            StreakUpdate {
                streak_days,
                streak_bonus,
            },
            true,
        ))
    }

    /// Returns true when the badge was newly awarded. Unknown codes are a
    /// logged no-op, not an error.
    pub async fn award_badge(&self, user: UserId, code: &str) -> Result<bool> {
        let _guard = self.mutation_lock.lock().await;
        self.award_badge_inner(user, code).await
    }

    async fn award_badge_inner(&self, user: UserId, code: &str) -> Result<bool> {
        let badge = match self.store.get_badge(code).await? {
            Some(badge) => badge,
            None => {
                warn!(user = %user, code = code, "Unknown badge code, skipping award");
                return Ok(false);
            }
        };

        self.store.begin_transaction().await?;
        let awarded = match self.apply_badge(user, code).await {
            Ok(awarded) => {
                self.store.commit_transaction().await?;
                awarded
            }
            Err(e) => {
                self.store.rollback_transaction().await?;
                return Err(e);
            }
        };

        if !awarded {
            return Ok(false);
        }

        info!(user = %user, code = code, "🏅 Badge awarded");

        // Notify only on the first award; advisory
        if let Err(e) = self
            .notifier
            .notify(Notification {
                user,
                kind: "badge_awarded".to_string(),
                title: format!("Badge earned: {}", badge.name),
                body: badge.description.clone(),
                data: Some(serde_json::json!({ "badge_code": code })),
                at: Utc::now(),
            })
            .await
        {
            warn!(user = %user, code = code, error = %e, "Badge notification failed");
        }

        Ok(true)
    }

    async fn apply_badge(&self, user: UserId, code: &str) -> Result<bool> {
        if self.store.get_state(user).await?.is_none() {
            self.store.put_state(GamificationState::new(user)).await?;
        }

        if self.store.has_badge_award(user, code).await? {
            return Ok(false);
        }

        self.store
            .record_badge_award(BadgeAward {
                user,
                badge_code: code.to_string(),
                earned_at: Utc::now(),
            })
            .await?;
        Ok(true)
    }

    /// Evaluates the whole rule table against live aggregates and awards
    /// every qualifying badge. Returns the codes newly awarded by this call.
    pub async fn check_and_award_badges(&self, user: UserId) -> Result<Vec<String>> {
        let _guard = self.mutation_lock.lock().await;
        self.check_and_award_badges_inner(user).await
    }

    async fn check_and_award_badges_inner(&self, user: UserId) -> Result<Vec<String>> {
        let tasks = self.aggregates.approved_task_count(user).await?;
        let referrals = self.aggregates.verified_referral_count(user).await?;
        let (rank, streak_days) = match self.store.get_state(user).await? {
            Some(state) => (state.rank, state.streak_days),
            None => (Rank::Newbie, 0),
        };

        let mut newly_awarded = Vec::new();
        for (code, requirement) in BADGE_RULES {
            let satisfied = match requirement {
                BadgeRequirement::TasksApproved(n) => tasks >= *n,
                BadgeRequirement::ReferralsVerified(n) => referrals >= *n,
                BadgeRequirement::RankReached(target) => rank >= *target,
                BadgeRequirement::StreakDays(d) => streak_days >= *d,
            };
            if satisfied && self.award_badge_inner(user, code).await? {
                newly_awarded.push(code.to_string());
            }
        }

        Ok(newly_awarded)
    }

    /// Task-approval workflow entry point. The upstream workflow records the
    /// approval before invoking this, so a count of one means this was the
    /// user's first task.
    pub async fn handle_task_approval(&self, user: UserId, task_id: u64) -> Result<XpAward> {
        let _guard = self.mutation_lock.lock().await;

        let approvals = self.aggregates.approved_task_count(user).await?;
        let first_task = approvals == 1;
        let amount = TASK_APPROVAL_XP + if first_task { FIRST_TASK_BONUS_XP } else { 0 };

        let award = self
            .award_xp_inner(
                user,
                amount,
                "task_approval",
                Some(serde_json::json!({ "task_id": task_id, "first_task": first_task })),
            )
            .await?;

        if award.rank_upgraded {
            // Reuses the rank award_xp just computed; no second state read
            if let Err(e) = self
                .notifier
                .notify(Notification {
                    user,
                    kind: "rank_upgraded".to_string(),
                    title: format!("Rank up: {}", award.new_rank),
                    body: format!("You reached {} rank!", award.new_rank),
                    data: Some(serde_json::json!({ "rank": award.new_rank.to_string() })),
                    at: Utc::now(),
                })
                .await
            {
                warn!(user = %user, error = %e, "Rank-upgrade notification failed");
            }
        }

        self.check_and_award_badges_inner(user).await?;
        Ok(award)
    }

    /// Referral-verification workflow entry point: referral XP, then a
    /// time-locked coin credit (wallet increment and ledger row atomic),
    /// then a badge sweep.
    pub async fn handle_referral_verification(
        &self,
        user: UserId,
        referral_id: u64,
    ) -> Result<XpAward> {
        let _guard = self.mutation_lock.lock().await;

        let award = self
            .award_xp_inner(
                user,
                REFERRAL_XP,
                "referral_verified",
                Some(serde_json::json!({ "referral_id": referral_id })),
            )
            .await?;

        let unlocks_at = Utc::now() + Duration::hours(REFERRAL_COIN_LOCK_HOURS);
        // Lock already held by this entry point
        self.economy
            .credit_coins_exclusive(
                user,
                REFERRAL_COIN_REWARD,
                CreditOptions::locked_until(unlocks_at, "referral")
                    .with_metadata(serde_json::json!({ "referral_id": referral_id })),
            )
            .await?;

        self.check_and_award_badges_inner(user).await?;
        Ok(award)
    }
}
