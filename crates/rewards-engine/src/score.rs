use crate::aggregates::ActivityAggregates;
use crate::sinks::LeaderboardSink;
use chrono::Utc;
use rewards_ledger::LedgerStore;
use rewards_types::{Result, UserId};
use std::sync::Arc;
use tracing::{info, warn};

pub const STREAK_WEIGHT: i64 = 10;
pub const REFERRAL_WEIGHT: i64 = 50;
pub const TASK_WEIGHT: i64 = 5;

pub const SMART_SCORE_METRIC: &str = "smart_score";

/// Derived leaderboard metric. The four aggregate reads may span snapshots;
/// only the write back of `smart_score` + `last_score_update` is a single
/// upsert.
pub struct ScoreEngine {
    store: Arc<dyn LedgerStore>,
    aggregates: Arc<dyn ActivityAggregates>,
    leaderboard: Arc<dyn LeaderboardSink>,
}

impl ScoreEngine {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        aggregates: Arc<dyn ActivityAggregates>,
        leaderboard: Arc<dyn LeaderboardSink>,
    ) -> Self {
        Self {
            store,
            aggregates,
            leaderboard,
        }
    }

    pub async fn calculate_smart_score(&self, user: UserId) -> Result<i64> {
        let wallet = self.store.get_wallet(user).await?;
        let streak_days = self
            .store
            .get_state(user)
            .await?
            .map(|s| s.streak_days as i64)
            .unwrap_or(0);
        let referrals = self.aggregates.verified_referral_count(user).await? as i64;
        let tasks = self.aggregates.approved_task_count(user).await? as i64;

        let score = (wallet.total_earned
            + (streak_days * STREAK_WEIGHT) as f64
            + (referrals * REFERRAL_WEIGHT) as f64
            + (tasks * TASK_WEIGHT) as f64)
            .floor() as i64;

        let now = Utc::now();
        self.store.update_score(user, score, now).await?;

        info!(
            user = %user,
            score = score,
            total_earned = wallet.total_earned,
            streak_days = streak_days,
            referrals = referrals,
            tasks = tasks,
            "🧮 Smart score updated"
        );

        if let Err(e) = self
            .leaderboard
            .publish(user, SMART_SCORE_METRIC, score)
            .await
        {
            warn!(user = %user, error = %e, "Leaderboard push failed");
        }

        Ok(score)
    }
}
