pub mod aggregates;
pub mod progression;
pub mod score;
pub mod sinks;

pub use aggregates::{ActivityAggregates, MemoryAggregates};
pub use progression::{
    seed_badge_catalog, BadgeRequirement, ProgressionEngine, StreakUpdate, XpAward, BADGE_RULES,
};
pub use score::{ScoreEngine, SMART_SCORE_METRIC};
pub use sinks::{
    ActivityLog, ActivityRecord, AdvisoryError, AdvisoryResult, LeaderboardSink,
    MemoryActivityLog, MemoryLeaderboard, MemoryNotifier, Notification, NotificationSink,
};

use rewards_ledger::{CoinEconomy, LedgerStore, ShopService};
use std::sync::Arc;

/// Wires the whole rewards core over one store: coin economy, shop,
/// smart-score engine and progression engine sharing the same collaborators.
pub struct RewardsEngine {
    pub store: Arc<dyn LedgerStore>,
    pub economy: Arc<CoinEconomy>,
    pub shop: Arc<ShopService>,
    pub score: Arc<ScoreEngine>,
    pub progression: Arc<ProgressionEngine>,
}

impl RewardsEngine {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        aggregates: Arc<dyn ActivityAggregates>,
        activity_log: Arc<dyn ActivityLog>,
        leaderboard: Arc<dyn LeaderboardSink>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        let economy = Arc::new(CoinEconomy::new(store.clone()));
        let shop = Arc::new(ShopService::new(store.clone(), economy.clone()));
        let score = Arc::new(ScoreEngine::new(
            store.clone(),
            aggregates.clone(),
            leaderboard.clone(),
        ));
        let progression = Arc::new(ProgressionEngine::new(
            store.clone(),
            economy.clone(),
            aggregates,
            score.clone(),
            activity_log,
            leaderboard,
            notifier,
        ));

        Self {
            store,
            economy,
            shop,
            score,
            progression,
        }
    }
}
