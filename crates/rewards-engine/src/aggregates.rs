//! Read-only aggregates owned by the upstream task and referral workflows.
//! The engine never writes these; badge rules and the smart score read them.

use async_trait::async_trait;
use rewards_types::{Result, UserId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[async_trait]
pub trait ActivityAggregates: Send + Sync {
    async fn approved_task_count(&self, user: UserId) -> Result<u64>;
    async fn verified_referral_count(&self, user: UserId) -> Result<u64>;
}

#[derive(Default)]
struct Counts {
    tasks: u64,
    referrals: u64,
}

/// Test double standing in for the upstream workflow tables.
#[derive(Default)]
pub struct MemoryAggregates {
    counts: Arc<RwLock<HashMap<UserId, Counts>>>,
}

impl MemoryAggregates {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record_task_approval(&self, user: UserId) {
        let mut counts = self.counts.write().await;
        counts.entry(user).or_default().tasks += 1;
    }

    pub async fn record_referral_verification(&self, user: UserId) {
        let mut counts = self.counts.write().await;
        counts.entry(user).or_default().referrals += 1;
    }

    pub async fn set_counts(&self, user: UserId, tasks: u64, referrals: u64) {
        let mut counts = self.counts.write().await;
        counts.insert(user, Counts { tasks, referrals });
    }
}

#[async_trait]
impl ActivityAggregates for MemoryAggregates {
    async fn approved_task_count(&self, user: UserId) -> Result<u64> {
        let counts = self.counts.read().await;
        Ok(counts.get(&user).map(|c| c.tasks).unwrap_or(0))
    }

    async fn verified_referral_count(&self, user: UserId) -> Result<u64> {
        let counts = self.counts.read().await;
        Ok(counts.get(&user).map(|c| c.referrals).unwrap_or(0))
    }
}
