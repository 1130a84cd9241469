//! Advisory side channels: activity log, leaderboard, notifications.
//!
//! These are projections of the ledger, not the ledger itself. They get a
//! dedicated error type so a sink failure can never be propagated as the
//! failure of the primary mutation — callers log it and move on.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rewards_types::{Rank, UserId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Error, Debug)]
pub enum AdvisoryError {
    #[error("Sink unavailable: {0}")]
    Unavailable(String),
}

/// Deliberately not convertible into `LedgerError`.
pub type AdvisoryResult<T> = std::result::Result<T, AdvisoryError>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub user: UserId,
    pub action: String,
    pub xp_before: u64,
    pub xp_after: u64,
    pub rank_before: Rank,
    pub rank_after: Rank,
    pub metadata: Option<serde_json::Value>,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub user: UserId,
    pub kind: String,
    pub title: String,
    pub body: String,
    pub data: Option<serde_json::Value>,
    pub at: DateTime<Utc>,
}

#[async_trait]
pub trait ActivityLog: Send + Sync {
    async fn append(&self, record: ActivityRecord) -> AdvisoryResult<()>;
}

#[async_trait]
pub trait LeaderboardSink: Send + Sync {
    async fn publish(&self, user: UserId, metric: &str, score: i64) -> AdvisoryResult<()>;
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, notification: Notification) -> AdvisoryResult<()>;
}

#[derive(Default)]
pub struct MemoryActivityLog {
    records: Arc<RwLock<Vec<ActivityRecord>>>,
}

impl MemoryActivityLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn records(&self) -> Vec<ActivityRecord> {
        self.records.read().await.clone()
    }
}

#[async_trait]
impl ActivityLog for MemoryActivityLog {
    async fn append(&self, record: ActivityRecord) -> AdvisoryResult<()> {
        self.records.write().await.push(record);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryLeaderboard {
    scores: Arc<RwLock<HashMap<String, HashMap<UserId, i64>>>>,
}

impl MemoryLeaderboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn score(&self, user: UserId, metric: &str) -> Option<i64> {
        let scores = self.scores.read().await;
        scores.get(metric).and_then(|m| m.get(&user)).copied()
    }

    /// Highest scores first, ties broken by user id for a stable order.
    pub async fn top(&self, metric: &str, limit: usize) -> Vec<(UserId, i64)> {
        let scores = self.scores.read().await;
        let mut entries: Vec<(UserId, i64)> = scores
            .get(metric)
            .map(|m| m.iter().map(|(u, s)| (*u, *s)).collect())
            .unwrap_or_default();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        entries.truncate(limit);
        entries
    }
}

#[async_trait]
impl LeaderboardSink for MemoryLeaderboard {
    async fn publish(&self, user: UserId, metric: &str, score: i64) -> AdvisoryResult<()> {
        let mut scores = self.scores.write().await;
        scores.entry(metric.to_string()).or_default().insert(user, score);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryNotifier {
    sent: Arc<RwLock<Vec<Notification>>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<Notification> {
        self.sent.read().await.clone()
    }

    pub async fn sent_to(&self, user: UserId, kind: &str) -> Vec<Notification> {
        self.sent
            .read()
            .await
            .iter()
            .filter(|n| n.user == user && n.kind == kind)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl NotificationSink for MemoryNotifier {
    async fn notify(&self, notification: Notification) -> AdvisoryResult<()> {
        self.sent.write().await.push(notification);
        Ok(())
    }
}
