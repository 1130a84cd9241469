use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordinal progression tier. Always derived from XP via a `RankTable`;
/// never an independent source of truth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Rank {
    Newbie,
    Pro,
    Elite,
    Master,
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Rank::Newbie => "NEWBIE",
            Rank::Pro => "PRO",
            Rank::Elite => "ELITE",
            Rank::Master => "MASTER",
        };
        write!(f, "{}", name)
    }
}

/// Ascending XP thresholds. The highest threshold at or below the XP value
/// wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankTable {
    thresholds: [(Rank, u64); 4],
}

impl Default for RankTable {
    fn default() -> Self {
        Self {
            thresholds: [
                (Rank::Newbie, 0),
                (Rank::Pro, 1_000),
                (Rank::Elite, 5_000),
                (Rank::Master, 20_000),
            ],
        }
    }
}

impl RankTable {
    /// Table must be ascending in XP; callers swapping in a custom table for
    /// tests are responsible for keeping it sorted.
    pub fn new(thresholds: [(Rank, u64); 4]) -> Self {
        Self { thresholds }
    }

    /// Pure and total: every XP value maps to exactly one rank.
    pub fn rank_for(&self, xp: u64) -> Rank {
        let mut rank = self.thresholds[0].0;
        for (candidate, threshold) in self.thresholds.iter() {
            if xp >= *threshold {
                rank = *candidate;
            }
        }
        rank
    }
}
