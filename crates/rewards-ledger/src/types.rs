use chrono::{DateTime, Utc};
use rewards_types::{Rank, UserId};
use serde::{Deserialize, Serialize};

/// Per-user progression row. Created lazily on first XP award, login or
/// badge check; mutated forever after, never deleted.
///
/// Invariant: `rank` equals `RankTable::rank_for(xp)` after every committed
/// mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GamificationState {
    pub user: UserId,
    pub xp: u64,
    pub rank: Rank,
    pub streak_days: u32,
    pub last_login_at: Option<DateTime<Utc>>,
    pub smart_score: i64,
    pub last_score_update: Option<DateTime<Utc>>,
}

impl GamificationState {
    pub fn new(user: UserId) -> Self {
        Self {
            user,
            xp: 0,
            rank: Rank::Newbie,
            streak_days: 0,
            last_login_at: None,
            smart_score: 0,
            last_score_update: None,
        }
    }
}

/// Per-user balances. `coins` and `locked_coins` are unsigned on purpose:
/// a mutation that would drive either negative must fail before the write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    pub user: UserId,
    pub balance: f64,
    pub withdrawable: f64,
    pub coins: u64,
    pub locked_coins: u64,
    pub total_earned: f64,
}

impl Wallet {
    pub fn new(user: UserId) -> Self {
        Self {
            user,
            balance: 0.0,
            withdrawable: 0.0,
            coins: 0,
            locked_coins: 0,
            total_earned: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TxKind {
    Earn,
    Spend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TxStatus {
    Locked,
    Unlocked,
}

/// Append-only coin ledger row. The only in-place change ever permitted is
/// the LOCKED -> UNLOCKED flip performed by the unlock sweep, once per row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoinTransaction {
    pub id: String,
    pub user: UserId,
    pub amount: i64,
    pub kind: TxKind,
    pub status: TxStatus,
    pub unlocks_at: Option<DateTime<Utc>>,
    pub source: String,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemKind {
    Perk,
    Consumable,
    Cosmetic,
}

/// Gameplay effect attached to a shop item. Effects are matched
/// structurally, not by item name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemEffect {
    DoubleXp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShopItem {
    pub id: u64,
    pub name: String,
    pub cost: u64,
    pub kind: ItemKind,
    pub effect: Option<ItemEffect>,
    pub is_active: bool,
}

/// One row per (user, item). Non-consumables track ownership by presence
/// alone; `remaining_uses` is set only for consumables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryEntry {
    pub user: UserId,
    pub item_id: u64,
    pub quantity: u32,
    pub remaining_uses: Option<u32>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Catalog entity, admin-managed. The ledger only reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Badge {
    pub code: String,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BadgeAward {
    pub user: UserId,
    pub badge_code: String,
    pub earned_at: DateTime<Utc>,
}
