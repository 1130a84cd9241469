use crate::types::{
    Badge, BadgeAward, CoinTransaction, GamificationState, InventoryEntry, ShopItem, TxStatus,
    Wallet,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rewards_types::{LedgerError, Result, UserId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

// Type aliases for the in-memory maps
type StateMap = HashMap<UserId, GamificationState>;
type WalletMap = HashMap<UserId, Wallet>;
type InventoryMap = HashMap<(UserId, u64), InventoryEntry>;
type AwardMap = HashMap<(UserId, String), BadgeAward>;

/// Transactional collaborator for every ledger entity. Implementations must
/// guarantee that writes between `begin_transaction` and
/// `commit_transaction` become visible atomically, and that
/// `rollback_transaction` restores the pre-transaction state.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn get_state(&self, user: UserId) -> Result<Option<GamificationState>>;
    async fn put_state(&self, state: GamificationState) -> Result<()>;
    /// Partial upsert of the smart-score columns only. Creates the state row
    /// if absent; never touches XP, rank or streak fields.
    async fn update_score(&self, user: UserId, score: i64, at: DateTime<Utc>) -> Result<()>;

    async fn get_wallet(&self, user: UserId) -> Result<Wallet>;
    async fn put_wallet(&self, wallet: Wallet) -> Result<()>;

    async fn record_coin_tx(&self, tx: CoinTransaction) -> Result<()>;
    async fn coin_history(&self, user: UserId) -> Result<Vec<CoinTransaction>>;
    /// LOCKED rows whose unlock time has elapsed, oldest first.
    async fn locked_txs_due(&self, now: DateTime<Utc>) -> Result<Vec<CoinTransaction>>;
    /// Flips one row LOCKED -> UNLOCKED. The only permitted in-place change.
    async fn mark_unlocked(&self, tx_id: &str) -> Result<()>;

    async fn get_badge(&self, code: &str) -> Result<Option<Badge>>;
    async fn put_badge(&self, badge: Badge) -> Result<()>;
    async fn has_badge_award(&self, user: UserId, code: &str) -> Result<bool>;
    async fn record_badge_award(&self, award: BadgeAward) -> Result<()>;
    async fn badge_awards(&self, user: UserId) -> Result<Vec<BadgeAward>>;

    async fn get_item(&self, item_id: u64) -> Result<Option<ShopItem>>;
    async fn put_item(&self, item: ShopItem) -> Result<()>;
    async fn get_inventory(&self, user: UserId, item_id: u64) -> Result<Option<InventoryEntry>>;
    async fn put_inventory(&self, entry: InventoryEntry) -> Result<()>;
    async fn inventory_for(&self, user: UserId) -> Result<Vec<InventoryEntry>>;

    async fn begin_transaction(&self) -> Result<()>;
    async fn commit_transaction(&self) -> Result<()>;
    async fn rollback_transaction(&self) -> Result<()>;
}

/// Snapshot taken at `begin_transaction`, restored on rollback. Catalog
/// tables (badges, shop items) are admin-managed outside the unit of work
/// and are not part of the snapshot.
struct LedgerBackup {
    states: StateMap,
    wallets: WalletMap,
    inventory: InventoryMap,
    transactions: Vec<CoinTransaction>,
    awards: AwardMap,
}

/// Reference store: every map behind its own `RwLock`, whole-store snapshot
/// transactions. Serves as the test double and as a single-process backend.
pub struct MemoryLedger {
    states: Arc<RwLock<StateMap>>,
    wallets: Arc<RwLock<WalletMap>>,
    transactions: Arc<RwLock<Vec<CoinTransaction>>>,
    badges: Arc<RwLock<HashMap<String, Badge>>>,
    awards: Arc<RwLock<AwardMap>>,
    items: Arc<RwLock<HashMap<u64, ShopItem>>>,
    inventory: Arc<RwLock<InventoryMap>>,
    backup: Arc<RwLock<Option<LedgerBackup>>>,
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self {
            states: Arc::new(RwLock::new(HashMap::new())),
            wallets: Arc::new(RwLock::new(HashMap::new())),
            transactions: Arc::new(RwLock::new(Vec::new())),
            badges: Arc::new(RwLock::new(HashMap::new())),
            awards: Arc::new(RwLock::new(HashMap::new())),
            items: Arc::new(RwLock::new(HashMap::new())),
            inventory: Arc::new(RwLock::new(HashMap::new())),
            backup: Arc::new(RwLock::new(None)),
        }
    }
}

#[async_trait]
impl LedgerStore for MemoryLedger {
    async fn get_state(&self, user: UserId) -> Result<Option<GamificationState>> {
        let states = self.states.read().await;
        Ok(states.get(&user).cloned())
    }

    async fn put_state(&self, state: GamificationState) -> Result<()> {
        let mut states = self.states.write().await;
        states.insert(state.user, state);
        Ok(())
    }

    async fn update_score(&self, user: UserId, score: i64, at: DateTime<Utc>) -> Result<()> {
        let mut states = self.states.write().await;
        let state = states
            .entry(user)
            .or_insert_with(|| GamificationState::new(user));
        state.smart_score = score;
        state.last_score_update = Some(at);
        Ok(())
    }

    async fn get_wallet(&self, user: UserId) -> Result<Wallet> {
        let wallets = self.wallets.read().await;
        Ok(wallets.get(&user).cloned().unwrap_or_else(|| Wallet::new(user)))
    }

    async fn put_wallet(&self, wallet: Wallet) -> Result<()> {
        let mut wallets = self.wallets.write().await;
        wallets.insert(wallet.user, wallet);
        Ok(())
    }

    async fn record_coin_tx(&self, tx: CoinTransaction) -> Result<()> {
        let mut transactions = self.transactions.write().await;
        info!(
            tx_id = %tx.id,
            user = %tx.user,
            amount = tx.amount,
            status = ?tx.status,
            source = %tx.source,
            storage_type = "memory",
            "📦 Coin transaction recorded"
        );
        transactions.push(tx);
        Ok(())
    }

    async fn coin_history(&self, user: UserId) -> Result<Vec<CoinTransaction>> {
        let transactions = self.transactions.read().await;
        let mut filtered: Vec<CoinTransaction> = transactions
            .iter()
            .filter(|tx| tx.user == user)
            .cloned()
            .collect();
        // Newest first
        filtered.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(filtered)
    }

    async fn locked_txs_due(&self, now: DateTime<Utc>) -> Result<Vec<CoinTransaction>> {
        let transactions = self.transactions.read().await;
        let mut due: Vec<CoinTransaction> = transactions
            .iter()
            .filter(|tx| {
                tx.status == TxStatus::Locked
                    && tx.unlocks_at.map(|at| at <= now).unwrap_or(false)
            })
            .cloned()
            .collect();
        due.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(due)
    }

    async fn mark_unlocked(&self, tx_id: &str) -> Result<()> {
        let mut transactions = self.transactions.write().await;
        let tx = transactions
            .iter_mut()
            .find(|tx| tx.id == tx_id)
            .ok_or_else(|| LedgerError::Storage(format!("coin transaction not found: {}", tx_id)))?;
        tx.status = TxStatus::Unlocked;
        Ok(())
    }

    async fn get_badge(&self, code: &str) -> Result<Option<Badge>> {
        let badges = self.badges.read().await;
        Ok(badges.get(code).cloned())
    }

    async fn put_badge(&self, badge: Badge) -> Result<()> {
        let mut badges = self.badges.write().await;
        badges.insert(badge.code.clone(), badge);
        Ok(())
    }

    async fn has_badge_award(&self, user: UserId, code: &str) -> Result<bool> {
        let awards = self.awards.read().await;
        Ok(awards.contains_key(&(user, code.to_string())))
    }

    async fn record_badge_award(&self, award: BadgeAward) -> Result<()> {
        let mut awards = self.awards.write().await;
        let key = (award.user, award.badge_code.clone());
        // Unique (user, badge) pair: keep the first award on a retried call
        awards.entry(key).or_insert(award);
        Ok(())
    }

    async fn badge_awards(&self, user: UserId) -> Result<Vec<BadgeAward>> {
        let awards = self.awards.read().await;
        let mut list: Vec<BadgeAward> = awards
            .values()
            .filter(|a| a.user == user)
            .cloned()
            .collect();
        list.sort_by(|a, b| a.earned_at.cmp(&b.earned_at));
        Ok(list)
    }

    async fn get_item(&self, item_id: u64) -> Result<Option<ShopItem>> {
        let items = self.items.read().await;
        Ok(items.get(&item_id).cloned())
    }

    async fn put_item(&self, item: ShopItem) -> Result<()> {
        let mut items = self.items.write().await;
        items.insert(item.id, item);
        Ok(())
    }

    async fn get_inventory(&self, user: UserId, item_id: u64) -> Result<Option<InventoryEntry>> {
        let inventory = self.inventory.read().await;
        Ok(inventory.get(&(user, item_id)).cloned())
    }

    async fn put_inventory(&self, entry: InventoryEntry) -> Result<()> {
        let mut inventory = self.inventory.write().await;
        inventory.insert((entry.user, entry.item_id), entry);
        Ok(())
    }

    async fn inventory_for(&self, user: UserId) -> Result<Vec<InventoryEntry>> {
        let inventory = self.inventory.read().await;
        Ok(inventory
            .values()
            .filter(|e| e.user == user)
            .cloned()
            .collect())
    }

    async fn begin_transaction(&self) -> Result<()> {
        // Backup slot first, then the maps: rollback acquires in the same
        // order, so two transactions cannot deadlock on a lock inversion.
        let mut backup = self.backup.write().await;
        let states = self.states.read().await;
        let wallets = self.wallets.read().await;
        let inventory = self.inventory.read().await;
        let transactions = self.transactions.read().await;
        let awards = self.awards.read().await;

        *backup = Some(LedgerBackup {
            states: states.clone(),
            wallets: wallets.clone(),
            inventory: inventory.clone(),
            transactions: transactions.clone(),
            awards: awards.clone(),
        });

        info!(
            users = states.len(),
            wallets = wallets.len(),
            storage_type = "memory",
            "📝 Transaction began (snapshot created)"
        );
        Ok(())
    }

    async fn commit_transaction(&self) -> Result<()> {
        let mut backup = self.backup.write().await;
        let had_backup = backup.is_some();
        *backup = None;

        if had_backup {
            info!(
                storage_type = "memory",
                "✅ Transaction committed (snapshot discarded)"
            );
        }
        Ok(())
    }

    async fn rollback_transaction(&self) -> Result<()> {
        let mut backup = self.backup.write().await;

        if let Some(snapshot) = backup.take() {
            let mut states = self.states.write().await;
            let mut wallets = self.wallets.write().await;
            let mut inventory = self.inventory.write().await;
            let mut transactions = self.transactions.write().await;
            let mut awards = self.awards.write().await;

            *states = snapshot.states;
            *wallets = snapshot.wallets;
            *inventory = snapshot.inventory;
            *transactions = snapshot.transactions;
            *awards = snapshot.awards;

            info!(
                storage_type = "memory",
                "❌ Transaction rolled back (snapshot restored)"
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TxKind;

    #[tokio::test]
    async fn test_state_roundtrip() {
        let store = MemoryLedger::new();
        let user = UserId::new(1);

        assert!(store.get_state(user).await.unwrap().is_none());

        let mut state = GamificationState::new(user);
        state.xp = 1_500;
        store.put_state(state).await.unwrap();

        let loaded = store.get_state(user).await.unwrap().unwrap();
        assert_eq!(loaded.xp, 1_500);
    }

    #[tokio::test]
    async fn test_update_score_creates_state() {
        let store = MemoryLedger::new();
        let user = UserId::new(2);
        let now = Utc::now();

        store.update_score(user, 1_150, now).await.unwrap();

        let state = store.get_state(user).await.unwrap().unwrap();
        assert_eq!(state.smart_score, 1_150);
        assert_eq!(state.last_score_update, Some(now));
        // Score upsert must not invent XP
        assert_eq!(state.xp, 0);
    }

    #[tokio::test]
    async fn test_wallet_defaults_to_zero() {
        let store = MemoryLedger::new();
        let wallet = store.get_wallet(UserId::new(3)).await.unwrap();
        assert_eq!(wallet.coins, 0);
        assert_eq!(wallet.locked_coins, 0);
    }

    #[tokio::test]
    async fn test_transaction_rollback_restores_wallet() {
        let store = MemoryLedger::new();
        let user = UserId::new(4);

        let mut wallet = Wallet::new(user);
        wallet.coins = 100;
        store.put_wallet(wallet).await.unwrap();

        store.begin_transaction().await.unwrap();

        let mut wallet = store.get_wallet(user).await.unwrap();
        wallet.coins = 500;
        store.put_wallet(wallet).await.unwrap();
        assert_eq!(store.get_wallet(user).await.unwrap().coins, 500);

        store.rollback_transaction().await.unwrap();
        assert_eq!(store.get_wallet(user).await.unwrap().coins, 100);
    }

    #[tokio::test]
    async fn test_badge_award_unique_per_pair() {
        let store = MemoryLedger::new();
        let user = UserId::new(5);

        let award = BadgeAward {
            user,
            badge_code: "first_task".to_string(),
            earned_at: Utc::now(),
        };
        store.record_badge_award(award.clone()).await.unwrap();
        store.record_badge_award(award).await.unwrap();

        assert_eq!(store.badge_awards(user).await.unwrap().len(), 1);
        assert!(store.has_badge_award(user, "first_task").await.unwrap());
    }

    #[tokio::test]
    async fn test_locked_txs_due_filters_by_time() {
        let store = MemoryLedger::new();
        let user = UserId::new(6);
        let now = Utc::now();

        let make_tx = |id: &str, unlocks_at, status| CoinTransaction {
            id: id.to_string(),
            user,
            amount: 100,
            kind: TxKind::Earn,
            status,
            unlocks_at,
            source: "referral".to_string(),
            metadata: None,
            created_at: now,
        };

        store
            .record_coin_tx(make_tx(
                "due",
                Some(now - chrono::Duration::hours(1)),
                TxStatus::Locked,
            ))
            .await
            .unwrap();
        store
            .record_coin_tx(make_tx(
                "not_due",
                Some(now + chrono::Duration::hours(1)),
                TxStatus::Locked,
            ))
            .await
            .unwrap();
        store
            .record_coin_tx(make_tx("already_unlocked", None, TxStatus::Unlocked))
            .await
            .unwrap();

        let due = store.locked_txs_due(now).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, "due");

        store.mark_unlocked("due").await.unwrap();
        assert!(store.locked_txs_due(now).await.unwrap().is_empty());
    }
}
