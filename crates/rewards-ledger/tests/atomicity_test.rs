//! Failure-injection coverage for the purchase unit of work: a store that
//! dies between the debit and the inventory upsert must leave the wallet at
//! its pre-purchase value and the coin ledger without a SPEND row.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rewards_ledger::{
    Badge, BadgeAward, CoinEconomy, CoinTransaction, CreditOptions, GamificationState,
    InventoryEntry, ItemKind, LedgerStore, MemoryLedger, ShopItem, ShopService, TxKind, Wallet,
};
use rewards_types::{LedgerError, Result, UserId};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// Delegates everything to a `MemoryLedger`, but fails `put_inventory`
/// while armed.
struct FlakyLedger {
    inner: MemoryLedger,
    fail_inventory_writes: AtomicBool,
}

impl FlakyLedger {
    fn new() -> Self {
        Self {
            inner: MemoryLedger::new(),
            fail_inventory_writes: AtomicBool::new(false),
        }
    }

    fn arm(&self) {
        self.fail_inventory_writes.store(true, Ordering::SeqCst);
    }

    fn disarm(&self) {
        self.fail_inventory_writes.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl LedgerStore for FlakyLedger {
    async fn get_state(&self, user: UserId) -> Result<Option<GamificationState>> {
        self.inner.get_state(user).await
    }
    async fn put_state(&self, state: GamificationState) -> Result<()> {
        self.inner.put_state(state).await
    }
    async fn update_score(&self, user: UserId, score: i64, at: DateTime<Utc>) -> Result<()> {
        self.inner.update_score(user, score, at).await
    }
    async fn get_wallet(&self, user: UserId) -> Result<Wallet> {
        self.inner.get_wallet(user).await
    }
    async fn put_wallet(&self, wallet: Wallet) -> Result<()> {
        self.inner.put_wallet(wallet).await
    }
    async fn record_coin_tx(&self, tx: CoinTransaction) -> Result<()> {
        self.inner.record_coin_tx(tx).await
    }
    async fn coin_history(&self, user: UserId) -> Result<Vec<CoinTransaction>> {
        self.inner.coin_history(user).await
    }
    async fn locked_txs_due(&self, now: DateTime<Utc>) -> Result<Vec<CoinTransaction>> {
        self.inner.locked_txs_due(now).await
    }
    async fn mark_unlocked(&self, tx_id: &str) -> Result<()> {
        self.inner.mark_unlocked(tx_id).await
    }
    async fn get_badge(&self, code: &str) -> Result<Option<Badge>> {
        self.inner.get_badge(code).await
    }
    async fn put_badge(&self, badge: Badge) -> Result<()> {
        self.inner.put_badge(badge).await
    }
    async fn has_badge_award(&self, user: UserId, code: &str) -> Result<bool> {
        self.inner.has_badge_award(user, code).await
    }
    async fn record_badge_award(&self, award: BadgeAward) -> Result<()> {
        self.inner.record_badge_award(award).await
    }
    async fn badge_awards(&self, user: UserId) -> Result<Vec<BadgeAward>> {
        self.inner.badge_awards(user).await
    }
    async fn get_item(&self, item_id: u64) -> Result<Option<ShopItem>> {
        self.inner.get_item(item_id).await
    }
    async fn put_item(&self, item: ShopItem) -> Result<()> {
        self.inner.put_item(item).await
    }
    async fn get_inventory(&self, user: UserId, item_id: u64) -> Result<Option<InventoryEntry>> {
        self.inner.get_inventory(user, item_id).await
    }
    async fn put_inventory(&self, entry: InventoryEntry) -> Result<()> {
        if self.fail_inventory_writes.load(Ordering::SeqCst) {
            return Err(LedgerError::Storage(
                "injected: inventory write failed".to_string(),
            ));
        }
        self.inner.put_inventory(entry).await
    }
    async fn inventory_for(&self, user: UserId) -> Result<Vec<InventoryEntry>> {
        self.inner.inventory_for(user).await
    }
    async fn begin_transaction(&self) -> Result<()> {
        self.inner.begin_transaction().await
    }
    async fn commit_transaction(&self) -> Result<()> {
        self.inner.commit_transaction().await
    }
    async fn rollback_transaction(&self) -> Result<()> {
        self.inner.rollback_transaction().await
    }
}

#[tokio::test]
async fn test_purchase_rolls_back_on_inventory_failure() {
    init_tracing();
    let store = Arc::new(FlakyLedger::new());
    let economy = Arc::new(CoinEconomy::new(store.clone()));
    let shop = ShopService::new(store.clone(), economy.clone());
    let user = UserId::new(1);

    store
        .put_item(ShopItem {
            id: 1,
            name: "Double XP Boost".to_string(),
            cost: 200,
            kind: ItemKind::Consumable,
            effect: None,
            is_active: true,
        })
        .await
        .unwrap();
    economy
        .credit_coins(user, 500, CreditOptions::unlocked("bonus"))
        .await
        .unwrap();

    // Fail between the debit and the inventory increment
    store.arm();
    let err = shop.purchase(user, 1).await.unwrap_err();
    assert!(matches!(err, LedgerError::Storage(_)));

    // Debit rolled back, no inventory row, no SPEND row
    assert_eq!(economy.wallet(user).await.unwrap().coins, 500);
    assert!(store.get_inventory(user, 1).await.unwrap().is_none());
    let history = economy.coin_history(user).await.unwrap();
    assert!(history.iter().all(|tx| tx.kind != TxKind::Spend));

    // Same purchase succeeds once the store recovers
    store.disarm();
    let receipt = shop.purchase(user, 1).await.unwrap();
    assert_eq!(receipt.new_coins, 300);
    assert_eq!(receipt.quantity, 1);
}

#[tokio::test]
async fn test_wallet_conserved_across_mixed_operations() {
    init_tracing();
    let store = Arc::new(MemoryLedger::new());
    let economy = Arc::new(CoinEconomy::new(store.clone()));
    let user = UserId::new(2);

    let mut expected: i64 = 0;
    for i in 0..50u64 {
        if i % 3 == 0 {
            economy
                .credit_coins(user, 40, CreditOptions::unlocked("bonus"))
                .await
                .unwrap();
            expected += 40;
        } else {
            match economy.debit_coins(user, 25, "shop").await {
                Ok(_) => expected -= 25,
                Err(LedgerError::InsufficientCoins { .. }) => {}
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
    }

    let wallet = economy.wallet(user).await.unwrap();
    assert_eq!(wallet.coins as i64, expected);

    // Ledger rows sum to the wallet balance
    let history = economy.coin_history(user).await.unwrap();
    let sum: i64 = history.iter().map(|tx| tx.amount).sum();
    assert_eq!(sum, wallet.coins as i64);
}
