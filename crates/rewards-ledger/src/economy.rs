use crate::store::LedgerStore;
use crate::types::{CoinTransaction, TxKind, TxStatus, Wallet};
use chrono::{DateTime, Utc};
use rewards_types::{LedgerError, Result, UserId};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// How a coin credit should land: immediately spendable or time-locked.
#[derive(Debug, Clone)]
pub struct CreditOptions {
    pub locked: bool,
    pub unlocks_at: Option<DateTime<Utc>>,
    pub source: String,
    pub metadata: Option<serde_json::Value>,
}

impl CreditOptions {
    pub fn unlocked(source: &str) -> Self {
        Self {
            locked: false,
            unlocks_at: None,
            source: source.to_string(),
            metadata: None,
        }
    }

    pub fn locked_until(unlocks_at: DateTime<Utc>, source: &str) -> Self {
        Self {
            locked: true,
            unlocks_at: Some(unlocks_at),
            source: source.to_string(),
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Owns every coin mutation. All writers hold `mutation_lock` for the whole
/// read-modify-write, so two concurrent operations on the same wallet
/// serialize instead of interleaving.
pub struct CoinEconomy {
    store: Arc<dyn LedgerStore>,
    mutation_lock: Arc<Mutex<()>>,
    tx_counter: AtomicU64,
}

impl CoinEconomy {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self {
            store,
            mutation_lock: Arc::new(Mutex::new(())),
            tx_counter: AtomicU64::new(0),
        }
    }

    /// Shared with `ShopService` and the progression engine. The store's
    /// snapshot transaction has a single slot, so every component that
    /// begins a transaction must contend on this one lock.
    pub fn mutation_lock(&self) -> Arc<Mutex<()>> {
        self.mutation_lock.clone()
    }

    pub(crate) fn next_tx_id(&self, user: UserId, amount: i64, at: DateTime<Utc>) -> String {
        let counter = self.tx_counter.fetch_add(1, Ordering::Relaxed);
        let mut hasher = blake3::Hasher::new();
        hasher.update(&user.to_le_bytes());
        hasher.update(&amount.to_le_bytes());
        hasher.update(&at.timestamp_millis().to_le_bytes());
        hasher.update(&counter.to_le_bytes());
        hex::encode(hasher.finalize().as_bytes())
    }

    /// Increments `coins` (or `locked_coins` when `opts.locked`) and appends
    /// the matching ledger row in one transaction. Wallet increment without
    /// a row, or a row without the increment, is a correctness violation.
    pub async fn credit_coins(
        &self,
        user: UserId,
        amount: u64,
        opts: CreditOptions,
    ) -> Result<Wallet> {
        let _guard = self.mutation_lock.lock().await;
        self.credit_coins_exclusive(user, amount, opts).await
    }

    /// Same transaction as `credit_coins` for callers that already hold the
    /// shared [`CoinEconomy::mutation_lock`].
    pub async fn credit_coins_exclusive(
        &self,
        user: UserId,
        amount: u64,
        opts: CreditOptions,
    ) -> Result<Wallet> {
        if amount == 0 {
            return self.store.get_wallet(user).await;
        }

        self.store.begin_transaction().await?;

        match self.credit_internal(user, amount, &opts).await {
            Ok(wallet) => {
                self.store.commit_transaction().await?;
                info!(
                    user = %user,
                    amount = amount,
                    locked = opts.locked,
                    source = %opts.source,
                    coins_after = wallet.coins,
                    locked_after = wallet.locked_coins,
                    "💰 Coins credited"
                );
                Ok(wallet)
            }
            Err(e) => {
                warn!(user = %user, amount = amount, error = %e, "❌ Coin credit rolled back");
                self.store.rollback_transaction().await?;
                Err(e)
            }
        }
    }

    async fn credit_internal(
        &self,
        user: UserId,
        amount: u64,
        opts: &CreditOptions,
    ) -> Result<Wallet> {
        let now = Utc::now();
        let mut wallet = self.store.get_wallet(user).await?;

        if opts.locked {
            wallet.locked_coins = wallet
                .locked_coins
                .checked_add(amount)
                .ok_or_else(|| LedgerError::BalanceOverflow(user.to_string()))?;
        } else {
            wallet.coins = wallet
                .coins
                .checked_add(amount)
                .ok_or_else(|| LedgerError::BalanceOverflow(user.to_string()))?;
        }
        self.store.put_wallet(wallet.clone()).await?;

        let tx = CoinTransaction {
            id: self.next_tx_id(user, amount as i64, now),
            user,
            amount: amount as i64,
            kind: TxKind::Earn,
            status: if opts.locked {
                TxStatus::Locked
            } else {
                TxStatus::Unlocked
            },
            unlocks_at: opts.unlocks_at,
            source: opts.source.clone(),
            metadata: opts.metadata.clone(),
            created_at: now,
        };
        self.store.record_coin_tx(tx).await?;

        Ok(wallet)
    }

    /// Rejects with `InsufficientCoins` before any write; otherwise
    /// decrements and appends the negative SPEND row atomically.
    pub async fn debit_coins(&self, user: UserId, amount: u64, source: &str) -> Result<Wallet> {
        if amount == 0 {
            return self.store.get_wallet(user).await;
        }

        let _guard = self.mutation_lock.lock().await;
        self.store.begin_transaction().await?;

        match self.debit_internal(user, amount, source).await {
            Ok(wallet) => {
                self.store.commit_transaction().await?;
                info!(
                    user = %user,
                    amount = amount,
                    source = source,
                    coins_after = wallet.coins,
                    "💸 Coins debited"
                );
                Ok(wallet)
            }
            Err(e) => {
                self.store.rollback_transaction().await?;
                Err(e)
            }
        }
    }

    async fn debit_internal(&self, user: UserId, amount: u64, source: &str) -> Result<Wallet> {
        let now = Utc::now();
        let mut wallet = self.store.get_wallet(user).await?;

        if wallet.coins < amount {
            return Err(LedgerError::InsufficientCoins {
                needed: amount,
                available: wallet.coins,
            });
        }

        wallet.coins -= amount;
        self.store.put_wallet(wallet.clone()).await?;

        let tx = CoinTransaction {
            id: self.next_tx_id(user, -(amount as i64), now),
            user,
            amount: -(amount as i64),
            kind: TxKind::Spend,
            status: TxStatus::Unlocked,
            unlocks_at: None,
            source: source.to_string(),
            metadata: None,
            created_at: now,
        };
        self.store.record_coin_tx(tx).await?;

        Ok(wallet)
    }

    /// Unlock sweep: every LOCKED row with `unlocks_at <= now` moves its
    /// amount from `locked_coins` to `coins` and flips to UNLOCKED, each row
    /// exactly once. Returns the number of rows processed.
    pub async fn unlock_expired(&self, now: DateTime<Utc>) -> Result<u32> {
        let _guard = self.mutation_lock.lock().await;
        self.store.begin_transaction().await?;

        match self.unlock_internal(now).await {
            Ok(count) => {
                self.store.commit_transaction().await?;
                if count > 0 {
                    info!(rows = count, "🔓 Locked coins released");
                }
                Ok(count)
            }
            Err(e) => {
                warn!(error = %e, "❌ Unlock sweep rolled back");
                self.store.rollback_transaction().await?;
                Err(e)
            }
        }
    }

    async fn unlock_internal(&self, now: DateTime<Utc>) -> Result<u32> {
        let due = self.store.locked_txs_due(now).await?;
        let mut processed = 0u32;

        for tx in due {
            let amount = tx.amount.unsigned_abs();
            let mut wallet = self.store.get_wallet(tx.user).await?;

            // A locked row without matching locked balance means the ledger
            // and wallet diverged; refuse to make it worse.
            wallet.locked_coins = wallet.locked_coins.checked_sub(amount).ok_or_else(|| {
                LedgerError::Storage(format!(
                    "locked balance underflow unlocking tx {} for {}",
                    tx.id, tx.user
                ))
            })?;
            wallet.coins = wallet
                .coins
                .checked_add(amount)
                .ok_or_else(|| LedgerError::BalanceOverflow(tx.user.to_string()))?;

            self.store.put_wallet(wallet).await?;
            self.store.mark_unlocked(&tx.id).await?;
            processed += 1;
        }

        Ok(processed)
    }

    pub async fn wallet(&self, user: UserId) -> Result<Wallet> {
        self.store.get_wallet(user).await
    }

    pub async fn coin_history(&self, user: UserId) -> Result<Vec<CoinTransaction>> {
        self.store.coin_history(user).await
    }
}
