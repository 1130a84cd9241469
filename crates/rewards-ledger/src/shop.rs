use crate::economy::CoinEconomy;
use crate::store::LedgerStore;
use crate::types::{CoinTransaction, InventoryEntry, ItemKind, TxKind, TxStatus};
use chrono::Utc;
use rewards_types::{LedgerError, Result, UserId};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseReceipt {
    pub new_coins: u64,
    pub quantity: u32,
}

/// Atomic shop purchase: item lookup, coin debit, inventory upsert and the
/// SPEND ledger row commit together or not at all. Serializes with every
/// other coin mutation through the economy's lock, so two purchases by the
/// same user cannot lose an inventory increment or a balance decrement.
pub struct ShopService {
    store: Arc<dyn LedgerStore>,
    economy: Arc<CoinEconomy>,
    mutation_lock: Arc<Mutex<()>>,
}

impl ShopService {
    pub fn new(store: Arc<dyn LedgerStore>, economy: Arc<CoinEconomy>) -> Self {
        let mutation_lock = economy.mutation_lock();
        Self {
            store,
            economy,
            mutation_lock,
        }
    }

    pub async fn purchase(&self, user: UserId, item_id: u64) -> Result<PurchaseReceipt> {
        let _guard = self.mutation_lock.lock().await;
        self.store.begin_transaction().await?;

        match self.purchase_internal(user, item_id).await {
            Ok(receipt) => {
                self.store.commit_transaction().await?;
                info!(
                    user = %user,
                    item_id = item_id,
                    coins_after = receipt.new_coins,
                    quantity = receipt.quantity,
                    "🛒 Purchase committed"
                );
                Ok(receipt)
            }
            Err(e) => {
                warn!(user = %user, item_id = item_id, error = %e, "❌ Purchase rolled back");
                self.store.rollback_transaction().await?;
                Err(e)
            }
        }
    }

    async fn purchase_internal(&self, user: UserId, item_id: u64) -> Result<PurchaseReceipt> {
        let now = Utc::now();

        // An inactive item is invisible to buyers
        let item = self
            .store
            .get_item(item_id)
            .await?
            .filter(|item| item.is_active)
            .ok_or_else(|| LedgerError::ItemNotFound(item_id.to_string()))?;

        let mut wallet = self.store.get_wallet(user).await?;
        if wallet.coins < item.cost {
            return Err(LedgerError::InsufficientCoins {
                needed: item.cost,
                available: wallet.coins,
            });
        }

        wallet.coins -= item.cost;
        self.store.put_wallet(wallet.clone()).await?;

        let entry = match self.store.get_inventory(user, item_id).await? {
            Some(mut entry) => {
                entry.quantity += 1;
                entry
            }
            None => InventoryEntry {
                user,
                item_id,
                quantity: 1,
                remaining_uses: if item.kind == ItemKind::Consumable {
                    Some(1)
                } else {
                    None
                },
                expires_at: None,
            },
        };
        let quantity = entry.quantity;
        self.store.put_inventory(entry).await?;

        let tx = CoinTransaction {
            id: self.economy.next_tx_id(user, -(item.cost as i64), now),
            user,
            amount: -(item.cost as i64),
            kind: TxKind::Spend,
            status: TxStatus::Unlocked,
            unlocks_at: None,
            source: "shop".to_string(),
            metadata: Some(serde_json::json!({ "item_id": item_id, "item": item.name })),
            created_at: now,
        };
        self.store.record_coin_tx(tx).await?;

        Ok(PurchaseReceipt {
            new_coins: wallet.coins,
            quantity,
        })
    }
}
