pub mod economy;
pub mod shop;
pub mod store;
pub mod types;

pub use economy::{CoinEconomy, CreditOptions};
pub use shop::{PurchaseReceipt, ShopService};
pub use store::{LedgerStore, MemoryLedger};
pub use types::{
    Badge, BadgeAward, CoinTransaction, GamificationState, InventoryEntry, ItemEffect, ItemKind,
    ShopItem, TxKind, TxStatus, Wallet,
};
