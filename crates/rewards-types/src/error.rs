use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Insufficient coins: needed {needed}, available {available}")]
    InsufficientCoins { needed: u64, available: u64 },

    #[error("Shop item not found: {0}")]
    ItemNotFound(String),

    #[error("Coin balance overflow for user {0}")]
    BalanceOverflow(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

pub type Result<T> = std::result::Result<T, LedgerError>;
