pub mod error;
pub mod id;
pub mod rank;

pub use error::{LedgerError, Result};
pub use id::UserId;
pub use rank::{Rank, RankTable};
