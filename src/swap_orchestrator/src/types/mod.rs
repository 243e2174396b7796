//! Domain and wire types shared across zones

pub mod icrc;
pub mod swap;
pub mod tokens;

pub use icrc::{derive_subaccount, AllowanceInfo, LedgerAccount};
pub use swap::{ReclaimReceipt, SwapReceipt};
pub use tokens::{TokenMetadata, TokenPair};
