//! Protocol constants: method names, defaults, memos

/// Mainnet boundary node
pub const DEFAULT_HOST: &str = "https://icp-api.io";

pub const DEFAULT_CALL_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_ROUNDING_DIGITS: u32 = 3;

/// Memo attached to every approval issued by this client
pub const APPROVE_MEMO: &[u8] = b"token swap allowance";

// ICRC-1 / ICRC-2 ledger methods
pub const ICRC1_NAME: &str = "icrc1_name";
pub const ICRC1_SYMBOL: &str = "icrc1_symbol";
pub const ICRC1_DECIMALS: &str = "icrc1_decimals";
pub const ICRC1_FEE: &str = "icrc1_fee";
pub const ICRC1_BALANCE_OF: &str = "icrc1_balance_of";
pub const ICRC2_APPROVE: &str = "icrc2_approve";
pub const ICRC2_ALLOWANCE: &str = "icrc2_allowance";

// Swap service methods
pub const SWAP_EXECUTE: &str = "swap";
pub const SWAP_RECLAIM_MAIN: &str = "_dev_transfer_to_caller";
pub const SWAP_RECLAIM_SUBACCOUNT: &str = "_dev_transfer_to_subaccount_to_caller";
