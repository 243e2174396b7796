use candid::{CandidType, Deserialize, Nat, Principal};
use serde::Serialize;

/// Success payload of the swap service `swap` method
#[derive(CandidType, Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct SwapReceipt {
    /// Allowance the service found and pulled
    pub from_allowance: Nat,
    /// Balance escrowed in the caller's derived subaccount after the pull
    pub caller_canister_balance: Nat,
    /// Block index of the payout on the receiving ledger
    pub to_transfer_amount: Nat,
}

/// Result of a reclaim call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReclaimReceipt {
    pub ledger: Principal,
    pub block_index: Nat,
}
