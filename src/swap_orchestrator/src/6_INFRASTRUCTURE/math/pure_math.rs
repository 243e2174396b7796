//! Pure mathematical functions - no I/O, no async
//! All functions here must be deterministic and side-effect free

use candid::{Nat, Principal};
use crate::infrastructure::{Result, SwapError};

/// Amount to approve so the spender can pull the whole remaining balance
///
/// The approve call itself burns one fee, so the allowance that can still be
/// covered afterwards is `balance - fee`. Fails when nothing would remain.
pub fn calculate_approve_amount(ledger: &Principal, balance: &Nat, fee: &Nat) -> Result<Nat> {
    if balance <= fee {
        return Err(SwapError::InsufficientFunds {
            ledger: ledger.to_text(),
            balance: balance.to_string(),
            fee: fee.to_string(),
        });
    }

    Ok(balance.clone() - fee.clone())
}
