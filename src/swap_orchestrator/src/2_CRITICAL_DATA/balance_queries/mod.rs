//! Reads that feed a write
//!
//! Every value returned here is read in the same step that consumes it and
//! must never be kept for a later step. Calls are issued one after the
//! other; nothing on the approve/execute path runs concurrently.

use std::future::Future;
use std::time::Duration;

use candid::Nat;

use crate::_3_LEDGER_ACCESS::LedgerQueries;
use crate::infrastructure::constants::{ICRC1_BALANCE_OF, ICRC1_FEE, ICRC2_ALLOWANCE};
use crate::infrastructure::{Result, SwapError};
use crate::types::{AllowanceInfo, LedgerAccount};

/// Balance and fee of one account, observed back to back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreshBalance {
    pub account: LedgerAccount,
    pub balance: Nat,
    pub fee: Nat,
}

pub async fn get_balance_and_fee_fresh(
    queries: &LedgerQueries,
    account: LedgerAccount,
    timeout: Duration,
) -> Result<FreshBalance> {
    tracing::debug!("📸 Reading balance and fee for {} on {}", account, queries.ledger());

    let balance = with_deadline(timeout, queries, ICRC1_BALANCE_OF, queries.balance_of(account)).await?;
    let fee = with_deadline(timeout, queries, ICRC1_FEE, queries.fee()).await?;

    tracing::debug!("  Balance: {}, fee: {}", balance, fee);
    Ok(FreshBalance { account, balance, fee })
}

pub async fn get_allowance_fresh(
    queries: &LedgerQueries,
    owner: LedgerAccount,
    spender: LedgerAccount,
    timeout: Duration,
) -> Result<AllowanceInfo> {
    with_deadline(timeout, queries, ICRC2_ALLOWANCE, queries.allowance(owner, spender)).await
}

async fn with_deadline<T>(
    timeout: Duration,
    queries: &LedgerQueries,
    operation: &str,
    call: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::time::timeout(timeout, call)
        .await
        .unwrap_or_else(|_| {
            Err(SwapError::Transport {
                operation: operation.to_string(),
                canister: queries.ledger().to_text(),
                message: format!("no reply within {}s", timeout.as_secs()),
                timed_out: true,
            })
        })
}
