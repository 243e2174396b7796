//! # ICRC-2 Approval Module
//!
//! Grants the swap service an allowance over the user's default account.
//!
//! ## Approval Flow
//! 1. Read balance and fee fresh from the ledger
//! 2. Approve `balance - fee` with the fee passed explicitly
//! 3. Swap service pulls the allowance via `transfer_from`
//!
//! ## Safety
//! - The spender is the service's per-user derived subaccount, so each user's
//!   escrow is isolated within the service account
//! - Optional expiry bounds how long an unused allowance stays live

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use candid::{Nat, Principal};

use crate::_3_LEDGER_ACCESS::ledger_client::{ApproveRequest, LedgerCommands};
use crate::infrastructure::config::SpenderScheme;
use crate::infrastructure::constants::APPROVE_MEMO;
use crate::infrastructure::math::calculate_approve_amount;
use crate::infrastructure::{Result, SwapError, SystemError};
use crate::types::LedgerAccount;

/// Spender account the swap service pulls from for `user`
pub fn spender_account(scheme: SpenderScheme, swap_canister: Principal, user: Principal) -> LedgerAccount {
    match scheme {
        SpenderScheme::DerivedSubaccount => LedgerAccount::derived(swap_canister, user),
        SpenderScheme::MainAccount => LedgerAccount::main(swap_canister),
    }
}

/// A fully computed approval, ready to submit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalPlan {
    pub ledger: Principal,
    pub spender: LedgerAccount,
    pub balance: Nat,
    pub fee: Nat,
    pub amount: Nat,
    pub expires_at: Option<u64>,
}

impl ApprovalPlan {
    /// Plan from a freshly read `balance` and `fee`.
    /// Fails with `InsufficientFunds` when `balance <= fee`.
    pub fn from_fresh_reads(
        ledger: Principal,
        spender: LedgerAccount,
        balance: Nat,
        fee: Nat,
        ttl: Option<Duration>,
    ) -> Result<Self> {
        let amount = calculate_approve_amount(&ledger, &balance, &fee)?;
        let expires_at = match ttl {
            Some(ttl) => {
                let nanos = u64::try_from(ttl.as_nanos()).map_err(|_| {
                    SwapError::System(SystemError::Config {
                        reason: format!("approval TTL of {}s does not fit ledger time", ttl.as_secs()),
                    })
                })?;
                Some(now_nanos().saturating_add(nanos))
            }
            None => None,
        };

        Ok(Self {
            ledger,
            spender,
            balance,
            fee,
            amount,
            expires_at,
        })
    }

    /// Submit via `icrc2_approve`. Returns the approval block index.
    pub async fn submit(&self, commands: &LedgerCommands) -> Result<Nat> {
        tracing::info!(
            "📝 Approving {} on {} for spender {} (balance {}, fee {})",
            self.amount,
            self.ledger,
            self.spender,
            self.balance,
            self.fee
        );

        let request = ApproveRequest {
            spender: self.spender,
            amount: self.amount.clone(),
            fee: Some(self.fee.clone()),
            expires_at: self.expires_at,
            expected_allowance: None,
            memo: Some(APPROVE_MEMO.to_vec()),
        };

        match commands.approve(request).await {
            Ok(block) => {
                tracing::info!("✅ Approval successful: {} on {} (block: {})", self.amount, self.ledger, block);
                Ok(block)
            }
            Err(e) => {
                tracing::warn!("❌ Approval failed on {}: {}", self.ledger, e);
                Err(e)
            }
        }
    }
}

/// Wall clock in nanoseconds since the epoch, the unit ICRC ledgers use
pub fn now_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}
