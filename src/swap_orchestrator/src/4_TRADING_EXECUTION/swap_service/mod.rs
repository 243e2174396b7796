//! # Swap Service Client
//!
//! Typed calls to the swap service canister, signed by the session identity.
//!
//! - `execute_swap(from, to)`: the service pulls the granted allowance from
//!   `from` into the caller's escrow subaccount and pays out on `to`
//! - `reclaim_from_main(ledger)`: pooled service balance back to the caller
//! - `reclaim_from_subaccount(ledger)`: caller's escrow subaccount back to the caller
//!
//! The reclaim methods are privileged, developer-facing recovery tools.

use std::sync::Arc;

use candid::{Nat, Principal};

use crate::_3_LEDGER_ACCESS::transport::{call_candid, CallKind};
use crate::_3_LEDGER_ACCESS::CanisterTransport;
use crate::infrastructure::constants::{SWAP_EXECUTE, SWAP_RECLAIM_MAIN, SWAP_RECLAIM_SUBACCOUNT};
use crate::infrastructure::session::Session;
use crate::infrastructure::{Result, SwapError};
use crate::types::{ReclaimReceipt, SwapReceipt};

#[derive(Clone)]
pub struct SwapServiceClient {
    canister: Principal,
    transport: Arc<dyn CanisterTransport>,
}

impl SwapServiceClient {
    pub fn new(canister: Principal, session: &Session) -> Self {
        Self {
            canister,
            transport: session.transport.clone(),
        }
    }

    pub fn canister(&self) -> Principal {
        self.canister
    }

    /// Not idempotent: a transport error here does not prove the swap failed
    pub async fn execute_swap(&self, from_ledger: Principal, to_ledger: Principal) -> Result<SwapReceipt> {
        tracing::info!("🔄 Executing swap {} → {} via {}", from_ledger, to_ledger, self.canister);

        let reply: std::result::Result<SwapReceipt, String> = call_candid(
            self.transport.as_ref(),
            CallKind::Update,
            self.canister,
            SWAP_EXECUTE,
            candid::encode_args((from_ledger, to_ledger)),
        )
        .await?;

        reply.map_err(|reason| {
            tracing::warn!("❌ Swap rejected by service: {}", reason);
            self.rejected(SWAP_EXECUTE, reason)
        })
    }

    pub async fn reclaim_from_main(&self, ledger: Principal) -> Result<ReclaimReceipt> {
        self.reclaim(SWAP_RECLAIM_MAIN, ledger).await
    }

    pub async fn reclaim_from_subaccount(&self, ledger: Principal) -> Result<ReclaimReceipt> {
        self.reclaim(SWAP_RECLAIM_SUBACCOUNT, ledger).await
    }

    async fn reclaim(&self, method: &str, ledger: Principal) -> Result<ReclaimReceipt> {
        tracing::info!("↩️ {} on {}", method, ledger);

        let reply: std::result::Result<Nat, String> = call_candid(
            self.transport.as_ref(),
            CallKind::Update,
            self.canister,
            method,
            candid::encode_one(ledger),
        )
        .await?;

        let block_index = reply.map_err(|reason| self.rejected(method, reason))?;
        tracing::info!("✅ {} on {} complete (block: {})", method, ledger, block_index);
        Ok(ReclaimReceipt { ledger, block_index })
    }

    fn rejected(&self, operation: &str, reason: String) -> SwapError {
        SwapError::ServiceRejected {
            operation: operation.to_string(),
            canister: self.canister.to_text(),
            reason,
            recovery: Vec::new(),
        }
    }
}
