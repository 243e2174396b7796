//! Display-only observations
//!
//! The four observation points per token (swap-service main balance,
//! the user's escrow subaccount at the swap service, the user's own
//! balance, the approved allowance) plus metadata and the current fee.
//! Nothing here feeds a write, so the reads for one token run concurrently.

use candid::{Nat, Principal};

use crate::_3_LEDGER_ACCESS::{LedgerQueries, MetadataCache};
use crate::_4_TRADING_EXECUTION::spender_account;
use crate::infrastructure::{Result, SpenderScheme};
use crate::types::{AllowanceInfo, LedgerAccount, TokenMetadata};

/// Raw integer observations for one ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenObservation {
    pub metadata: TokenMetadata,
    pub fee: Nat,
    pub service_main: Nat,
    /// `None` when no user is connected
    pub service_derived: Option<Nat>,
    pub user_balance: Option<Nat>,
    pub allowance: Option<AllowanceInfo>,
}

pub async fn observe_token(
    queries: &LedgerQueries,
    metadata: &MetadataCache,
    swap_canister: Principal,
    user: Option<Principal>,
    scheme: SpenderScheme,
) -> Result<TokenObservation> {
    let meta = metadata.get_or_fetch(queries).await?;

    let service_derived = async {
        match user {
            Some(user) => queries.balance_of(LedgerAccount::derived(swap_canister, user)).await.map(Some),
            None => Ok(None),
        }
    };
    let user_balance = async {
        match user {
            Some(user) => queries.balance_of(LedgerAccount::main(user)).await.map(Some),
            None => Ok(None),
        }
    };
    let allowance = async {
        match user {
            Some(user) => queries
                .allowance(LedgerAccount::main(user), spender_account(scheme, swap_canister, user))
                .await
                .map(Some),
            None => Ok(None),
        }
    };

    let (fee, service_main, service_derived, user_balance, allowance) = futures::try_join!(
        queries.fee(),
        queries.balance_of(LedgerAccount::main(swap_canister)),
        service_derived,
        user_balance,
        allowance,
    )?;

    Ok(TokenObservation {
        metadata: meta,
        fee,
        service_main,
        service_derived,
        user_balance,
        allowance,
    })
}
