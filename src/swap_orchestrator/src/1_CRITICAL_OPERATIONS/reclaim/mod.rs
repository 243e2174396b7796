//! Reclaim operations
//!
//! Moves funds held by the swap service back to the caller: either the
//! service's pooled main balance or the caller's derived escrow subaccount.
//! These move real funds and are only run on an explicit caller decision,
//! typically one of the `RecoveryAction`s attached to an `AmbiguousOutcome`.

use std::time::Duration;

use candid::Principal;

use crate::_4_TRADING_EXECUTION::SwapServiceClient;
use crate::infrastructure::session::Session;
use crate::infrastructure::{RecoveryAction, Result, SwapError};
use crate::types::ReclaimReceipt;

/// Run one recovery action with `session`'s identity
pub async fn execute_recovery(
    session: &Session,
    swap_canister: Principal,
    action: RecoveryAction,
    timeout: Duration,
) -> Result<ReclaimReceipt> {
    let client = SwapServiceClient::new(swap_canister, session);
    tracing::info!("🛟 Recovery requested by {}: {}", session.principal, action);

    let call = async {
        match action {
            RecoveryAction::ReclaimFromMain { ledger } => client.reclaim_from_main(ledger).await,
            RecoveryAction::ReclaimFromSubaccount { ledger } => client.reclaim_from_subaccount(ledger).await,
        }
    };

    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        // Sent but unanswered: the transfer may still land
        Err(_) => Err(SwapError::AmbiguousOutcome {
            operation: action.to_string(),
            reason: format!("no reply within {}s", timeout.as_secs()),
            recovery: vec![action],
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::constants::SWAP_RECLAIM_MAIN;
    use crate::testing::{from_ledger, swap_canister, FakeNetwork};
    use crate::types::LedgerAccount;

    #[tokio::test]
    async fn test_reclaim_from_main() {
        let net = FakeNetwork::standard();
        let session = net.session();
        net.set_balance(from_ledger(), LedgerAccount::main(swap_canister()), 1_010);

        let receipt = execute_recovery(
            &session,
            swap_canister(),
            RecoveryAction::ReclaimFromMain { ledger: from_ledger() },
            Duration::from_secs(5),
        )
        .await
        .unwrap();

        assert_eq!(receipt.ledger, from_ledger());
        assert_eq!(net.balance(from_ledger(), LedgerAccount::main(session.principal)), 1_000);
    }

    #[tokio::test]
    async fn test_empty_escrow_is_rejected() {
        let net = FakeNetwork::standard();
        let result = execute_recovery(
            &net.session(),
            swap_canister(),
            RecoveryAction::ReclaimFromSubaccount { ledger: from_ledger() },
            Duration::from_secs(5),
        )
        .await;

        assert!(matches!(result, Err(SwapError::ServiceRejected { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out_reclaim_is_ambiguous() {
        let net = FakeNetwork::standard();
        net.hang(SWAP_RECLAIM_MAIN);
        let action = RecoveryAction::ReclaimFromMain { ledger: from_ledger() };

        let result = execute_recovery(&net.session(), swap_canister(), action, Duration::from_secs(10)).await;
        match result {
            Err(err) => assert_eq!(err.recovery_actions(), &[action]),
            Ok(receipt) => panic!("expected AmbiguousOutcome, got {:?}", receipt),
        }
        assert_eq!(net.call_count(SWAP_RECLAIM_MAIN), 1);
    }
}
