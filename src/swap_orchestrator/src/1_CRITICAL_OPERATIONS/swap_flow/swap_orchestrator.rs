//! Main swap orchestration logic

use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use candid::{Nat, Principal};

use crate::_1_CRITICAL_OPERATIONS::reclaim::execute_recovery;
use crate::_2_CRITICAL_DATA::{get_allowance_fresh, get_balance_and_fee_fresh, observe_token};
use crate::_3_LEDGER_ACCESS::{AgentTransport, CanisterTransport, LedgerCommands, LedgerQueries, MetadataCache};
use crate::_4_TRADING_EXECUTION::approvals::now_nanos;
use crate::_4_TRADING_EXECUTION::{spender_account, ApprovalPlan, SwapServiceClient};
use crate::_5_INFORMATIONAL::{build_view, BalanceViewModel};
use crate::infrastructure::constants::{ICRC2_ALLOWANCE, ICRC2_APPROVE, SWAP_EXECUTE};
use crate::infrastructure::session::{ConnectionState, Session, SessionManager, WalletProvider};
use crate::infrastructure::{RecoveryAction, Result, SwapConfig, SwapError, SystemError, ValidationError};
use crate::types::{AllowanceInfo, LedgerAccount, ReclaimReceipt, SwapReceipt, TokenMetadata, TokenPair};
use super::swap_state::{SwapPhase, SwapStateMachine, TraversalGuard};

const REFRESH_BALANCES: &str = "refresh_balances";
const NEW_REQUEST: [SwapPhase; 3] = [SwapPhase::Idle, SwapPhase::Settled, SwapPhase::Error];

/// Approval granted and confirmed on the ledger, not yet executed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedSwap {
    pub user: Principal,
    pub pair: TokenPair,
    pub spender: LedgerAccount,
    /// Balance and fee read right before the approval
    pub balance: Nat,
    pub fee: Nat,
    pub approved_amount: Nat,
    pub approve_block: Nat,
    /// Allowance re-read after the approval landed
    pub confirmed_allowance: AllowanceInfo,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapOutcome {
    pub prepared: PreparedSwap,
    pub receipt: SwapReceipt,
    /// Post-settlement refresh of both ledgers; `None` if that refresh failed
    pub balances: Option<BalanceViewModel>,
}

/// Coordinates session, approval, execution and balance refresh for one
/// configured token pair.
///
/// ## Usage
/// ```rust,no_run
/// # async fn run() -> swap_orchestrator::Result<()> {
/// use std::sync::Arc;
/// use swap_orchestrator::{PemIdentityProvider, SwapConfig, SwapOrchestrator};
///
/// let config = SwapConfig::from_env()?;
/// let wallet = Arc::new(PemIdentityProvider::new("identity.pem", config.fetch_root_key));
/// let orchestrator = SwapOrchestrator::from_config(config, wallet).await?;
///
/// match orchestrator.request_swap().await {
///     Ok(outcome) => println!("payout block {}", outcome.receipt.to_transfer_amount),
///     Err(e) if e.is_ambiguous() => {
///         for action in e.recovery_actions() {
///             println!("funds may be escrowed, recover with {}", action);
///         }
///     }
///     Err(e) => println!("swap failed: {}", e),
/// }
/// # Ok(())
/// # }
/// ```
pub struct SwapOrchestrator {
    config: SwapConfig,
    sessions: Arc<SessionManager>,
    public: Arc<dyn CanisterTransport>,
    metadata: MetadataCache,
    state: SwapStateMachine,
    prepared: Mutex<Option<PreparedSwap>>,
    view: RwLock<Option<BalanceViewModel>>,
}

impl SwapOrchestrator {
    /// `public` serves anonymous display reads; writes go through `sessions`
    pub fn new(config: SwapConfig, sessions: Arc<SessionManager>, public: Arc<dyn CanisterTransport>) -> Self {
        Self {
            config,
            sessions,
            public,
            metadata: MetadataCache::new(),
            state: SwapStateMachine::new(),
            prepared: Mutex::new(None),
            view: RwLock::new(None),
        }
    }

    /// Orchestrator talking to `config.host` through `ic-agent`
    pub async fn from_config(config: SwapConfig, provider: Arc<dyn WalletProvider>) -> Result<Self> {
        let public = AgentTransport::anonymous(&config.host, config.fetch_root_key).await?;
        let sessions = Arc::new(SessionManager::new(provider, config.host.clone(), config.connect_timeout));
        Ok(Self::new(config, sessions, Arc::new(public)))
    }

    pub fn config(&self) -> &SwapConfig {
        &self.config
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.sessions.state()
    }

    pub fn principal(&self) -> Option<Principal> {
        self.sessions.principal()
    }

    pub fn phase(&self) -> SwapPhase {
        self.state.phase()
    }

    pub fn last_error(&self) -> Option<SwapError> {
        self.state.last_error()
    }

    pub fn prepared(&self) -> Option<PreparedSwap> {
        self.lock_prepared().clone()
    }

    /// Last computed view model, if any
    pub fn balances(&self) -> Option<BalanceViewModel> {
        self.view.read().ok().and_then(|view| view.clone())
    }

    pub fn pair(&self) -> TokenPair {
        TokenPair {
            from_ledger: self.config.from_ledger,
            to_ledger: self.config.to_ledger,
        }
    }

    /// Connect with every canister this orchestrator calls declared up front
    pub async fn connect(&self) -> Result<Principal> {
        let session = self.sessions.connect(&self.config.scopes()).await?;
        Ok(session.principal)
    }

    /// Drop the session and any prepared swap, back to `Idle`.
    /// Refused while a traversal call is outstanding.
    pub fn disconnect(&self) -> Result<()> {
        self.state.reset()?;
        *self.lock_prepared() = None;
        self.sessions.disconnect();
        Ok(())
    }

    // ===== SWAP TRAVERSAL =====

    /// Full traversal: connect, approve `balance - fee`, confirm, execute, settle
    pub async fn request_swap(&self) -> Result<SwapOutcome> {
        let mut guard = self.state.begin(&NEW_REQUEST, SwapPhase::AwaitingSession)?;
        let pair = self.pair();
        tracing::info!("🔄 Swap requested: {} → {}", pair.from_ledger, pair.to_ledger);

        let (session, prepared) = match self.approve_steps(&guard).await {
            Ok(approved) => approved,
            Err(e) => return Err(guard.fail(e)),
        };

        let receipt = match self.execute_steps(&mut guard, &session, &prepared).await {
            Ok(receipt) => receipt,
            Err(e) => return Err(guard.fail(e)),
        };

        self.settle(guard, prepared, receipt).await
    }

    /// First half of the traversal; rests in `Approved`
    pub async fn prepare_swap(&self) -> Result<PreparedSwap> {
        let guard = self.state.begin(&NEW_REQUEST, SwapPhase::AwaitingSession)?;

        match self.approve_steps(&guard).await {
            Ok((_, prepared)) => {
                *self.lock_prepared() = Some(prepared.clone());
                guard.release();
                Ok(prepared)
            }
            Err(e) => Err(guard.fail(e)),
        }
    }

    /// Second half of the traversal, from `Approved`.
    ///
    /// The allowance is read again first; a zero or expired allowance fails
    /// with `NoAllowance` before anything is sent to the swap service.
    pub async fn execute_prepared(&self) -> Result<SwapOutcome> {
        let phase = self.state.phase();
        if phase != SwapPhase::Approved && !phase.is_busy() {
            return Err(SwapError::System(SystemError::InvalidTransition {
                from: phase.to_string(),
                to: SwapPhase::Executing.to_string(),
            }));
        }
        let mut guard = self.state.begin(&[SwapPhase::Approved], SwapPhase::Approved)?;

        let prepared = match self.prepared() {
            Some(prepared) => prepared,
            None => {
                return Err(guard.fail(SwapError::System(SystemError::InvalidTransition {
                    from: SwapPhase::Approved.to_string(),
                    to: SwapPhase::Executing.to_string(),
                })))
            }
        };

        let session = match self.prepared_session(&prepared) {
            Ok(session) => session,
            Err(e) => return Err(guard.fail(e)),
        };

        if let Err(e) = self.recheck_allowance(&session, &prepared).await {
            return Err(guard.fail(e));
        }

        let receipt = match self.execute_steps(&mut guard, &session, &prepared).await {
            Ok(receipt) => receipt,
            Err(e) => return Err(guard.fail(e)),
        };

        self.settle(guard, prepared, receipt).await
    }

    /// Back to `Idle` from `Approved`, `Settled` or `Error`
    pub fn reset(&self) -> Result<()> {
        self.state.reset()?;
        *self.lock_prepared() = None;
        Ok(())
    }

    async fn approve_steps(&self, guard: &TraversalGuard<'_>) -> Result<(Session, PreparedSwap)> {
        // Step 1: Session
        let session = self.sessions.connect(&self.config.scopes()).await?;
        guard.advance(SwapPhase::AwaitingApproval)?;

        let pair = self.pair();
        let owner = LedgerAccount::main(session.principal);
        let spender = spender_account(self.config.spender_scheme, self.config.swap_canister, session.principal);
        let queries = LedgerQueries::new(pair.from_ledger, session.transport.clone());

        // Step 2: Fresh balance and fee, consumed right here
        let fresh = get_balance_and_fee_fresh(&queries, owner, self.config.call_timeout).await?;
        let plan = ApprovalPlan::from_fresh_reads(
            pair.from_ledger,
            spender,
            fresh.balance,
            fresh.fee,
            self.config.approval_ttl,
        )?;

        // Step 3: Approve
        let commands = LedgerCommands::new(pair.from_ledger, &session);
        let approve_block = match tokio::time::timeout(self.config.call_timeout, plan.submit(&commands)).await {
            Ok(reply) => reply?,
            Err(_) => {
                // Sent but unanswered: the allowance may still be granted
                tracing::warn!("⚠️ Approve of {} for {} unanswered, allowance unknown", plan.amount, spender);
                return Err(SwapError::AmbiguousOutcome {
                    operation: ICRC2_APPROVE.to_string(),
                    reason: format!(
                        "no reply within {}s, allowance for {} may still be granted",
                        self.config.call_timeout.as_secs(),
                        spender
                    ),
                    recovery: Vec::new(),
                });
            }
        };

        // Step 4: Confirm what the ledger now holds, never the amount we asked for
        let confirmed = get_allowance_fresh(&queries, owner, spender, self.config.call_timeout).await?;
        if !confirmed.is_usable(now_nanos()) {
            return Err(SwapError::ServiceRejected {
                operation: ICRC2_ALLOWANCE.to_string(),
                canister: pair.from_ledger.to_text(),
                reason: format!(
                    "approved {} (block {}) but ledger reports allowance {}",
                    plan.amount, approve_block, confirmed.amount
                ),
                recovery: Vec::new(),
            });
        }
        tracing::info!("✅ Allowance confirmed: {} for {}", confirmed.amount, spender);

        guard.advance(SwapPhase::Approved)?;
        Ok((
            session,
            PreparedSwap {
                user: owner.owner,
                pair,
                spender,
                balance: plan.balance,
                fee: plan.fee,
                approved_amount: plan.amount,
                approve_block,
                confirmed_allowance: confirmed,
            },
        ))
    }

    async fn recheck_allowance(&self, session: &Session, prepared: &PreparedSwap) -> Result<()> {
        let queries = LedgerQueries::new(prepared.pair.from_ledger, session.transport.clone());
        let current = get_allowance_fresh(
            &queries,
            LedgerAccount::main(prepared.user),
            prepared.spender,
            self.config.call_timeout,
        )
        .await?;

        if !current.is_usable(now_nanos()) {
            tracing::warn!("❌ Allowance for {} is gone ({}), not executing", prepared.spender, current.amount);
            return Err(SwapError::Validation(ValidationError::NoAllowance {
                ledger: prepared.pair.from_ledger.to_text(),
                spender: prepared.spender.to_string(),
            }));
        }
        Ok(())
    }

    async fn execute_steps(
        &self,
        guard: &mut TraversalGuard<'_>,
        session: &Session,
        prepared: &PreparedSwap,
    ) -> Result<SwapReceipt> {
        guard.advance(SwapPhase::Executing)?;

        let from = prepared.pair.from_ledger;
        let recovery = vec![
            RecoveryAction::ReclaimFromSubaccount { ledger: from },
            RecoveryAction::ReclaimFromMain { ledger: from },
        ];
        guard.mark_unconfirmed(SWAP_EXECUTE, recovery.clone());

        let ambiguous = |reason: String| {
            tracing::warn!("⚠️ Swap outcome unknown: {}. Funds may be escrowed, recovery: {:?}", reason, recovery);
            SwapError::AmbiguousOutcome {
                operation: SWAP_EXECUTE.to_string(),
                reason,
                recovery: recovery.clone(),
            }
        };

        let client = SwapServiceClient::new(self.config.swap_canister, session);
        let reply = tokio::time::timeout(
            self.config.call_timeout,
            client.execute_swap(from, prepared.pair.to_ledger),
        )
        .await;

        match reply {
            Ok(Ok(receipt)) => Ok(receipt),
            Ok(Err(e @ SwapError::Transport { .. })) | Ok(Err(e @ SwapError::MalformedResponse { .. })) => {
                Err(ambiguous(e.to_string()))
            }
            Ok(Err(SwapError::ServiceRejected { operation, canister, reason, .. })) => {
                // The service may have pulled the allowance into escrow before refusing
                tracing::warn!("❌ Swap rejected: {}. Escrowed funds recoverable via {:?}", reason, recovery);
                Err(SwapError::ServiceRejected {
                    operation,
                    canister,
                    reason,
                    recovery: recovery.clone(),
                })
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(ambiguous(format!(
                "no reply within {}s",
                self.config.call_timeout.as_secs()
            ))),
        }
    }

    async fn settle(&self, guard: TraversalGuard<'_>, prepared: PreparedSwap, receipt: SwapReceipt) -> Result<SwapOutcome> {
        if let Err(e) = guard.advance(SwapPhase::Settled) {
            return Err(guard.fail(e));
        }
        guard.release();
        *self.lock_prepared() = None;

        tracing::info!(
            "✅ Swap settled: allowance {} pulled, {} escrowed, payout block {}",
            receipt.from_allowance,
            receipt.caller_canister_balance,
            receipt.to_transfer_amount
        );

        let balances = match self.refresh_balances().await {
            Ok(view) => Some(view),
            Err(e) => {
                tracing::warn!("⚠️ Post-swap balance refresh failed: {}", e);
                None
            }
        };

        Ok(SwapOutcome {
            prepared,
            receipt,
            balances,
        })
    }

    fn prepared_session(&self, prepared: &PreparedSwap) -> Result<Session> {
        let session = self.sessions.require()?;
        if session.principal != prepared.user {
            return Err(SwapError::ConnectionFailed {
                reason: format!(
                    "session changed from {} to {} since approval",
                    prepared.user, session.principal
                ),
            });
        }
        Ok(session)
    }

    // ===== BALANCES =====

    /// Re-read every observation point of both ledgers and rebuild the view.
    /// Rejected while a traversal has a call outstanding; a swap request made
    /// while the reads run is rejected in turn.
    pub async fn refresh_balances(&self) -> Result<BalanceViewModel> {
        let _refreshing = self.state.begin_refresh()?;

        let user = self.sessions.principal();
        let pair = self.pair();
        let from = LedgerQueries::new(pair.from_ledger, self.public.clone());
        let to = LedgerQueries::new(pair.to_ledger, self.public.clone());
        let swap = self.config.swap_canister;
        let scheme = self.config.spender_scheme;

        let reads = async {
            futures::try_join!(
                observe_token(&from, &self.metadata, swap, user, scheme),
                observe_token(&to, &self.metadata, swap, user, scheme),
            )
        };
        let (from_obs, to_obs) = match tokio::time::timeout(self.config.call_timeout, reads).await {
            Ok(observed) => observed?,
            Err(_) => {
                return Err(SwapError::Transport {
                    operation: REFRESH_BALANCES.to_string(),
                    canister: format!("{}, {}", pair.from_ledger, pair.to_ledger),
                    message: format!("no reply within {}s", self.config.call_timeout.as_secs()),
                    timed_out: true,
                })
            }
        };

        let view = build_view(user, &[from_obs, to_obs], self.config.rounding_digits);
        if let Ok(mut slot) = self.view.write() {
            *slot = Some(view.clone());
        }
        Ok(view)
    }

    pub async fn token_metadata(&self, ledger: Principal) -> Result<TokenMetadata> {
        self.metadata
            .get_or_fetch(&LedgerQueries::new(ledger, self.public.clone()))
            .await
    }

    // ===== RECOVERY =====

    pub async fn reclaim_from_main(&self, ledger: Principal) -> Result<ReclaimReceipt> {
        self.recover(RecoveryAction::ReclaimFromMain { ledger }).await
    }

    pub async fn reclaim_from_subaccount(&self, ledger: Principal) -> Result<ReclaimReceipt> {
        self.recover(RecoveryAction::ReclaimFromSubaccount { ledger }).await
    }

    /// Run a recovery action with the connected identity
    pub async fn recover(&self, action: RecoveryAction) -> Result<ReclaimReceipt> {
        self.state.ensure_quiet()?;
        let session = self.sessions.require()?;
        execute_recovery(&session, self.config.swap_canister, action, self.config.call_timeout).await
    }

    fn lock_prepared(&self) -> MutexGuard<'_, Option<PreparedSwap>> {
        self.prepared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
