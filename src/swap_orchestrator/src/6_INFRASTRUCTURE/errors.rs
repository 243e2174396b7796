//! Error taxonomy for the swap client
//!
//! Remote-facing failures are top-level variants so callers can branch on
//! them directly. Local failures are grouped into category enums.

use candid::Principal;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SwapError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SwapError {
    /// Wallet refused, was absent, or timed out
    #[error("Connection failed: {reason}")]
    ConnectionFailed { reason: String },

    #[error("Transport failure during {operation} on {canister}: {message}")]
    Transport {
        operation: String,
        canister: String,
        message: String,
        timed_out: bool,
    },

    /// The remote service processed the call and refused it. `recovery` is
    /// non-empty when the refusal came after funds were already pulled.
    #[error("{canister} rejected {operation}: {reason}{}", recovery_suffix(.recovery))]
    ServiceRejected {
        operation: String,
        canister: String,
        reason: String,
        recovery: Vec<RecoveryAction>,
    },

    #[error("Insufficient funds on {ledger}: balance {balance} does not cover fee {fee}")]
    InsufficientFunds {
        ledger: String,
        balance: String,
        fee: String,
    },

    /// Result of a non-idempotent call is unknown. Funds may have moved.
    #[error("Outcome of {operation} is unknown ({reason}); recovery: {}", format_recovery(.recovery))]
    AmbiguousOutcome {
        operation: String,
        reason: String,
        recovery: Vec<RecoveryAction>,
    },

    #[error("Malformed response from {canister} for {operation}: {details}")]
    MalformedResponse {
        operation: String,
        canister: String,
        details: String,
    },

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Calculation error: {0}")]
    Calculation(#[from] CalculationError),

    #[error("System error: {0}")]
    System(#[from] SystemError),
}

/// Explicit operator actions that move escrowed funds back to the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    ReclaimFromMain { ledger: Principal },
    ReclaimFromSubaccount { ledger: Principal },
}

impl std::fmt::Display for RecoveryAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecoveryAction::ReclaimFromMain { ledger } => write!(f, "reclaim_from_main({})", ledger),
            RecoveryAction::ReclaimFromSubaccount { ledger } => {
                write!(f, "reclaim_from_subaccount({})", ledger)
            }
        }
    }
}

fn format_recovery(actions: &[RecoveryAction]) -> String {
    if actions.is_empty() {
        return "none needed".to_string();
    }
    actions
        .iter()
        .map(|a| a.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn recovery_suffix(actions: &[RecoveryAction]) -> String {
    if actions.is_empty() {
        String::new()
    } else {
        format!("; recovery: {}", format_recovery(actions))
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid principal {text}: {reason}")]
    InvalidPrincipal { text: String, reason: String },

    #[error("Invalid amount '{amount}': {reason}")]
    InvalidAmount { amount: String, reason: String },

    #[error("No usable allowance for spender {spender} on {ledger}")]
    NoAllowance { ledger: String, spender: String },

    #[error("From and to ledger must differ, both are {ledger}")]
    SameLedger { ledger: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CalculationError {
    #[error("Precision loss in {operation}: {details}")]
    PrecisionLoss { operation: String, details: String },

    #[error("Overflow in {operation}")]
    Overflow { operation: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SystemError {
    #[error("A swap is already in progress (phase: {phase})")]
    SwapInProgress { phase: String },

    #[error("No wallet session, connect first")]
    NotConnected,

    #[error("Call to {canister} is outside the connected session scopes")]
    OutOfScope { canister: String },

    #[error("Configuration error: {reason}")]
    Config { reason: String },

    #[error("Candid encoding failed for {operation}: {details}")]
    Encoding { operation: String, details: String },

    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Balance refresh in progress ({readers} running), retry once it completes")]
    RefreshInProgress { readers: usize },

    #[error("Swap traversal abandoned during {phase}")]
    Abandoned { phase: String },
}

impl SwapError {
    /// True when a reclaim may be needed to recover funds
    pub fn is_ambiguous(&self) -> bool {
        matches!(self, SwapError::AmbiguousOutcome { .. })
    }

    /// Recovery operations attached to the error, empty when no funds can be stranded
    pub fn recovery_actions(&self) -> &[RecoveryAction] {
        match self {
            SwapError::AmbiguousOutcome { recovery, .. } | SwapError::ServiceRejected { recovery, .. } => recovery,
            _ => &[],
        }
    }
}
