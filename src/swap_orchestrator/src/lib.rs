//! Swap Orchestrator - ICRC-2 token swaps through a pull-based swap service
//!
//! Architecture:
//! 1_CRITICAL_OPERATIONS - Swap traversal state machine, fund recovery
//! 2_CRITICAL_DATA - Fresh balance, fee and allowance observations
//! 3_LEDGER_ACCESS - Transport seam, ic-agent transport, ICRC ledger façade
//! 4_TRADING_EXECUTION - Approvals and swap service calls
//! 5_INFORMATIONAL - Balance view model
//! 6_INFRASTRUCTURE - Config, errors, logging, math, session

// Import numbered modules with explicit paths
#[path = "1_CRITICAL_OPERATIONS/mod.rs"]
mod critical_operations_1;
use critical_operations_1 as _1_CRITICAL_OPERATIONS;

#[path = "2_CRITICAL_DATA/mod.rs"]
mod critical_data_2;
use critical_data_2 as _2_CRITICAL_DATA;

#[path = "3_LEDGER_ACCESS/mod.rs"]
mod ledger_access_3;
use ledger_access_3 as _3_LEDGER_ACCESS;

#[path = "4_TRADING_EXECUTION/mod.rs"]
mod trading_execution_4;
use trading_execution_4 as _4_TRADING_EXECUTION;

#[path = "5_INFORMATIONAL/mod.rs"]
mod informational_5;
use informational_5 as _5_INFORMATIONAL;

#[path = "6_INFRASTRUCTURE/mod.rs"]
mod infrastructure_6;
use infrastructure_6 as infrastructure;

pub mod types;

#[cfg(test)]
mod testing;

// ===== PUBLIC API =====

pub use _1_CRITICAL_OPERATIONS::{execute_recovery, PreparedSwap, SwapOrchestrator, SwapOutcome, SwapPhase};
pub use _2_CRITICAL_DATA::{FreshBalance, TokenObservation};
pub use _3_LEDGER_ACCESS::ledger_client::ApproveRequest;
pub use _3_LEDGER_ACCESS::{
    AgentTransport, CanisterTransport, LedgerCommands, LedgerQueries, MetadataCache, ScopedTransport,
    TransportFailure,
};
pub use _4_TRADING_EXECUTION::{spender_account, ApprovalPlan, SwapServiceClient};
pub use _5_INFORMATIONAL::{BalanceViewModel, DisplayAmount, TokenBalanceView};
pub use infrastructure::config::parse_principal;
pub use infrastructure::session::{
    ConnectionState, PemIdentityProvider, Session, SessionManager, WalletConnection, WalletProvider,
    WalletRejection,
};
pub use infrastructure::{
    calculate_approve_amount, init_logging, to_base_units, to_decimal, to_display, CalculationError,
    RecoveryAction, Result, SpenderScheme, SwapConfig, SwapError, SystemError, ValidationError,
};
pub use types::{AllowanceInfo, LedgerAccount, ReclaimReceipt, SwapReceipt, TokenMetadata, TokenPair};

pub mod constants {
    pub use crate::infrastructure::constants::*;
}
