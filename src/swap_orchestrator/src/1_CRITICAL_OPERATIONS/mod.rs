//! Critical Operations - Swap traversal and fund recovery
//!
//! - **swap_flow/**: the orchestrator state machine (connect, approve, execute, settle)
//! - **reclaim/**: explicit recovery of escrowed funds, never invoked automatically

pub mod reclaim;
pub mod swap_flow;

pub use reclaim::execute_recovery;
pub use swap_flow::{PreparedSwap, SwapOrchestrator, SwapOutcome, SwapPhase};
