//! Swap flow - the orchestration state machine
//!
//! `Idle → AwaitingSession → AwaitingApproval → Approved → Executing → Settled`,
//! with `Error` reachable from every non-terminal phase.

pub mod swap_orchestrator;
pub mod swap_state;


pub use swap_orchestrator::{PreparedSwap, SwapOrchestrator, SwapOutcome};
pub use swap_state::{RefreshGuard, SwapPhase, SwapStateMachine, TraversalGuard};
