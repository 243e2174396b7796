//! # Trading Execution Module
//!
//! Writes that move or authorize funds.
//!
//! ## Architecture
//! - **approvals/**: ICRC-2 approval of the swap service's spender account
//! - **swap_service/**: `swap` and the two reclaim escape hatches
//!
//! ## Key Constraints
//! - **Pull-based settlement**: the service pulls what was approved, no amount is sent
//! - **No retries**: an execute that times out is reported, never re-sent
//! - **Reclaims are explicit**: nothing here calls them on its own

pub mod approvals;
pub mod swap_service;

pub use approvals::{spender_account, ApprovalPlan};
pub use swap_service::SwapServiceClient;
