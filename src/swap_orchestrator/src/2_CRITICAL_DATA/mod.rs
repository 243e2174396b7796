//! Critical Data - Fresh ledger observations
//! Source of truth for every amount the client acts on or displays
//!
//! - **balance_queries/**: sequential balance + fee reads feeding a write
//! - **observations/**: concurrent display-only reads per token

pub mod balance_queries;
pub mod observations;

pub use balance_queries::{get_balance_and_fee_fresh, get_allowance_fresh, FreshBalance};
pub use observations::{observe_token, TokenObservation};
