//! Informational - Display-ready views, no I/O

pub mod display;

pub use display::{build_view, BalanceViewModel, DisplayAmount, TokenBalanceView};
