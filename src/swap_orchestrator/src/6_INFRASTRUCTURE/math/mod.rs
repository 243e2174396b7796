//! Pure arithmetic - no I/O, no async

pub mod decimal;
pub mod pure_math;

pub use decimal::{to_base_units, to_decimal, to_display};
pub use pure_math::calculate_approve_amount;
