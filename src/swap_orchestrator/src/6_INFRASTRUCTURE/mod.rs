//! Infrastructure - Shared utilities and types
//! Foundation layer for all other modules

pub mod config;
pub mod constants;
pub mod errors;
pub mod logging;
pub mod math;
pub mod session;

// Re-export commonly used items
pub use config::{SpenderScheme, SwapConfig};
pub use errors::{CalculationError, RecoveryAction, Result, SwapError, SystemError, ValidationError};
pub use logging::init_logging;
pub use math::{calculate_approve_amount, to_base_units, to_decimal, to_display};
pub use session::{ConnectionState, Session, SessionManager};
