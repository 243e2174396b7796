//! # Ledger Access Module
//!
//! Typed access to ICRC-1/ICRC-2 ledgers.
//!
//! ## Architecture
//! - **transport/**: `CanisterTransport` seam, failure classification, scoping
//! - **agent_transport/**: `ic-agent` implementation of the seam
//! - **ledger_client/**: anonymous queries and authenticated approve
//! - **metadata/**: per-session cache of immutable token metadata
//!
//! ## Key Constraints
//! - **No retries**: every failure is classified and returned, policy lives in the orchestrator
//! - **No balance or allowance caching**: those are always read from the ledger
//! - **Optional subaccounts** are translated to the wire only here

pub mod agent_transport;
pub mod ledger_client;
pub mod metadata;
pub mod transport;

pub use agent_transport::AgentTransport;
pub use ledger_client::{LedgerCommands, LedgerQueries};
pub use metadata::MetadataCache;
pub use transport::{CanisterTransport, ScopedTransport, TransportFailure};
