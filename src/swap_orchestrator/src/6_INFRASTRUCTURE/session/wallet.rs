//! Wallet provider seam
//!
//! The provider owns key material and hands back a signing transport once
//! the user accepts. `PemIdentityProvider` is the headless implementation
//! backed by a PEM key file, as used by `dfx identity export`.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use candid::Principal;
use ic_agent::identity::BasicIdentity;
use thiserror::Error;

use crate::_3_LEDGER_ACCESS::{AgentTransport, CanisterTransport};

pub struct WalletConnection {
    pub principal: Principal,
    pub transport: Arc<dyn CanisterTransport>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WalletRejection {
    #[error("user rejected the connection request")]
    UserRejected,
    #[error("wallet provider unavailable: {0}")]
    ProviderUnavailable(String),
    #[error("wallet error: {0}")]
    Other(String),
}

#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Ask the user to connect, granting access to exactly `scopes`
    async fn request_connect(
        &self,
        scopes: &[Principal],
        host: &str,
    ) -> std::result::Result<WalletConnection, WalletRejection>;
}

/// Signs with an Ed25519 key loaded from a PEM file
pub struct PemIdentityProvider {
    pem_path: PathBuf,
    fetch_root_key: bool,
}

impl PemIdentityProvider {
    pub fn new(pem_path: impl Into<PathBuf>, fetch_root_key: bool) -> Self {
        Self {
            pem_path: pem_path.into(),
            fetch_root_key,
        }
    }
}

#[async_trait]
impl WalletProvider for PemIdentityProvider {
    async fn request_connect(
        &self,
        scopes: &[Principal],
        host: &str,
    ) -> std::result::Result<WalletConnection, WalletRejection> {
        let identity = BasicIdentity::from_pem_file(&self.pem_path).map_err(|e| {
            WalletRejection::ProviderUnavailable(format!("{}: {}", self.pem_path.display(), e))
        })?;

        let transport = AgentTransport::with_identity(host, identity, self.fetch_root_key)
            .await
            .map_err(|e| WalletRejection::Other(e.to_string()))?;
        let principal = transport
            .principal()
            .map_err(|e| WalletRejection::Other(e.to_string()))?;

        tracing::info!("🔑 Loaded identity {} for {} canisters", principal, scopes.len());

        Ok(WalletConnection {
            principal,
            transport: Arc::new(transport),
        })
    }
}
