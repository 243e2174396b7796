//! Session cache for immutable token metadata

use std::collections::HashMap;
use std::sync::RwLock;

use candid::Principal;

use crate::infrastructure::Result;
use crate::types::TokenMetadata;
use super::ledger_client::LedgerQueries;

/// Name, symbol and decimals never change for a ledger, so one fetch per
/// session is enough. The cached fee is for display only.
#[derive(Default)]
pub struct MetadataCache {
    entries: RwLock<HashMap<Principal, TokenMetadata>>,
}

impl MetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, ledger: &Principal) -> Option<TokenMetadata> {
        self.entries
            .read()
            .ok()
            .and_then(|entries| entries.get(ledger).cloned())
    }

    pub async fn get_or_fetch(&self, queries: &LedgerQueries) -> Result<TokenMetadata> {
        if let Some(hit) = self.get(&queries.ledger()) {
            return Ok(hit);
        }

        let fetched = queries.metadata().await?;
        tracing::debug!("📦 Cached metadata for {} ({})", fetched.symbol, fetched.ledger);
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(fetched.ledger, fetched.clone());
        }
        Ok(fetched)
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
        }
    }
}
