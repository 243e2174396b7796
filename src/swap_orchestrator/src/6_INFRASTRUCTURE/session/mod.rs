//! Identity / session manager
//!
//! `Disconnected → Connecting → Connected → Disconnected`
//!
//! A connection request declares every canister the session will call, up
//! front, and the resulting transport is scoped to exactly those canisters.
//! While a request is pending, further `connect` calls await the same
//! wallet prompt instead of opening a second one.

pub mod wallet;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use candid::Principal;
use futures::future::{BoxFuture, FutureExt, Shared};

use crate::_3_LEDGER_ACCESS::{CanisterTransport, ScopedTransport};
use crate::infrastructure::{Result, SwapError, SystemError};

pub use wallet::{PemIdentityProvider, WalletConnection, WalletProvider, WalletRejection};

/// Active signing identity and its scoped transport. Never persisted.
#[derive(Clone)]
pub struct Session {
    pub principal: Principal,
    pub transport: Arc<dyn CanisterTransport>,
    pub scopes: Vec<Principal>,
}

impl Session {
    pub fn covers(&self, canisters: &[Principal]) -> bool {
        canisters.iter().all(|c| self.scopes.contains(c))
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("principal", &self.principal.to_text())
            .field("scopes", &self.scopes.len())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected { principal: Principal },
}

type PendingConnect = Shared<BoxFuture<'static, Result<Session>>>;

enum Slot {
    Disconnected,
    Connecting { attempt: u64, pending: PendingConnect },
    Connected(Session),
}

pub struct SessionManager {
    provider: Arc<dyn WalletProvider>,
    host: String,
    connect_timeout: Duration,
    slot: Mutex<Slot>,
    attempts: AtomicU64,
}

impl SessionManager {
    pub fn new(provider: Arc<dyn WalletProvider>, host: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            provider,
            host: host.into(),
            connect_timeout,
            slot: Mutex::new(Slot::Disconnected),
            attempts: AtomicU64::new(0),
        }
    }

    /// Obtain a session scoped to `scopes`.
    ///
    /// Returns the existing session when it already covers `scopes`. Never
    /// retries: a rejected or timed-out prompt leaves the manager
    /// `Disconnected` and returns `ConnectionFailed`.
    pub async fn connect(&self, scopes: &[Principal]) -> Result<Session> {
        let (attempt, pending) = {
            let mut slot = self.lock();
            match &*slot {
                Slot::Connected(session) if session.covers(scopes) => return Ok(session.clone()),
                Slot::Connecting { attempt, pending } => {
                    tracing::debug!("⏳ Connection already pending, joining attempt {}", attempt);
                    (*attempt, pending.clone())
                }
                _ => {
                    let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
                    let pending = self.request(scopes.to_vec());
                    *slot = Slot::Connecting { attempt, pending: pending.clone() };
                    (attempt, pending)
                }
            }
        };

        let result = pending.await;

        {
            let mut slot = self.lock();
            let still_current = matches!(&*slot, Slot::Connecting { attempt: current, .. } if *current == attempt);
            if still_current {
                *slot = match &result {
                    Ok(session) => Slot::Connected(session.clone()),
                    Err(_) => Slot::Disconnected,
                };
            }
        }

        let session = result?;
        if !session.covers(scopes) {
            return Err(SwapError::ConnectionFailed {
                reason: "joined a pending connection with narrower scopes".to_string(),
            });
        }
        Ok(session)
    }

    fn request(&self, scopes: Vec<Principal>) -> PendingConnect {
        let provider = self.provider.clone();
        let host = self.host.clone();
        let timeout = self.connect_timeout;

        async move {
            tracing::info!("🔐 Requesting wallet connection for {} canisters at {}", scopes.len(), host);

            let connection = tokio::time::timeout(timeout, provider.request_connect(&scopes, &host))
                .await
                .map_err(|_| SwapError::ConnectionFailed {
                    reason: format!("wallet did not answer within {}s", timeout.as_secs()),
                })?
                .map_err(|rejection| SwapError::ConnectionFailed {
                    reason: rejection.to_string(),
                })?;

            if connection.principal == Principal::anonymous() {
                return Err(SwapError::ConnectionFailed {
                    reason: "wallet returned the anonymous principal".to_string(),
                });
            }

            tracing::info!("✅ Connected as {}", connection.principal);
            Ok(Session {
                principal: connection.principal,
                transport: Arc::new(ScopedTransport::new(connection.transport, scopes.clone())),
                scopes,
            })
        }
        .boxed()
        .shared()
    }

    pub fn disconnect(&self) {
        let mut slot = self.lock();
        if let Slot::Connected(session) = &*slot {
            tracing::info!("👋 Disconnected {}", session.principal);
        }
        *slot = Slot::Disconnected;
    }

    pub fn state(&self) -> ConnectionState {
        match &*self.lock() {
            Slot::Disconnected => ConnectionState::Disconnected,
            Slot::Connecting { .. } => ConnectionState::Connecting,
            Slot::Connected(session) => ConnectionState::Connected { principal: session.principal },
        }
    }

    pub fn principal(&self) -> Option<Principal> {
        self.current().map(|s| s.principal)
    }

    pub fn current(&self) -> Option<Session> {
        match &*self.lock() {
            Slot::Connected(session) => Some(session.clone()),
            _ => None,
        }
    }

    /// Active session or `NotConnected`
    pub fn require(&self) -> Result<Session> {
        self.current().ok_or(SwapError::System(SystemError::NotConnected))
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
