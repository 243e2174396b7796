//! Transport seam between typed clients and the network
//!
//! Clients hand over candid-encoded arguments and get reply bytes back.
//! Failures are classified once here into the crate error taxonomy.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use candid::{CandidType, Principal};
use serde::de::DeserializeOwned;

use crate::infrastructure::{Result, SwapError, SystemError};

/// Raw failure reported by a transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportFailure {
    /// No reply within the transport's deadline; the call may still execute
    Timeout(String),
    /// Request could not be delivered or the reply could not be read
    Network(String),
    /// The canister (or replica on its behalf) rejected the call
    Rejected { code: String, message: String },
    /// Session was not scoped for this canister
    OutOfScope,
}

#[async_trait]
pub trait CanisterTransport: Send + Sync {
    async fn query(
        &self,
        canister: Principal,
        method: &str,
        arg: Vec<u8>,
    ) -> std::result::Result<Vec<u8>, TransportFailure>;

    async fn update(
        &self,
        canister: Principal,
        method: &str,
        arg: Vec<u8>,
    ) -> std::result::Result<Vec<u8>, TransportFailure>;
}

/// Restricts a session transport to the canisters declared at connect time
pub struct ScopedTransport {
    inner: Arc<dyn CanisterTransport>,
    scopes: BTreeSet<Principal>,
}

impl ScopedTransport {
    pub fn new(inner: Arc<dyn CanisterTransport>, scopes: impl IntoIterator<Item = Principal>) -> Self {
        Self {
            inner,
            scopes: scopes.into_iter().collect(),
        }
    }

    pub fn covers(&self, canister: &Principal) -> bool {
        self.scopes.contains(canister)
    }
}

#[async_trait]
impl CanisterTransport for ScopedTransport {
    async fn query(
        &self,
        canister: Principal,
        method: &str,
        arg: Vec<u8>,
    ) -> std::result::Result<Vec<u8>, TransportFailure> {
        if !self.covers(&canister) {
            return Err(TransportFailure::OutOfScope);
        }
        self.inner.query(canister, method, arg).await
    }

    async fn update(
        &self,
        canister: Principal,
        method: &str,
        arg: Vec<u8>,
    ) -> std::result::Result<Vec<u8>, TransportFailure> {
        if !self.covers(&canister) {
            return Err(TransportFailure::OutOfScope);
        }
        self.inner.update(canister, method, arg).await
    }
}

#[derive(Clone, Copy)]
pub(crate) enum CallKind {
    Query,
    Update,
}

/// Send pre-encoded `arg` and decode a single candid return value
pub(crate) async fn call_candid<R>(
    transport: &dyn CanisterTransport,
    kind: CallKind,
    canister: Principal,
    method: &str,
    arg: candid::Result<Vec<u8>>,
) -> Result<R>
where
    R: CandidType + DeserializeOwned,
{
    let arg = arg.map_err(|e| {
        SwapError::System(SystemError::Encoding {
            operation: method.to_string(),
            details: e.to_string(),
        })
    })?;

    let reply = match kind {
        CallKind::Query => transport.query(canister, method, arg).await,
        CallKind::Update => transport.update(canister, method, arg).await,
    }
    .map_err(|failure| classify(failure, canister, method))?;

    candid::decode_one::<R>(&reply).map_err(|e| SwapError::MalformedResponse {
        operation: method.to_string(),
        canister: canister.to_text(),
        details: e.to_string(),
    })
}

pub(crate) fn classify(failure: TransportFailure, canister: Principal, method: &str) -> SwapError {
    match failure {
        TransportFailure::Timeout(message) => SwapError::Transport {
            operation: method.to_string(),
            canister: canister.to_text(),
            message,
            timed_out: true,
        },
        TransportFailure::Network(message) => SwapError::Transport {
            operation: method.to_string(),
            canister: canister.to_text(),
            message,
            timed_out: false,
        },
        TransportFailure::Rejected { code, message } => SwapError::ServiceRejected {
            operation: method.to_string(),
            canister: canister.to_text(),
            reason: format!("{}: {}", code, message),
            recovery: Vec::new(),
        },
        TransportFailure::OutOfScope => SwapError::System(SystemError::OutOfScope {
            canister: canister.to_text(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl CanisterTransport for Echo {
        async fn query(&self, _canister: Principal, _method: &str, arg: Vec<u8>) -> std::result::Result<Vec<u8>, TransportFailure> {
            Ok(arg)
        }
        async fn update(&self, _canister: Principal, _method: &str, arg: Vec<u8>) -> std::result::Result<Vec<u8>, TransportFailure> {
            Ok(arg)
        }
    }

    fn canister(text: &str) -> Principal {
        Principal::from_text(text).unwrap()
    }

    #[tokio::test]
    async fn test_scoped_transport_blocks_undeclared_canister() {
        let allowed = canister("bd3sg-teaaa-aaaaa-qaaba-cai");
        let other = canister("be2us-64aaa-aaaaa-qaabq-cai");
        let scoped = ScopedTransport::new(Arc::new(Echo), [allowed]);

        assert!(scoped.query(allowed, "m", vec![1]).await.is_ok());
        assert_eq!(scoped.update(other, "m", vec![1]).await, Err(TransportFailure::OutOfScope));
    }

    #[tokio::test]
    async fn test_call_candid_round_trips_through_transport() {
        let target = canister("bd3sg-teaaa-aaaaa-qaaba-cai");
        let value: String = call_candid(&Echo, CallKind::Query, target, "echo", candid::encode_one("hi"))
            .await
            .unwrap();
        assert_eq!(value, "hi");
    }

    #[tokio::test]
    async fn test_wrong_reply_shape_is_malformed() {
        let target = canister("bd3sg-teaaa-aaaaa-qaaba-cai");
        let result: Result<u8> = call_candid(&Echo, CallKind::Query, target, "echo", candid::encode_one("hi")).await;
        assert!(matches!(result, Err(SwapError::MalformedResponse { .. })));
    }

    #[test]
    fn test_classification() {
        let target = canister("bd3sg-teaaa-aaaaa-qaaba-cai");
        assert!(matches!(
            classify(TransportFailure::Timeout("t".into()), target, "m"),
            SwapError::Transport { timed_out: true, .. }
        ));
        assert!(matches!(
            classify(TransportFailure::Network("n".into()), target, "m"),
            SwapError::Transport { timed_out: false, .. }
        ));
        assert!(matches!(
            classify(TransportFailure::Rejected { code: "CanisterError".into(), message: "trap".into() }, target, "m"),
            SwapError::ServiceRejected { .. }
        ));
        assert!(matches!(
            classify(TransportFailure::OutOfScope, target, "m"),
            SwapError::System(SystemError::OutOfScope { .. })
        ));
    }
}
