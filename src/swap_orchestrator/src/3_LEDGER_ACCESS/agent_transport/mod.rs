//! `ic-agent` backed transport
//!
//! One `Agent` per identity. The anonymous agent serves public reads; a
//! session agent is built by the identity provider and signs updates.

use async_trait::async_trait;
use candid::Principal;
use ic_agent::{Agent, AgentError, Identity};

use crate::infrastructure::{Result, SwapError};
use super::transport::{CanisterTransport, TransportFailure};

pub struct AgentTransport {
    agent: Agent,
}

impl AgentTransport {
    /// Unauthenticated agent for public queries
    pub async fn anonymous(host: &str, fetch_root_key: bool) -> Result<Self> {
        let agent = Agent::builder()
            .with_url(host)
            .build()
            .map_err(|e| connection_error(host, e))?;
        Self::finish(agent, host, fetch_root_key).await
    }

    /// Agent signing with `identity`
    pub async fn with_identity(
        host: &str,
        identity: impl Identity + 'static,
        fetch_root_key: bool,
    ) -> Result<Self> {
        let agent = Agent::builder()
            .with_url(host)
            .with_identity(identity)
            .build()
            .map_err(|e| connection_error(host, e))?;
        Self::finish(agent, host, fetch_root_key).await
    }

    async fn finish(agent: Agent, host: &str, fetch_root_key: bool) -> Result<Self> {
        // Only a local replica needs its root key fetched; mainnet's is built in
        if fetch_root_key {
            agent
                .fetch_root_key()
                .await
                .map_err(|e| connection_error(host, e))?;
        }
        Ok(Self { agent })
    }

    pub fn principal(&self) -> Result<Principal> {
        self.agent.get_principal().map_err(|reason| SwapError::ConnectionFailed {
            reason: format!("identity has no principal: {}", reason),
        })
    }
}

#[async_trait]
impl CanisterTransport for AgentTransport {
    async fn query(
        &self,
        canister: Principal,
        method: &str,
        arg: Vec<u8>,
    ) -> std::result::Result<Vec<u8>, TransportFailure> {
        self.agent
            .query(&canister, method)
            .with_arg(arg)
            .call()
            .await
            .map_err(classify_agent_error)
    }

    async fn update(
        &self,
        canister: Principal,
        method: &str,
        arg: Vec<u8>,
    ) -> std::result::Result<Vec<u8>, TransportFailure> {
        self.agent
            .update(&canister, method)
            .with_arg(arg)
            .call_and_wait()
            .await
            .map_err(classify_agent_error)
    }
}

fn classify_agent_error(err: AgentError) -> TransportFailure {
    match err {
        AgentError::TimeoutWaitingForResponse() => {
            TransportFailure::Timeout("no response before ingress expiry".to_string())
        }
        AgentError::CertifiedReject(reject) | AgentError::UncertifiedReject(reject) => {
            TransportFailure::Rejected {
                code: format!("{:?}", reject.reject_code),
                message: reject.reject_message,
            }
        }
        other => TransportFailure::Network(other.to_string()),
    }
}

fn connection_error(host: &str, err: AgentError) -> SwapError {
    SwapError::ConnectionFailed {
        reason: format!("agent setup for {} failed: {}", host, err),
    }
}
