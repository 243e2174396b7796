//! # ICRC Ledger Façade
//!
//! Two call sets per ledger:
//! - `LedgerQueries`: public reads, safe on an anonymous agent
//! - `LedgerCommands`: `icrc2_approve`, only constructible from a wallet session
//!
//! Metadata reads are stable and may be cached by the caller
//! (see `MetadataCache`). Balances and allowances are always read live.

use std::sync::Arc;

use candid::{Nat, Principal};
use icrc_ledger_types::icrc1::transfer::Memo;
use icrc_ledger_types::icrc2::allowance::{Allowance, AllowanceArgs};
use icrc_ledger_types::icrc2::approve::{ApproveArgs, ApproveError};
use serde_bytes::ByteBuf;

use crate::infrastructure::constants::{
    ICRC1_BALANCE_OF, ICRC1_DECIMALS, ICRC1_FEE, ICRC1_NAME, ICRC1_SYMBOL, ICRC2_ALLOWANCE,
    ICRC2_APPROVE,
};
use crate::infrastructure::session::Session;
use crate::infrastructure::{Result, SwapError};
use crate::types::{AllowanceInfo, LedgerAccount, TokenMetadata};
use super::transport::{call_candid, CallKind, CanisterTransport};

/// Anonymous, read-only view of one ledger
#[derive(Clone)]
pub struct LedgerQueries {
    ledger: Principal,
    transport: Arc<dyn CanisterTransport>,
}

impl LedgerQueries {
    pub fn new(ledger: Principal, transport: Arc<dyn CanisterTransport>) -> Self {
        Self { ledger, transport }
    }

    pub fn ledger(&self) -> Principal {
        self.ledger
    }

    pub async fn name(&self) -> Result<String> {
        self.query(ICRC1_NAME, candid::encode_args(())).await
    }

    pub async fn symbol(&self) -> Result<String> {
        self.query(ICRC1_SYMBOL, candid::encode_args(())).await
    }

    pub async fn decimals(&self) -> Result<u8> {
        self.query(ICRC1_DECIMALS, candid::encode_args(())).await
    }

    pub async fn fee(&self) -> Result<Nat> {
        self.query(ICRC1_FEE, candid::encode_args(())).await
    }

    /// All four metadata reads, issued concurrently
    pub async fn metadata(&self) -> Result<TokenMetadata> {
        let (name, symbol, decimals, fee) =
            futures::try_join!(self.name(), self.symbol(), self.decimals(), self.fee())?;

        Ok(TokenMetadata {
            ledger: self.ledger,
            name,
            symbol,
            decimals,
            fee,
        })
    }

    pub async fn balance_of(&self, account: LedgerAccount) -> Result<Nat> {
        self.query(ICRC1_BALANCE_OF, candid::encode_one(account.to_wire())).await
    }

    pub async fn allowance(&self, owner: LedgerAccount, spender: LedgerAccount) -> Result<AllowanceInfo> {
        let args = AllowanceArgs {
            account: owner.to_wire(),
            spender: spender.to_wire(),
        };
        let allowance: Allowance = self.query(ICRC2_ALLOWANCE, candid::encode_one(args)).await?;
        Ok(allowance.into())
    }

    async fn query<R>(&self, method: &str, arg: candid::Result<Vec<u8>>) -> Result<R>
    where
        R: candid::CandidType + serde::de::DeserializeOwned,
    {
        call_candid(self.transport.as_ref(), CallKind::Query, self.ledger, method, arg).await
    }
}

/// Parameters of one `icrc2_approve`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApproveRequest {
    pub spender: LedgerAccount,
    pub amount: Nat,
    /// Explicit fee; `None` lets the ledger apply its default
    pub fee: Option<Nat>,
    pub expires_at: Option<u64>,
    pub expected_allowance: Option<Nat>,
    pub memo: Option<Vec<u8>>,
}

/// Authenticated writes on one ledger, signed by the session identity
#[derive(Clone)]
pub struct LedgerCommands {
    ledger: Principal,
    owner: Principal,
    transport: Arc<dyn CanisterTransport>,
}

impl LedgerCommands {
    pub fn new(ledger: Principal, session: &Session) -> Self {
        Self {
            ledger,
            owner: session.principal,
            transport: session.transport.clone(),
        }
    }

    pub fn owner(&self) -> Principal {
        self.owner
    }

    /// Set or replace the allowance of `request.spender` over the owner's
    /// default account. Returns the approval block index.
    pub async fn approve(&self, request: ApproveRequest) -> Result<Nat> {
        let args = ApproveArgs {
            from_subaccount: None,
            spender: request.spender.to_wire(),
            amount: request.amount,
            expected_allowance: request.expected_allowance,
            expires_at: request.expires_at,
            fee: request.fee,
            memo: request.memo.map(|bytes| Memo(ByteBuf::from(bytes))),
            created_at_time: None,
        };

        let reply: std::result::Result<Nat, ApproveError> = call_candid(
            self.transport.as_ref(),
            CallKind::Update,
            self.ledger,
            ICRC2_APPROVE,
            candid::encode_one(args),
        )
        .await?;

        reply.map_err(|err| SwapError::ServiceRejected {
            operation: ICRC2_APPROVE.to_string(),
            canister: self.ledger.to_text(),
            reason: describe_approve_error(&err),
            recovery: Vec::new(),
        })
    }
}

fn describe_approve_error(err: &ApproveError) -> String {
    match err {
        ApproveError::InsufficientFunds { balance } => format!("insufficient funds (balance {})", balance),
        ApproveError::BadFee { expected_fee } => format!("bad fee (expected {})", expected_fee),
        ApproveError::Expired { ledger_time } => format!("expiry already passed (ledger time {})", ledger_time),
        ApproveError::AllowanceChanged { current_allowance } => {
            format!("allowance changed (current {})", current_allowance)
        }
        other => format!("{:?}", other),
    }
}
