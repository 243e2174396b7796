//! ICRC account and allowance types
//!
//! `LedgerAccount` is the domain form (explicit `Option` subaccount). The
//! candid wire form from `icrc-ledger-types` is only produced inside the
//! ledger façade via `to_wire`.

use candid::{Nat, Principal};
use ic_ledger_types::Subaccount;
use icrc_ledger_types::icrc1::account::Account;
use icrc_ledger_types::icrc2::allowance::Allowance;

/// Deterministic per-user subaccount used by the swap service for escrow
pub fn derive_subaccount(user: Principal) -> [u8; 32] {
    Subaccount::from(user).0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LedgerAccount {
    pub owner: Principal,
    pub subaccount: Option<[u8; 32]>,
}

impl LedgerAccount {
    /// Default subaccount of `owner`
    pub fn main(owner: Principal) -> Self {
        Self { owner, subaccount: None }
    }

    /// `service`'s escrow subaccount for `user`
    pub fn derived(service: Principal, user: Principal) -> Self {
        Self {
            owner: service,
            subaccount: Some(derive_subaccount(user)),
        }
    }

    pub(crate) fn to_wire(self) -> Account {
        Account {
            owner: self.owner,
            subaccount: self.subaccount,
        }
    }
}

impl std::fmt::Display for LedgerAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // ICRC-1 textual form: `owner-checksum.hex` for non-default subaccounts
        write!(f, "{}", self.to_wire())
    }
}

/// Allowance as observed on the ledger at one point in time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowanceInfo {
    pub amount: Nat,
    /// Ledger time in nanoseconds after which the allowance is void
    pub expires_at: Option<u64>,
}

impl AllowanceInfo {
    /// Non-zero and not expired relative to `now_nanos`
    pub fn is_usable(&self, now_nanos: u64) -> bool {
        let unexpired = self.expires_at.map_or(true, |exp| exp > now_nanos);
        self.amount > Nat::from(0u32) && unexpired
    }
}

impl From<Allowance> for AllowanceInfo {
    fn from(wire: Allowance) -> Self {
        Self {
            amount: wire.allowance,
            expires_at: wire.expires_at,
        }
    }
}
