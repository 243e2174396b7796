//! Display module - Balance view model for UI collaborators
//!
//! Pure aggregation over `TokenObservation`s. Recomputed on every explicit
//! refresh and after a settled swap; it never decides on its own that data
//! is stale.

use candid::{Nat, Principal};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::_2_CRITICAL_DATA::TokenObservation;
use crate::infrastructure::math::{to_decimal, to_display};

/// One amount in every form a renderer may want
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayAmount {
    /// Smallest-unit integer as the ledger reported it
    #[serde(serialize_with = "serialize_nat")]
    pub raw: Nat,
    /// Grouped, rounded decimal string
    pub text: String,
    /// Exact value, absent above 28 significant digits
    pub value: Option<Decimal>,
}

impl DisplayAmount {
    pub fn new(raw: Nat, decimals: u32, rounding_digits: u32) -> Self {
        let text = to_display(&raw, decimals, rounding_digits);
        let value = to_decimal(&raw, decimals).ok();
        Self { raw, text, value }
    }
}

fn serialize_nat<S: serde::Serializer>(nat: &Nat, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&nat.0.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenBalanceView {
    pub ledger: Principal,
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    pub fee: DisplayAmount,
    pub service_main: DisplayAmount,
    pub service_derived: Option<DisplayAmount>,
    pub user_balance: Option<DisplayAmount>,
    pub allowance: Option<DisplayAmount>,
    pub allowance_expires_at: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalanceViewModel {
    pub principal: Option<Principal>,
    pub tokens: Vec<TokenBalanceView>,
}

impl BalanceViewModel {
    pub fn token(&self, ledger: &Principal) -> Option<&TokenBalanceView> {
        self.tokens.iter().find(|t| t.ledger == *ledger)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

pub fn build_view(principal: Option<Principal>, observations: &[TokenObservation], rounding_digits: u32) -> BalanceViewModel {
    let tokens = observations
        .iter()
        .map(|obs| {
            let decimals = obs.metadata.decimals as u32;
            let amount = |raw: &Nat| DisplayAmount::new(raw.clone(), decimals, rounding_digits);

            TokenBalanceView {
                ledger: obs.metadata.ledger,
                name: obs.metadata.name.clone(),
                symbol: obs.metadata.symbol.clone(),
                decimals: obs.metadata.decimals,
                fee: amount(&obs.fee),
                service_main: amount(&obs.service_main),
                service_derived: obs.service_derived.as_ref().map(amount),
                user_balance: obs.user_balance.as_ref().map(amount),
                allowance: obs.allowance.as_ref().map(|a| amount(&a.amount)),
                allowance_expires_at: obs.allowance.as_ref().and_then(|a| a.expires_at),
            }
        })
        .collect();

    BalanceViewModel { principal, tokens }
}
