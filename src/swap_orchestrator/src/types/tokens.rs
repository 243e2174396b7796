use candid::{Nat, Principal};

/// Fixed ledger metadata. Name, symbol and decimals never change for a
/// ledger; the fee is informational here and re-read before any write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenMetadata {
    pub ledger: Principal,
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    pub fee: Nat,
}

/// Direction of a swap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenPair {
    pub from_ledger: Principal,
    pub to_ledger: Principal,
}

impl TokenPair {
    pub fn ledgers(&self) -> [Principal; 2] {
        [self.from_ledger, self.to_ledger]
    }
}
