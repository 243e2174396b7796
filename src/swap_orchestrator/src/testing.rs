//! In-memory ledgers, swap service and wallet for unit tests
//!
//! `FakeNetwork` speaks candid on the `CanisterTransport` seam, so every
//! client in the crate is exercised through its real encode/decode path.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use candid::{Nat, Principal};
use icrc_ledger_types::icrc1::account::Account;
use icrc_ledger_types::icrc2::allowance::{Allowance, AllowanceArgs};
use icrc_ledger_types::icrc2::approve::{ApproveArgs, ApproveError};
use num_traits::ToPrimitive;

use crate::_3_LEDGER_ACCESS::{CanisterTransport, TransportFailure};
use crate::infrastructure::constants::{
    ICRC1_BALANCE_OF, ICRC1_DECIMALS, ICRC1_FEE, ICRC1_NAME, ICRC1_SYMBOL, ICRC2_ALLOWANCE,
    ICRC2_APPROVE, SWAP_EXECUTE, SWAP_RECLAIM_MAIN, SWAP_RECLAIM_SUBACCOUNT,
};
use crate::infrastructure::session::{Session, WalletConnection, WalletProvider, WalletRejection};
use crate::infrastructure::SwapConfig;
use crate::types::{LedgerAccount, SwapReceipt};

pub(crate) fn swap_canister() -> Principal {
    Principal::from_text("bkyz2-fmaaa-aaaaa-qaaaq-cai").unwrap()
}

pub(crate) fn from_ledger() -> Principal {
    Principal::from_text("bd3sg-teaaa-aaaaa-qaaba-cai").unwrap()
}

pub(crate) fn to_ledger() -> Principal {
    Principal::from_text("be2us-64aaa-aaaaa-qaabq-cai").unwrap()
}

pub(crate) fn test_config() -> SwapConfig {
    let json = format!(
        r#"{{"host":"http://127.0.0.1:4943","swap_canister_id":"{}","from_ledger_id":"{}","to_ledger_id":"{}","call_timeout_secs":10}}"#,
        swap_canister(),
        from_ledger(),
        to_ledger()
    );
    SwapConfig::from_json_str(&json).unwrap()
}

/// Liquidity the swap service holds on the receiving ledger at start
pub(crate) const SERVICE_LIQUIDITY: u128 = 1_000_000_000;

const WRITE_METHODS: [&str; 4] = [ICRC2_APPROVE, SWAP_EXECUTE, SWAP_RECLAIM_MAIN, SWAP_RECLAIM_SUBACCOUNT];

struct LedgerState {
    name: String,
    symbol: String,
    decimals: u8,
    fee: u128,
    balances: HashMap<LedgerAccount, u128>,
    allowances: HashMap<(LedgerAccount, LedgerAccount), (u128, Option<u64>)>,
    next_block: u64,
}

impl LedgerState {
    fn new(name: &str, symbol: &str, decimals: u8, fee: u128) -> Self {
        Self {
            name: name.to_string(),
            symbol: symbol.to_string(),
            decimals,
            fee,
            balances: HashMap::new(),
            allowances: HashMap::new(),
            next_block: 0,
        }
    }

    fn balance(&self, account: &LedgerAccount) -> u128 {
        self.balances.get(account).copied().unwrap_or(0)
    }

    fn block(&mut self) -> Nat {
        self.next_block += 1;
        Nat::from(self.next_block)
    }

    /// Move `amount` and burn the fee; `None` when the source cannot cover both
    fn transfer(&mut self, from: LedgerAccount, to: LedgerAccount, amount: u128) -> Option<Nat> {
        let debit = amount.checked_add(self.fee)?;
        let available = self.balance(&from);
        if available < debit {
            return None;
        }
        self.balances.insert(from, available - debit);
        *self.balances.entry(to).or_insert(0) += amount;
        Some(self.block())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RecordedCall {
    pub caller: Principal,
    pub canister: Principal,
    pub method: String,
}

enum Injected {
    Fail(TransportFailure),
    Garble,
}

#[derive(Default)]
struct State {
    ledgers: HashMap<Principal, LedgerState>,
    calls: Vec<RecordedCall>,
    injected: HashMap<String, VecDeque<Injected>>,
    hanging: HashSet<String>,
}

#[derive(Clone)]
pub(crate) struct FakeNetwork {
    state: Arc<Mutex<State>>,
    user: Principal,
}

impl FakeNetwork {
    /// FROM (8 decimals, fee 10) and TO (6 decimals, fee 5) ledgers plus a
    /// swap service holding `SERVICE_LIQUIDITY` on TO.
    pub fn standard() -> Self {
        let mut state = State::default();
        state.ledgers.insert(from_ledger(), LedgerState::new("From Token", "FROM", 8, 10));
        let mut to = LedgerState::new("To Token", "TO", 6, 5);
        to.balances.insert(LedgerAccount::main(swap_canister()), SERVICE_LIQUIDITY);
        state.ledgers.insert(to_ledger(), to);

        Self {
            state: Arc::new(Mutex::new(state)),
            user: Principal::self_authenticating(b"swap-orchestrator-test-user"),
        }
    }

    pub fn user(&self) -> Principal {
        self.user
    }

    pub fn transport_for(&self, caller: Principal) -> Arc<dyn CanisterTransport> {
        Arc::new(FakeTransport {
            network: self.clone(),
            caller,
        })
    }

    pub fn anonymous(&self) -> Arc<dyn CanisterTransport> {
        self.transport_for(Principal::anonymous())
    }

    /// Unscoped session for the test user
    pub fn session(&self) -> Session {
        Session {
            principal: self.user,
            transport: self.transport_for(self.user),
            scopes: vec![swap_canister(), from_ledger(), to_ledger()],
        }
    }

    pub fn set_balance(&self, ledger: Principal, account: LedgerAccount, amount: u128) {
        self.with_ledger(ledger, |l| {
            l.balances.insert(account, amount);
        });
    }

    pub fn balance(&self, ledger: Principal, account: LedgerAccount) -> u128 {
        self.with_ledger(ledger, |l| l.balance(&account))
    }

    pub fn set_allowance(
        &self,
        ledger: Principal,
        owner: LedgerAccount,
        spender: LedgerAccount,
        amount: u128,
        expires_at: Option<u64>,
    ) {
        self.with_ledger(ledger, |l| {
            l.allowances.insert((owner, spender), (amount, expires_at));
        });
    }

    pub fn allowance(&self, ledger: Principal, owner: LedgerAccount, spender: LedgerAccount) -> u128 {
        self.with_ledger(ledger, |l| l.allowances.get(&(owner, spender)).map_or(0, |(a, _)| *a))
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.lock().calls.clone()
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.lock().calls.iter().filter(|c| c.method == method).count()
    }

    /// Calls that would change ledger state
    pub fn write_calls(&self) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| WRITE_METHODS.contains(&c.method.as_str()))
            .count()
    }

    /// Next call to `method` fails before reaching the canister
    pub fn fail_next(&self, method: &str, failure: TransportFailure) {
        self.lock()
            .injected
            .entry(method.to_string())
            .or_default()
            .push_back(Injected::Fail(failure));
    }

    /// Next call to `method` executes, but its reply is not valid candid for the method
    pub fn garble_next(&self, method: &str) {
        self.lock()
            .injected
            .entry(method.to_string())
            .or_default()
            .push_back(Injected::Garble);
    }

    /// Every call to `method` from now on never returns
    pub fn hang(&self, method: &str) {
        self.lock().hanging.insert(method.to_string());
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    fn with_ledger<R>(&self, ledger: Principal, f: impl FnOnce(&mut LedgerState) -> R) -> R {
        let mut state = self.lock();
        f(state.ledgers.get_mut(&ledger).expect("unknown ledger"))
    }

    async fn dispatch(
        &self,
        caller: Principal,
        canister: Principal,
        method: &str,
        arg: Vec<u8>,
    ) -> Result<Vec<u8>, TransportFailure> {
        let (injected, hanging) = {
            let mut state = self.lock();
            state.calls.push(RecordedCall {
                caller,
                canister,
                method: method.to_string(),
            });
            let injected = state.injected.get_mut(method).and_then(|queue| queue.pop_front());
            (injected, state.hanging.contains(method))
        };

        if hanging {
            return futures::future::pending().await;
        }
        if let Some(Injected::Fail(failure)) = injected {
            return Err(failure);
        }

        let reply = self.execute(caller, canister, method, &arg)?;
        match injected {
            Some(Injected::Garble) => Ok(candid::encode_one("garbled").unwrap()),
            _ => Ok(reply),
        }
    }

    fn execute(
        &self,
        caller: Principal,
        canister: Principal,
        method: &str,
        arg: &[u8],
    ) -> Result<Vec<u8>, TransportFailure> {
        let mut state = self.lock();
        let reply = if canister == swap_canister() {
            swap_service(&mut state, caller, method, arg)
        } else {
            let ledger = state.ledgers.get_mut(&canister).ok_or_else(|| TransportFailure::Rejected {
                code: "DestinationInvalid".to_string(),
                message: format!("canister {} not found", canister),
            })?;
            ledger_method(ledger, caller, method, arg)
        };

        reply.map_err(|message| TransportFailure::Rejected {
            code: "CanisterError".to_string(),
            message,
        })
    }
}

fn ledger_method(ledger: &mut LedgerState, caller: Principal, method: &str, arg: &[u8]) -> Result<Vec<u8>, String> {
    let encoded = match method {
        ICRC1_NAME => candid::encode_one(ledger.name.clone()),
        ICRC1_SYMBOL => candid::encode_one(ledger.symbol.clone()),
        ICRC1_DECIMALS => candid::encode_one(ledger.decimals),
        ICRC1_FEE => candid::encode_one(Nat::from(ledger.fee)),
        ICRC1_BALANCE_OF => {
            let account: Account = candid::decode_one(arg).map_err(|e| e.to_string())?;
            candid::encode_one(Nat::from(ledger.balance(&domain(account))))
        }
        ICRC2_ALLOWANCE => {
            let args: AllowanceArgs = candid::decode_one(arg).map_err(|e| e.to_string())?;
            let (amount, expires_at) = ledger
                .allowances
                .get(&(domain(args.account), domain(args.spender)))
                .copied()
                .unwrap_or((0, None));
            candid::encode_one(Allowance {
                allowance: Nat::from(amount),
                expires_at,
            })
        }
        ICRC2_APPROVE => {
            let args: ApproveArgs = candid::decode_one(arg).map_err(|e| e.to_string())?;
            candid::encode_one(approve(ledger, caller, args))
        }
        other => return Err(format!("method {} not found", other)),
    };
    encoded.map_err(|e| e.to_string())
}

fn approve(ledger: &mut LedgerState, caller: Principal, args: ApproveArgs) -> Result<Nat, ApproveError> {
    let owner = LedgerAccount {
        owner: caller,
        subaccount: args.from_subaccount,
    };
    if let Some(fee) = &args.fee {
        if *fee != Nat::from(ledger.fee) {
            return Err(ApproveError::BadFee {
                expected_fee: Nat::from(ledger.fee),
            });
        }
    }
    let balance = ledger.balance(&owner);
    if balance < ledger.fee {
        return Err(ApproveError::InsufficientFunds {
            balance: Nat::from(balance),
        });
    }

    ledger.balances.insert(owner, balance - ledger.fee);
    ledger
        .allowances
        .insert((owner, domain(args.spender)), (to_u128(&args.amount), args.expires_at));
    Ok(ledger.block())
}

fn swap_service(state: &mut State, caller: Principal, method: &str, arg: &[u8]) -> Result<Vec<u8>, String> {
    let encoded = match method {
        SWAP_EXECUTE => {
            let (from, to): (Principal, Principal) = candid::decode_args(arg).map_err(|e| e.to_string())?;
            candid::encode_one(swap(state, caller, from, to))
        }
        SWAP_RECLAIM_MAIN => {
            let ledger: Principal = candid::decode_one(arg).map_err(|e| e.to_string())?;
            candid::encode_one(reclaim(state, caller, ledger, LedgerAccount::main(swap_canister())))
        }
        SWAP_RECLAIM_SUBACCOUNT => {
            let ledger: Principal = candid::decode_one(arg).map_err(|e| e.to_string())?;
            let escrow = LedgerAccount::derived(swap_canister(), caller);
            candid::encode_one(reclaim(state, caller, ledger, escrow))
        }
        other => return Err(format!("method {} not found", other)),
    };
    encoded.map_err(|e| e.to_string())
}

/// Pull the whole allowance into the caller's escrow, pay out 1:1 on `to`
fn swap(state: &mut State, caller: Principal, from: Principal, to: Principal) -> Result<SwapReceipt, String> {
    let user = LedgerAccount::main(caller);
    let escrow = LedgerAccount::derived(swap_canister(), caller);

    let source = state.ledgers.get_mut(&from).ok_or("unknown from ledger")?;
    let (allowance, _) = source.allowances.get(&(user, escrow)).copied().unwrap_or((0, None));
    if allowance <= source.fee {
        return Err(format!("no usable allowance for {}", escrow));
    }
    let pulled = allowance - source.fee;
    source.transfer(user, escrow, pulled).ok_or("transfer_from failed: insufficient funds")?;
    source.allowances.remove(&(user, escrow));
    let escrowed = source.balance(&escrow);

    let target = state.ledgers.get_mut(&to).ok_or("unknown to ledger")?;
    let payout = pulled.saturating_sub(target.fee);
    let block = target
        .transfer(LedgerAccount::main(swap_canister()), user, payout)
        .ok_or("insufficient liquidity")?;

    Ok(SwapReceipt {
        from_allowance: Nat::from(allowance),
        caller_canister_balance: Nat::from(escrowed),
        to_transfer_amount: block,
    })
}

fn reclaim(state: &mut State, caller: Principal, ledger: Principal, source: LedgerAccount) -> Result<Nat, String> {
    let ledger = state.ledgers.get_mut(&ledger).ok_or("unknown ledger")?;
    let held = ledger.balance(&source);
    if held <= ledger.fee {
        return Err("nothing to reclaim".to_string());
    }
    ledger
        .transfer(source, LedgerAccount::main(caller), held - ledger.fee)
        .ok_or_else(|| "transfer failed".to_string())
}

fn domain(account: Account) -> LedgerAccount {
    LedgerAccount {
        owner: account.owner,
        subaccount: account.subaccount,
    }
}

fn to_u128(amount: &Nat) -> u128 {
    amount.0.to_u128().unwrap_or(u128::MAX)
}

struct FakeTransport {
    network: FakeNetwork,
    caller: Principal,
}

#[async_trait]
impl CanisterTransport for FakeTransport {
    async fn query(&self, canister: Principal, method: &str, arg: Vec<u8>) -> Result<Vec<u8>, TransportFailure> {
        self.network.dispatch(self.caller, canister, method, arg).await
    }

    async fn update(&self, canister: Principal, method: &str, arg: Vec<u8>) -> Result<Vec<u8>, TransportFailure> {
        self.network.dispatch(self.caller, canister, method, arg).await
    }
}

/// Scripted wallet: accepts or rejects every prompt
pub(crate) struct FakeWallet {
    network: FakeNetwork,
    /// Identity per prompt, the last one repeats
    identities: Mutex<VecDeque<Principal>>,
    accept: bool,
    delay: Option<Duration>,
    prompts: AtomicUsize,
    last_scopes: Mutex<Vec<Principal>>,
}

impl FakeWallet {
    pub fn approving(network: &FakeNetwork) -> Self {
        Self::build(network, network.user(), true)
    }

    pub fn rejecting(network: &FakeNetwork) -> Self {
        Self::build(network, network.user(), false)
    }

    /// After the prompts so far, answer as `principal`
    pub fn then_as(self, principal: Principal) -> Self {
        self.identities.lock().unwrap().push_back(principal);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn prompts(&self) -> usize {
        self.prompts.load(Ordering::SeqCst)
    }

    pub fn last_scopes(&self) -> Vec<Principal> {
        self.last_scopes.lock().unwrap().clone()
    }

    fn build(network: &FakeNetwork, principal: Principal, accept: bool) -> Self {
        Self {
            network: network.clone(),
            identities: Mutex::new(VecDeque::from([principal])),
            accept,
            delay: None,
            prompts: AtomicUsize::new(0),
            last_scopes: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl WalletProvider for FakeWallet {
    async fn request_connect(&self, scopes: &[Principal], _host: &str) -> Result<WalletConnection, WalletRejection> {
        self.prompts.fetch_add(1, Ordering::SeqCst);
        *self.last_scopes.lock().unwrap() = scopes.to_vec();

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if !self.accept {
            return Err(WalletRejection::UserRejected);
        }

        let principal = {
            let mut identities = self.identities.lock().unwrap();
            if identities.len() > 1 {
                identities.pop_front().unwrap()
            } else {
                identities[0]
            }
        };
        Ok(WalletConnection {
            principal,
            transport: self.network.transport_for(principal),
        })
    }
}
