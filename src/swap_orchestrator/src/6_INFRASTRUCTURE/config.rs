//! Swap client configuration
//!
//! Loaded from a JSON document or from `SWAP_*` environment variables.
//! Canister ids are kept as text in the file form and parsed once into
//! `SwapConfig`, so a bad id fails at startup rather than mid-swap.

use std::path::Path;
use std::time::Duration;

use candid::Principal;
use serde::Deserialize;

use crate::infrastructure::constants::{
    DEFAULT_CALL_TIMEOUT_SECS, DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_HOST, DEFAULT_ROUNDING_DIGITS,
};
use crate::infrastructure::{Result, SwapError, SystemError, ValidationError};

/// How the spender account for an approval is derived
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SpenderScheme {
    /// Swap service principal + subaccount derived from the user's principal
    #[default]
    DerivedSubaccount,
    /// Swap service principal, default subaccount (pooled)
    MainAccount,
}

impl std::str::FromStr for SpenderScheme {
    type Err = SwapError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "derived_subaccount" => Ok(SpenderScheme::DerivedSubaccount),
            "main_account" => Ok(SpenderScheme::MainAccount),
            other => Err(config_error(format!("unknown spender scheme '{}'", other))),
        }
    }
}

/// Raw, serializable form of the configuration
#[derive(Deserialize, Debug, Clone)]
pub struct SwapConfigFile {
    #[serde(default = "default_host")]
    pub host: String,
    pub swap_canister_id: String,
    pub from_ledger_id: String,
    pub to_ledger_id: String,
    #[serde(default)]
    pub spender_scheme: SpenderScheme,
    #[serde(default = "default_call_timeout")]
    pub call_timeout_secs: u64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default)]
    pub approval_ttl_secs: Option<u64>,
    #[serde(default = "default_rounding_digits")]
    pub rounding_digits: u32,
    #[serde(default)]
    pub fetch_root_key: bool,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_call_timeout() -> u64 {
    DEFAULT_CALL_TIMEOUT_SECS
}

fn default_connect_timeout() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_SECS
}

fn default_rounding_digits() -> u32 {
    DEFAULT_ROUNDING_DIGITS
}

/// Validated configuration consumed by the orchestrator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapConfig {
    pub host: String,
    pub swap_canister: Principal,
    pub from_ledger: Principal,
    pub to_ledger: Principal,
    pub spender_scheme: SpenderScheme,
    pub call_timeout: Duration,
    pub connect_timeout: Duration,
    pub approval_ttl: Option<Duration>,
    pub rounding_digits: u32,
    pub fetch_root_key: bool,
}

impl SwapConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let file: SwapConfigFile = serde_json::from_str(json)
            .map_err(|e| config_error(format!("invalid config JSON: {}", e)))?;
        Self::try_from(file)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| config_error(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_json_str(&json)
    }

    /// Build from `SWAP_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| {
            lookup(key).ok_or_else(|| config_error(format!("missing environment variable {}", key)))
        };
        let number = |key: &str, default: u64| -> Result<u64> {
            match lookup(key) {
                Some(v) => v
                    .parse::<u64>()
                    .map_err(|e| config_error(format!("{} is not a number: {}", key, e))),
                None => Ok(default),
            }
        };

        let approval_ttl_secs = match lookup("SWAP_APPROVAL_TTL_SECS") {
            Some(_) => Some(number("SWAP_APPROVAL_TTL_SECS", 0)?),
            None => None,
        };
        let spender_scheme = match lookup("SWAP_SPENDER_SCHEME") {
            Some(v) => v.parse()?,
            None => SpenderScheme::default(),
        };
        let fetch_root_key = matches!(
            lookup("SWAP_FETCH_ROOT_KEY").as_deref(),
            Some("1") | Some("true") | Some("yes")
        );

        let rounding_digits = number("SWAP_ROUNDING_DIGITS", u64::from(DEFAULT_ROUNDING_DIGITS))?;
        let rounding_digits = u32::try_from(rounding_digits)
            .map_err(|_| config_error(format!("SWAP_ROUNDING_DIGITS {} is out of range", rounding_digits)))?;

        let file = SwapConfigFile {
            host: lookup("SWAP_HOST").unwrap_or_else(default_host),
            swap_canister_id: required("SWAP_CANISTER_ID")?,
            from_ledger_id: required("SWAP_FROM_LEDGER")?,
            to_ledger_id: required("SWAP_TO_LEDGER")?,
            spender_scheme,
            call_timeout_secs: number("SWAP_CALL_TIMEOUT_SECS", DEFAULT_CALL_TIMEOUT_SECS)?,
            connect_timeout_secs: number("SWAP_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS)?,
            approval_ttl_secs,
            rounding_digits,
            fetch_root_key,
        };
        Self::try_from(file)
    }

    /// Every canister this client will call, declared in one connection request
    pub fn scopes(&self) -> Vec<Principal> {
        vec![self.swap_canister, self.from_ledger, self.to_ledger]
    }
}

impl TryFrom<SwapConfigFile> for SwapConfig {
    type Error = SwapError;

    fn try_from(file: SwapConfigFile) -> Result<Self> {
        let swap_canister = parse_principal(&file.swap_canister_id)?;
        let from_ledger = parse_principal(&file.from_ledger_id)?;
        let to_ledger = parse_principal(&file.to_ledger_id)?;

        if from_ledger == to_ledger {
            return Err(SwapError::Validation(ValidationError::SameLedger {
                ledger: from_ledger.to_text(),
            }));
        }
        if file.call_timeout_secs == 0 || file.connect_timeout_secs == 0 {
            return Err(config_error("timeouts must be greater than zero".to_string()));
        }
        if file.host.trim().is_empty() {
            return Err(config_error("host must not be empty".to_string()));
        }

        Ok(SwapConfig {
            host: file.host,
            swap_canister,
            from_ledger,
            to_ledger,
            spender_scheme: file.spender_scheme,
            call_timeout: Duration::from_secs(file.call_timeout_secs),
            connect_timeout: Duration::from_secs(file.connect_timeout_secs),
            approval_ttl: file.approval_ttl_secs.map(Duration::from_secs),
            rounding_digits: file.rounding_digits,
            fetch_root_key: file.fetch_root_key,
        })
    }
}

pub fn parse_principal(text: &str) -> Result<Principal> {
    Principal::from_text(text.trim()).map_err(|e| {
        SwapError::Validation(ValidationError::InvalidPrincipal {
            text: text.to_string(),
            reason: e.to_string(),
        })
    })
}

fn config_error(reason: String) -> SwapError {
    SwapError::System(SystemError::Config { reason })
}
