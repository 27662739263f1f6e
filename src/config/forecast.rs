//! Forecast Configuration
//!
//! Deployment addresses and the policy knobs used to size tree update proposals.

use alloy_primitives::{address, Address};
use alloy_sol_types::SolEvent;
use serde::{Deserialize, Serialize};

use crate::chain::IInstance;
use crate::error::OpsError;

/// Mainnet trees contract (leaf counters and registration queues).
pub const MAINNET_TREES_ADDRESS: Address = address!("0x43a3bE4Ae954d9869836702AFd10393D3a7Ea417");

/// Mainnet instances whose logs are aggregated.
pub const MAINNET_INSTANCES: [Address; 4] = [
    address!("0x12D66f87A04A9E220743712cE6d9bB1B5616B8Fc"),
    address!("0x47CE0C6eD5B0Ce3d3A51fdb1C52DC66a7c3c2936"),
    address!("0x910Cbd523D972eb0a6f4cAe4618aD62622b39DbF"),
    address!("0xA160cdAB225685dA1d56aa342Ad8841c3b53f291"),
];

pub const MAINNET_FROM_BLOCK: u64 = 11_750_000;

/// Days between submitting a proposal and its execution.
pub const DEFAULT_PROPOSAL_DAYS: u64 = 5;

/// Batch step is one fifth of a day's expected new leaves.
pub const DEFAULT_STEP_DIVISOR: u64 = 5;

pub const DEPOSIT_EVENT: &str = IInstance::Deposit::SIGNATURE;
pub const WITHDRAWAL_EVENT: &str = IInstance::Withdrawal::SIGNATURE;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastConfig {
    #[serde(default = "default_trees_address")]
    pub trees_address: Address,

    #[serde(default = "default_instances")]
    pub instances: Vec<Address>,

    /// First block of the observation window
    #[serde(default = "default_from_block")]
    pub from_block: u64,

    #[serde(default = "default_proposal_days")]
    pub proposal_days: u64,

    #[serde(default = "default_step_divisor")]
    pub step_divisor: u64,

    #[serde(default = "default_deposit_event")]
    pub deposit_event: String,

    #[serde(default = "default_withdrawal_event")]
    pub withdrawal_event: String,
}

fn default_trees_address() -> Address {
    MAINNET_TREES_ADDRESS
}

fn default_instances() -> Vec<Address> {
    MAINNET_INSTANCES.to_vec()
}

fn default_from_block() -> u64 {
    MAINNET_FROM_BLOCK
}
fn default_proposal_days() -> u64 {
    DEFAULT_PROPOSAL_DAYS
}
fn default_step_divisor() -> u64 {
    DEFAULT_STEP_DIVISOR
}
fn default_deposit_event() -> String {
    DEPOSIT_EVENT.to_string()
}
fn default_withdrawal_event() -> String {
    WITHDRAWAL_EVENT.to_string()
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            trees_address: default_trees_address(),
            instances: default_instances(),
            from_block: default_from_block(),
            proposal_days: default_proposal_days(),
            step_divisor: default_step_divisor(),
            deposit_event: default_deposit_event(),
            withdrawal_event: default_withdrawal_event(),
        }
    }
}

impl ForecastConfig {
    pub fn validate(&self) -> Result<(), OpsError> {
        if self.step_divisor == 0 {
            return Err(OpsError::Configuration(
                "step_divisor must be at least 1".to_string(),
            ));
        }
        for (label, signature) in [
            ("deposit_event", &self.deposit_event),
            ("withdrawal_event", &self.withdrawal_event),
        ] {
            if !is_event_signature(signature) {
                return Err(OpsError::Configuration(format!(
                    "{} {:?} is not an event signature like Name(type,...)",
                    label, signature
                )));
            }
        }
        Ok(())
    }
}

fn is_event_signature(s: &str) -> bool {
    match s.find('(') {
        Some(open) => open > 0 && s.ends_with(')') && !s.contains(char::is_whitespace),
        None => false,
    }
}
