//! Operator configuration
//!
//! Layering, lowest to highest precedence: built-in mainnet defaults, the
//! optional TOML file, environment variables, then CLI flags (applied in `main`).

pub mod forecast;
pub mod registry;
pub mod rpc;

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::OpsError;

pub use forecast::ForecastConfig;
pub use registry::{Category, NameRegistry, NamedInstance};
pub use rpc::RpcConfig;

pub const ENV_CONFIG: &str = "TREE_OPS_CONFIG";
pub const ENV_RPC_URL: &str = "TREE_OPS_RPC_URL";
pub const ENV_ALCHEMY_KEY: &str = "ALCHEMY_KEY";
pub const ENV_FROM_BLOCK: &str = "TREE_OPS_FROM_BLOCK";
pub const ENV_PROPOSAL_DAYS: &str = "TREE_OPS_PROPOSAL_DAYS";
pub const ENV_STEP_DIVISOR: &str = "TREE_OPS_STEP_DIVISOR";
pub const ENV_LOG_CHUNK_SIZE: &str = "TREE_OPS_LOG_CHUNK_SIZE";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpsConfig {
    #[serde(default)]
    pub rpc: RpcConfig,
    #[serde(default)]
    pub registry: NameRegistry,
    #[serde(default)]
    pub forecast: ForecastConfig,
}

impl OpsConfig {
    /// Load from a TOML file, or fall back to the built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, OpsError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = fs::read_to_string(path).map_err(|source| OpsError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&raw).map_err(|source| OpsError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!(
            path = %path.display(),
            instances = config.forecast.instances.len(),
            names = config.registry.mineable.len() + config.registry.allowed.len(),
            "Loaded config file"
        );
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    /// Apply overrides from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<(), OpsError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup; empty values count as unset.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), OpsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get(ENV_RPC_URL) {
            self.rpc.url = Some(url.trim().to_string());
        }
        if self.rpc.url.is_none() {
            if let Some(key) = get(ENV_ALCHEMY_KEY) {
                self.rpc.url = Some(RpcConfig::alchemy_mainnet(&key));
            }
        }
        if let Some(val) = get(ENV_FROM_BLOCK) {
            self.forecast.from_block = parse_number(ENV_FROM_BLOCK, &val)?;
        }
        if let Some(val) = get(ENV_PROPOSAL_DAYS) {
            self.forecast.proposal_days = parse_number(ENV_PROPOSAL_DAYS, &val)?;
        }
        if let Some(val) = get(ENV_STEP_DIVISOR) {
            self.forecast.step_divisor = parse_number(ENV_STEP_DIVISOR, &val)?;
        }
        if let Some(val) = get(ENV_LOG_CHUNK_SIZE) {
            self.rpc.log_chunk_size = Some(parse_number(ENV_LOG_CHUNK_SIZE, &val)?);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), OpsError> {
        self.registry.validate()?;
        self.forecast.validate()?;
        self.rpc.validate()
    }
}

fn parse_number(key: &str, val: &str) -> Result<u64, OpsError> {
    val.trim()
        .replace('_', "")
        .parse::<u64>()
        .map_err(|e| OpsError::Configuration(format!("{}={:?}: {}", key, val, e)))
}
