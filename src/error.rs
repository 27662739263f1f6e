//! Error taxonomy for the operator commands.
//!
//! Nothing here is recovered locally: every variant aborts the run and is
//! reported by `main` with its full source chain.

use std::path::PathBuf;

use thiserror::Error;

/// Failures of the JSON-RPC collaborator (transport, protocol, decoding).
#[derive(Error, Debug)]
pub enum RpcError {
    #[error("http transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("endpoint {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("malformed rpc response: {0}")]
    Malformed(String),

    #[error("block {0} not found")]
    MissingBlock(String),

    #[error("all rpc endpoints failed after {attempts} attempts: {last}")]
    Exhausted { attempts: usize, last: String },
}

#[derive(Error, Debug)]
pub enum OpsError {
    /// Misconfiguration detected before or during a run.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("malformed name {name:?}: {reason}")]
    MalformedName { name: String, reason: &'static str },

    /// The observation window has no positive length, so no rate can be derived.
    #[error(
        "configuration error: observation window is empty or inverted \
         (from timestamp {from_timestamp}, head timestamp {to_timestamp}); \
         fromBlock must be strictly before the chain head"
    )]
    NonPositiveSpan { from_timestamp: u64, to_timestamp: u64 },

    /// A chain read failed. `read` names the exact read so the operator knows what to rerun.
    #[error("data source error: {read} failed")]
    DataSource {
        read: String,
        #[source]
        source: RpcError,
    },

    #[error("failed to read config file {}", path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {}", path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl OpsError {
    pub fn data_source(read: impl Into<String>) -> impl FnOnce(RpcError) -> OpsError {
        let read = read.into();
        move |source| OpsError::DataSource { read, source }
    }
}
