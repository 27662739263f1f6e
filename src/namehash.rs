//! Hierarchical name hashing (EIP-137) and the keccak helpers built on it.
//!
//! Names are UTS-46 normalised (STD3 ASCII rules, non-transitional) before
//! hashing. `namehash("")` is the zero node; every further label is folded in
//! from the root outward: `node = keccak256(node ++ keccak256(label))`.

use alloy_primitives::{keccak256, B256};

use crate::error::OpsError;

/// 32-byte digest of a dot-separated name; displays as `0x` + 64 hex digits.
pub type NameHash = B256;

/// Hash of a single label, no normalisation.
pub fn labelhash(label: &str) -> B256 {
    keccak256(label.as_bytes())
}

/// Topic0 of an event, e.g. `Deposit(bytes32,uint32,uint256)`.
pub fn event_topic(signature: &str) -> B256 {
    keccak256(signature.as_bytes())
}

/// UTS-46 mapping with STD3 rules, then rejects empty labels.
pub fn normalize(name: &str) -> Result<String, OpsError> {
    if name.is_empty() {
        return Ok(String::new());
    }
    let malformed = |reason| OpsError::MalformedName {
        name: name.to_string(),
        reason,
    };

    let (mapped, outcome) = idna::Config::default()
        .use_std3_ascii_rules(true)
        .transitional_processing(false)
        .check_hyphens(false)
        .to_unicode(name);
    if outcome.is_err() {
        return Err(malformed("not a valid UTS-46 name under STD3 rules"));
    }
    if mapped.split('.').any(str::is_empty) {
        return Err(malformed("empty label"));
    }
    Ok(mapped)
}

pub fn namehash(name: &str) -> Result<NameHash, OpsError> {
    let normalized = normalize(name)?;
    if normalized.is_empty() {
        return Ok(B256::ZERO);
    }

    let mut node = B256::ZERO;
    for label in normalized.rsplit('.') {
        node = keccak256([node.as_slice(), labelhash(label).as_slice()].concat());
    }
    Ok(node)
}
