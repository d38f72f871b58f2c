//! Value objects for the Execution Layer

use serde::{Deserialize, Serialize};
use serde_with::{hex::Hex, serde_as};
use std::fmt;
use std::str::FromStr;

use super::errors::{ChainSpecError, ExecutionLayerError, KeeperError};

/// Width in bytes of every state hash produced by the execution engine.
pub const STATE_HASH_LENGTH: usize = 32;

/// Block id under which the genesis post-state hash is recorded.
pub const GENESIS_KEY: &[u8] = b"genesis";

/// Root hash of the engine's global state after some sequence of commits.
#[serde_as]
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StateHash(#[serde_as(as = "Hex")] pub [u8; STATE_HASH_LENGTH]);

impl StateHash {
    pub fn new(bytes: [u8; STATE_HASH_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Accepts exactly [`STATE_HASH_LENGTH`] bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, KeeperError> {
        let array: [u8; STATE_HASH_LENGTH] =
            bytes.try_into().map_err(|_| KeeperError::InvalidWidth {
                expected: STATE_HASH_LENGTH,
                actual: bytes.len(),
            })?;
        Ok(Self(array))
    }

    pub fn as_bytes(&self) -> &[u8; STATE_HASH_LENGTH] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for StateHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for StateHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StateHash({}..)", &self.to_hex()[..12])
    }
}

/// Consensus identifier of a block. Opaque bytes; may be empty for the first
/// block after genesis.
#[serde_as]
#[derive(Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct BlockId(#[serde_as(as = "Hex")] Vec<u8>);

impl BlockId {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// The reserved id under which the genesis state hash lives.
    pub fn genesis() -> Self {
        Self(GENESIS_KEY.to_vec())
    }

    pub fn is_genesis(&self) -> bool {
        self.0 == GENESIS_KEY
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_genesis() {
            f.write_str("genesis")
        } else if self.0.is_empty() {
            f.write_str("<empty>")
        } else {
            f.write_str(&hex::encode(&self.0))
        }
    }
}

impl fmt::Debug for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockId({})", self)
    }
}

/// Engine protocol version, written "major.minor.patch".
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct ProtocolVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl ProtocolVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl FromStr for ProtocolVersion {
    type Err = ChainSpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ChainSpecError::InvalidProtocolVersion {
            value: s.to_string(),
            reason: reason.to_string(),
        };

        let parts: Vec<&str> = s.split('.').collect();
        if parts.len() != 3 {
            return Err(invalid("expected exactly three dot-separated components"));
        }

        let mut numbers = [0u32; 3];
        for (slot, part) in numbers.iter_mut().zip(&parts) {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid("components must be non-negative integers"));
            }
            *slot = part
                .parse()
                .map_err(|_| invalid("component does not fit in 32 bits"))?;
        }

        Ok(Self::new(numbers[0], numbers[1], numbers[2]))
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Position of a deploy inside a block: transaction index, then message index
/// within that transaction. Field order gives the execution order.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct DeployKey {
    pub tx_index: u32,
    pub msg_index: u32,
}

impl DeployKey {
    pub const fn new(tx_index: u32, msg_index: u32) -> Self {
        Self {
            tx_index,
            msg_index,
        }
    }

    /// The position right after this one inside the same transaction.
    pub fn next_in_tx(self) -> Self {
        Self::new(self.tx_index, self.msg_index.saturating_add(1))
    }

    /// The first position of the following transaction.
    pub fn next_tx(self) -> Self {
        Self::new(self.tx_index.saturating_add(1), 0)
    }
}

impl fmt::Display for DeployKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.tx_index, self.msg_index)
    }
}

/// A bonded validator as reported by the engine after a commit.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bond {
    #[serde_as(as = "Hex")]
    pub validator_public_key: Vec<u8>,
    /// Decimal stake amount
    pub stake: String,
}

/// Global-state key a query starts from.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "key_type", content = "key", rename_all = "snake_case")]
pub enum QueryKey {
    /// Account, by 32-byte public key
    Address(#[serde_as(as = "Hex")] Vec<u8>),
    Uref(#[serde_as(as = "Hex")] Vec<u8>),
    Local(#[serde_as(as = "Hex")] Vec<u8>),
    Hash(#[serde_as(as = "Hex")] Vec<u8>),
}

impl QueryKey {
    /// Build a key from a type name and hex data. Addresses must be 32 bytes.
    pub fn parse(key_type: &str, key_data: &str) -> Result<Self, ExecutionLayerError> {
        let bytes = hex::decode(key_data.trim_start_matches("0x"))
            .map_err(|e| ExecutionLayerError::InvalidMessage(format!("key data: {e}")))?;
        match key_type {
            "address" => {
                if bytes.len() != 32 {
                    return Err(ExecutionLayerError::InvalidMessage(format!(
                        "address must be 32 bytes, got {}",
                        bytes.len()
                    )));
                }
                Ok(Self::Address(bytes))
            }
            "uref" => Ok(Self::Uref(bytes)),
            "local" => Ok(Self::Local(bytes)),
            "hash" => Ok(Self::Hash(bytes)),
            other => Err(ExecutionLayerError::InvalidMessage(format!(
                "unknown key type {other:?}"
            ))),
        }
    }
}
