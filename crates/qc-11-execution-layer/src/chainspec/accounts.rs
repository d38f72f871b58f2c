//! Genesis accounts
//!
//! The initial-accounts file has one account per line:
//!
//! ```text
//! <base64 public key>,<initial balance>,<initial bonded amount>
//! ```
//!
//! Amounts are decimal integers of at most 512 bits. Blank lines are ignored.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use primitive_types::U512;
use serde::{Deserialize, Serialize};
use serde_with::{hex::Hex, serde_as};
use std::fmt;
use std::str::FromStr;

use crate::domain::errors::ChainSpecError;

/// Bit width of every amount handed to the engine.
pub const AMOUNT_BIT_WIDTH: u32 = 512;

/// Account public key, 32 bytes.
#[serde_as]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicKey(#[serde_as(as = "Hex")] pub [u8; 32]);

impl PublicKey {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ChainSpecError> {
        let array: [u8; 32] = bytes.try_into().map_err(|_| {
            ChainSpecError::InvalidPublicKey(format!("expected 32 bytes, got {}", bytes.len()))
        })?;
        Ok(Self(array))
    }

    pub fn from_base64(encoded: &str) -> Result<Self, ChainSpecError> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| ChainSpecError::InvalidPublicKey(e.to_string()))?;
        Self::from_bytes(&bytes)
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.0)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.to_base64())
    }
}

/// Non-negative token amount, serialized as a decimal string.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Amount(U512);

impl Amount {
    pub fn new(value: U512) -> Self {
        Self(value)
    }

    pub fn value(&self) -> U512 {
        self.0
    }
}

impl FromStr for Amount {
    type Err = ChainSpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let invalid = |reason: &str| ChainSpecError::InvalidAmount {
            value: s.to_string(),
            reason: reason.to_string(),
        };
        if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid("not a decimal integer"));
        }
        U512::from_dec_str(trimmed)
            .map(Self)
            .map_err(|_| invalid("does not fit in 512 bits"))
    }
}

impl TryFrom<String> for Amount {
    type Error = ChainSpecError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Amount> for String {
    fn from(amount: Amount) -> Self {
        amount.to_string()
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Amount({})", self.0)
    }
}

/// One initial account of the chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisAccount {
    pub public_key: PublicKey,
    pub balance: Amount,
    pub bonded_amount: Amount,
}

/// Parse the accounts file, preserving line order.
pub fn parse_accounts(content: &str) -> Result<Vec<GenesisAccount>, ChainSpecError> {
    let mut accounts = Vec::new();
    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let malformed = |message: String| ChainSpecError::MalformedAccounts {
            line: index + 1,
            message,
        };

        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() != 3 {
            return Err(malformed(format!("expected 3 fields, got {}", fields.len())));
        }

        accounts.push(GenesisAccount {
            public_key: PublicKey::from_base64(fields[0]).map_err(|e| malformed(e.to_string()))?,
            balance: fields[1].parse().map_err(|e: ChainSpecError| malformed(e.to_string()))?,
            bonded_amount: fields[2]
                .parse()
                .map_err(|e: ChainSpecError| malformed(e.to_string()))?,
        });
    }
    Ok(accounts)
}

/// Render accounts back into the file format.
pub fn render_accounts(accounts: &[GenesisAccount]) -> String {
    accounts
        .iter()
        .map(|a| format!("{},{},{}\n", a.public_key.to_base64(), a.balance, a.bonded_amount))
        .collect()
}
