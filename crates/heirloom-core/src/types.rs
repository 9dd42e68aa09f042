//! Account, hash and share primitives.

use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Will identifier, allocated sequentially by the engine.
pub type WillId = u64;

/// Chain identifier (EIP-155 style numeric id).
pub type ChainId = u64;

/// Token contract address. [`Address::ZERO`] is the native asset.
pub type TokenId = Address;

/// 100.00% expressed in basis points.
pub const MAX_BPS: u32 = 10_000;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PrimitiveError {
    #[error("Missing 0x prefix")]
    MissingPrefix,

    #[error("Expected {expected} hex characters, got {got}")]
    InvalidLength { expected: usize, got: usize },

    #[error("Invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    #[error("Basis points out of range: {0} (max 10000)")]
    BpsOutOfRange(u32),
}

/// A 20-byte account address, rendered as `0x` + 40 lowercase hex chars.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address([u8; 20]);

impl Address {
    pub const ZERO: Address = Address([0u8; 20]);

    pub const fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Deterministic address whose last byte is `seed`. Handy for fixtures.
    pub const fn from_low_u8(seed: u8) -> Self {
        let mut bytes = [0u8; 20];
        bytes[19] = seed;
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl FromStr for Address {
    type Err = PrimitiveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let body = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .ok_or(PrimitiveError::MissingPrefix)?;
        if body.len() != 40 {
            return Err(PrimitiveError::InvalidLength {
                expected: 40,
                got: body.len(),
            });
        }
        let mut bytes = [0u8; 20];
        hex::decode_to_slice(body, &mut bytes)?;
        Ok(Self(bytes))
    }
}

/// A 32-byte hash (document hash, death-certificate proof hash).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Digest([u8; 32]);

impl Digest {
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// SHA-256 of arbitrary bytes.
    pub fn sha256(data: impl AsRef<[u8]>) -> Self {
        Self(Sha256::digest(data.as_ref()).into())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_array(self) -> [u8; 32] {
        self.0
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self)
    }
}

impl FromStr for Digest {
    type Err = PrimitiveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let body = s.strip_prefix("0x").unwrap_or(s);
        if body.len() != 64 {
            return Err(PrimitiveError::InvalidLength {
                expected: 64,
                got: body.len(),
            });
        }
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(body, &mut bytes)?;
        Ok(Self(bytes))
    }
}

/// Serde support for types that round-trip through `Display`/`FromStr`.
macro_rules! string_serde {
    ($type:ty) => {
        impl Serialize for $type {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.serialize_str(&self.to_string())
            }
        }

        impl<'de> Deserialize<'de> for $type {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let s = String::deserialize(deserializer)?;
                <$type>::from_str(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}

string_serde!(Address);
string_serde!(Digest);

/// A share expressed in basis points (0–10000).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Bps(u32);

impl Bps {
    pub const ZERO: Bps = Bps(0);
    pub const FULL: Bps = Bps(MAX_BPS);

    pub fn new(value: u32) -> Result<Self, PrimitiveError> {
        if value > MAX_BPS {
            return Err(PrimitiveError::BpsOutOfRange(value));
        }
        Ok(Self(value))
    }

    pub fn get(self) -> u32 {
        self.0
    }

    /// `floor(amount * self / 10000)` without intermediate overflow.
    pub fn apply(self, amount: u128) -> u128 {
        let bps = self.0 as u128;
        let max = MAX_BPS as u128;
        amount / max * bps + amount % max * bps / max
    }

    /// Percentage with two decimals, for display.
    pub fn as_percent(self) -> f64 {
        self.0 as f64 / 100.0
    }
}

impl TryFrom<u32> for Bps {
    type Error = PrimitiveError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Bps::new(value)
    }
}

impl From<Bps> for u32 {
    fn from(bps: Bps) -> Self {
        bps.0
    }
}

impl fmt::Display for Bps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}%", self.0 / 100, self.0 % 100)
    }
}
