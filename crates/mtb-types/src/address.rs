//! # Module Addresses
//!
//! MTBbus addresses occupy a single byte, but address 0 is reserved for
//! broadcast, so only `1..=255` identifies a module.

use serde::{Deserialize, Serialize};
use serde_json::Number;
use std::fmt;
use thiserror::Error;

/// Lowest valid module address.
pub const MIN_ADDRESS: u8 = 1;

/// Highest valid module address.
pub const MAX_ADDRESS: u8 = 255;

/// Address outside of the valid module range.
///
/// Keeps the number as the client sent it, which may not fit any integer
/// type.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Invalid module address: {0}")]
pub struct AddressError(pub Number);

/// A validated module address in `1..=255`.
///
/// The address does not have to belong to a configured or active module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct ModuleAddress(u8);

impl ModuleAddress {
    /// Validate a raw integer coming from a client or a config file.
    pub fn new(raw: i64) -> Result<Self, AddressError> {
        match u8::try_from(raw) {
            Ok(addr) if addr >= MIN_ADDRESS => Ok(Self(addr)),
            _ => Err(AddressError(raw.into())),
        }
    }

    /// Validate any JSON number. Floats and integers beyond `i64` are
    /// rejected like every other out-of-range value.
    pub fn from_number(raw: &Number) -> Result<Self, AddressError> {
        raw.as_u64()
            .and_then(|value| u8::try_from(value).ok())
            .filter(|addr| *addr >= MIN_ADDRESS)
            .map(Self)
            .ok_or_else(|| AddressError(raw.clone()))
    }

    /// Validate a whole list of JSON numbers. Fails on the first invalid
    /// entry without returning any of the valid ones.
    pub fn parse_numbers(raw: &[Number]) -> Result<Vec<Self>, AddressError> {
        raw.iter().map(Self::from_number).collect()
    }

    /// Every valid address, ascending.
    pub fn all() -> impl Iterator<Item = Self> {
        (MIN_ADDRESS..=MAX_ADDRESS).map(Self)
    }

    /// Raw byte value.
    #[must_use]
    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for ModuleAddress {
    type Error = AddressError;

    fn try_from(raw: i64) -> Result<Self, Self::Error> {
        Self::new(raw)
    }
}

impl From<ModuleAddress> for u8 {
    fn from(addr: ModuleAddress) -> Self {
        addr.0
    }
}

impl fmt::Display for ModuleAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
