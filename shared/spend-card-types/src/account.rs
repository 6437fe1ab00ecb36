use core::fmt;
use core::str::FromStr;

use alloy_primitives::Address;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

/// Errors while parsing an account reference from text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccountParseError {
    #[error("account reference must be 20 bytes of hex, got {0} characters")]
    BadLength(usize),
    #[error("account reference is not valid hex: {0}")]
    BadHex(String),
}

/// Normalized reference to a wallet or smart-contract account.
///
/// Parsing is case-insensitive and rendering is always lower-case `0x`-prefixed hex, so two
/// references that differ only in case are the same value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AccountRef(Address);

impl AccountRef {
    pub const fn new(address: Address) -> Self {
        Self(address)
    }

    pub fn address(&self) -> Address {
        self.0
    }
}

impl From<Address> for AccountRef {
    fn from(address: Address) -> Self {
        Self(address)
    }
}

impl From<AccountRef> for Address {
    fn from(account: AccountRef) -> Self {
        account.0
    }
}

impl fmt::Display for AccountRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0.as_slice()))
    }
}

impl FromStr for AccountRef {
    type Err = AccountParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        if digits.len() != 40 {
            return Err(AccountParseError::BadLength(digits.len()));
        }
        let bytes = hex::decode(digits.to_ascii_lowercase())
            .map_err(|e| AccountParseError::BadHex(e.to_string()))?;
        Ok(Self(Address::from_slice(&bytes)))
    }
}

impl Serialize for AccountRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for AccountRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parsing_ignores_case() {
        let lower: AccountRef = "0xabcdef0123456789abcdef0123456789abcdef01".parse().unwrap();
        let mixed: AccountRef = "0xABCDEF0123456789abcdef0123456789ABCDEF01".parse().unwrap();
        assert_eq!(lower, mixed);
        assert_eq!(
            mixed.to_string(),
            "0xabcdef0123456789abcdef0123456789abcdef01"
        );
    }

    #[test]
    fn rejects_short_and_non_hex_input() {
        assert_eq!(
            "0x1234".parse::<AccountRef>(),
            Err(AccountParseError::BadLength(4))
        );
        assert!(matches!(
            "0xzzcdef0123456789abcdef0123456789abcdef01".parse::<AccountRef>(),
            Err(AccountParseError::BadHex(_))
        ));
    }

    #[test]
    fn serializes_as_lowercase_string() {
        let account: AccountRef = "0xABCDEF0123456789abcdef0123456789ABCDEF01".parse().unwrap();
        let json = serde_json::to_string(&account).unwrap();
        assert_eq!(json, "\"0xabcdef0123456789abcdef0123456789abcdef01\"");
        let back: AccountRef = serde_json::from_str(&json).unwrap();
        assert_eq!(back, account);
    }
}
