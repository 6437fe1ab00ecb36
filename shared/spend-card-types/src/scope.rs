//! Spending scope: the authorization payload carried by every capability.

use std::collections::BTreeSet;

use alloy_primitives::{utils::parse_ether, U256};
use time::OffsetDateTime;

use crate::account::AccountRef;

/// Errors while constructing a scope.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScopeError {
    #[error("period duration must be at least one second")]
    ZeroPeriodDuration,
    #[error("period amount must not be negative: {0}")]
    NegativeAmount(String),
    #[error("period amount is not a decimal ether quantity: {0}")]
    MalformedAmount(String),
}

/// Periodic native-value transfer allowance, optionally restricted to an allow list of recipients.
///
/// Fields are private: a scope is built through [`build_scope`] or [`SpendingScope::new`], which
/// enforce `period_duration >= 1`. Amounts are unsigned wei, so `period_amount >= 0` holds by type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpendingScope {
    period_amount: U256,
    period_duration: u64,
    start_date: u64,
    allow_list: BTreeSet<AccountRef>,
}

impl SpendingScope {
    pub fn new(
        period_amount: U256,
        period_duration: u64,
        start_date: u64,
        allow_list: impl IntoIterator<Item = AccountRef>,
    ) -> Result<Self, ScopeError> {
        if period_duration == 0 {
            return Err(ScopeError::ZeroPeriodDuration);
        }
        Ok(Self {
            period_amount,
            period_duration,
            start_date,
            allow_list: allow_list.into_iter().collect(),
        })
    }

    /// Restrict recipients. Only meaningful before the scope is bound into a signed capability.
    pub fn with_allow_list(mut self, allow_list: impl IntoIterator<Item = AccountRef>) -> Self {
        self.allow_list = allow_list.into_iter().collect();
        self
    }

    pub fn period_amount(&self) -> U256 {
        self.period_amount
    }

    pub fn period_duration(&self) -> u64 {
        self.period_duration
    }

    pub fn start_date(&self) -> u64 {
        self.start_date
    }

    pub fn allow_list(&self) -> &BTreeSet<AccountRef> {
        &self.allow_list
    }

    /// An empty allow list leaves the recipient unrestricted.
    pub fn permits_recipient(&self, recipient: &AccountRef) -> bool {
        self.allow_list.is_empty() || self.allow_list.contains(recipient)
    }
}

/// Build a scope, defaulting `start_date` to the current instant.
pub fn build_scope(
    period_amount: U256,
    period_duration: u64,
    start_date: Option<u64>,
) -> Result<SpendingScope, ScopeError> {
    SpendingScope::new(
        period_amount,
        period_duration,
        start_date.unwrap_or_else(unix_now),
        [],
    )
}

/// Parse a decimal ether quantity (`"0.5"`) into wei.
pub fn parse_amount(text: &str) -> Result<U256, ScopeError> {
    let trimmed = text.trim();
    if trimmed.starts_with('-') {
        return Err(ScopeError::NegativeAmount(trimmed.to_string()));
    }
    parse_ether(trimmed).map_err(|_| ScopeError::MalformedAmount(trimmed.to_string()))
}

/// Current unix time in seconds.
pub fn unix_now() -> u64 {
    u64::try_from(OffsetDateTime::now_utc().unix_timestamp()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_duration() {
        assert_eq!(
            build_scope(U256::from(1u64), 0, Some(10)),
            Err(ScopeError::ZeroPeriodDuration)
        );
    }

    #[test]
    fn zero_amount_is_a_valid_scope() {
        let scope = build_scope(U256::ZERO, 1, Some(10)).unwrap();
        assert_eq!(scope.period_amount(), U256::ZERO);
        assert_eq!(scope.period_duration(), 1);
    }

    #[test]
    fn start_date_defaults_to_now() {
        let before = unix_now();
        let scope = build_scope(U256::from(5u64), 60, None).unwrap();
        let after = unix_now();
        assert!(scope.start_date() >= before && scope.start_date() <= after);
    }

    #[test]
    fn parses_ether_amounts() {
        assert_eq!(
            parse_amount("0.5").unwrap(),
            U256::from(500_000_000_000_000_000u64)
        );
        assert_eq!(
            parse_amount(" 1 ").unwrap(),
            U256::from(1_000_000_000_000_000_000u64)
        );
    }

    #[test]
    fn rejects_negative_and_malformed_amounts() {
        assert_eq!(
            parse_amount("-1"),
            Err(ScopeError::NegativeAmount("-1".to_string()))
        );
        assert_eq!(
            parse_amount("lots"),
            Err(ScopeError::MalformedAmount("lots".to_string()))
        );
    }

    #[test]
    fn empty_allow_list_is_unrestricted() {
        let a: AccountRef = "0x1111111111111111111111111111111111111111".parse().unwrap();
        let b: AccountRef = "0x2222222222222222222222222222222222222222".parse().unwrap();
        let open = build_scope(U256::from(1u64), 60, Some(0)).unwrap();
        assert!(open.permits_recipient(&a));

        let restricted = open.with_allow_list([a]);
        assert!(restricted.permits_recipient(&a));
        assert!(!restricted.permits_recipient(&b));
    }
}
