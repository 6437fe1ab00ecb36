//! Capability (delegation) value types.
//!
//! A [`SignedCapability`] has no setters: a different scope means a new capability and a new
//! signature.

use alloy_primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};

use crate::{account::AccountRef, caveats::Caveat, scope::SpendingScope};

/// Authority marking a delegation issued directly by the account (not re-delegated).
pub const ROOT_AUTHORITY: B256 = B256::new([0xff; 32]);

/// Execution environment a capability is bound to (signature domain + enforcer deployment).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    pub chain_id: u64,
    pub delegation_manager: Address,
    pub native_token_period_transfer_enforcer: Address,
    pub allowed_targets_enforcer: Address,
}

/// Unsigned capability: who grants what to whom.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Capability {
    delegator: AccountRef,
    delegatee: AccountRef,
    scope: SpendingScope,
    salt: U256,
}

impl Capability {
    pub fn new(delegator: AccountRef, delegatee: AccountRef, scope: SpendingScope, salt: U256) -> Self {
        Self {
            delegator,
            delegatee,
            scope,
            salt,
        }
    }

    pub fn delegator(&self) -> AccountRef {
        self.delegator
    }

    pub fn delegatee(&self) -> AccountRef {
        self.delegatee
    }

    pub fn scope(&self) -> &SpendingScope {
        &self.scope
    }

    pub fn salt(&self) -> U256 {
        self.salt
    }

    /// Caveats the scope expands to. The allow list only produces a caveat when non-empty.
    pub fn caveats(&self) -> Vec<Caveat> {
        let mut caveats = vec![Caveat::NativeTokenPeriodTransfer {
            period_amount: self.scope.period_amount(),
            period_duration: self.scope.period_duration(),
            start_date: self.scope.start_date(),
        }];
        if !self.scope.allow_list().is_empty() {
            caveats.push(Caveat::AllowedTargets {
                targets: self.scope.allow_list().iter().map(AccountRef::address).collect(),
            });
        }
        caveats
    }
}

/// Capability plus the delegator's signature over it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedCapability {
    capability: Capability,
    signature: Bytes,
}

impl SignedCapability {
    pub fn new(capability: Capability, signature: Bytes) -> Self {
        Self {
            capability,
            signature,
        }
    }

    pub fn capability(&self) -> &Capability {
        &self.capability
    }

    pub fn signature(&self) -> &Bytes {
        &self.signature
    }

    pub fn delegator(&self) -> AccountRef {
        self.capability.delegator
    }

    pub fn delegatee(&self) -> AccountRef {
        self.capability.delegatee
    }

    pub fn scope(&self) -> &SpendingScope {
        &self.capability.scope
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{caveats::EnforcerKind, scope::build_scope};

    fn account(byte: u8) -> AccountRef {
        AccountRef::new(Address::repeat_byte(byte))
    }

    #[test]
    fn unrestricted_scope_has_single_caveat() {
        let scope = build_scope(U256::from(7u64), 60, Some(100)).unwrap();
        let capability = Capability::new(account(1), account(2), scope, U256::from(9u64));
        assert_eq!(
            capability.caveats(),
            vec![Caveat::NativeTokenPeriodTransfer {
                period_amount: U256::from(7u64),
                period_duration: 60,
                start_date: 100,
            }]
        );
    }

    #[test]
    fn allow_list_adds_sorted_targets() {
        let scope = build_scope(U256::from(7u64), 60, Some(100))
            .unwrap()
            .with_allow_list([account(5), account(3)]);
        let capability = Capability::new(account(1), account(2), scope, U256::ZERO);
        let caveats = capability.caveats();
        assert_eq!(caveats.len(), 2);
        assert_eq!(caveats[1].kind(), EnforcerKind::AllowedTargets);
        assert_eq!(
            caveats[1],
            Caveat::AllowedTargets {
                targets: vec![Address::repeat_byte(3), Address::repeat_byte(5)]
            }
        );
    }

    #[test]
    fn environment_resolves_enforcers() {
        let env = Environment {
            chain_id: 1,
            delegation_manager: Address::repeat_byte(0xd0),
            native_token_period_transfer_enforcer: Address::repeat_byte(0xe1),
            allowed_targets_enforcer: Address::repeat_byte(0xe2),
        };
        assert_eq!(
            env.enforcer_kind(Address::repeat_byte(0xe1)),
            Some(EnforcerKind::NativeTokenPeriodTransfer)
        );
        assert_eq!(
            env.enforcer_address(EnforcerKind::AllowedTargets),
            Address::repeat_byte(0xe2)
        );
        assert_eq!(env.enforcer_kind(Address::ZERO), None);
    }
}
