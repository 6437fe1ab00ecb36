use alloy_primitives::{Address, U256};

use crate::capability::Environment;

/// Length of the native-token period transfer terms: `u256 amount || u256 duration || u256 start`.
pub const PERIOD_TRANSFER_TERMS_LEN: usize = 96;

/// Enforcers understood by the delegation framework deployment this crate targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnforcerKind {
    NativeTokenPeriodTransfer,
    AllowedTargets,
}

/// Decoded representation of a single caveat.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Caveat {
    NativeTokenPeriodTransfer {
        period_amount: U256,
        period_duration: u64,
        start_date: u64,
    },
    AllowedTargets { targets: Vec<Address> },
}

impl Caveat {
    pub fn kind(&self) -> EnforcerKind {
        match self {
            Caveat::NativeTokenPeriodTransfer { .. } => EnforcerKind::NativeTokenPeriodTransfer,
            Caveat::AllowedTargets { .. } => EnforcerKind::AllowedTargets,
        }
    }
}

impl Environment {
    pub fn enforcer_address(&self, kind: EnforcerKind) -> Address {
        match kind {
            EnforcerKind::NativeTokenPeriodTransfer => self.native_token_period_transfer_enforcer,
            EnforcerKind::AllowedTargets => self.allowed_targets_enforcer,
        }
    }

    pub fn enforcer_kind(&self, enforcer: Address) -> Option<EnforcerKind> {
        if enforcer == self.native_token_period_transfer_enforcer {
            Some(EnforcerKind::NativeTokenPeriodTransfer)
        } else if enforcer == self.allowed_targets_enforcer {
            Some(EnforcerKind::AllowedTargets)
        } else {
            None
        }
    }
}
