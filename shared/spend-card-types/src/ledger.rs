use alloy_primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;

use crate::account::AccountRef;

/// A concrete value transfer to perform under a delegation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Execution {
    pub target: Address,
    pub value: U256,
    pub call_data: Bytes,
}

/// A `redeemDelegations` transaction binding a signed delegation and an execution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RedemptionSubmission {
    /// The delegate submitting the redemption.
    pub sender: Address,
    /// Delegation manager contract.
    pub to: Address,
    pub calldata: Bytes,
}

/// Result of an accepted redemption.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LedgerReceipt {
    pub tx_hash: B256,
    /// Start of the period the ledger charged, when it reports one.
    pub period_start: Option<u64>,
}

/// Rejection reported by the ledger, kept verbatim.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{reason}")]
pub struct LedgerRejection {
    pub reason: String,
}

impl LedgerRejection {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Execution ledger abstraction: the sole authority for signature verification, cumulative
/// per-period spend and atomic execution of transfers.
#[async_trait]
pub trait ExecutionLedger: Send + Sync {
    async fn submit_redemption(
        &self,
        submission: &RedemptionSubmission,
    ) -> Result<LedgerReceipt, LedgerRejection>;

    async fn get_balance(&self, account: AccountRef) -> Result<U256, LedgerRejection>;
}
