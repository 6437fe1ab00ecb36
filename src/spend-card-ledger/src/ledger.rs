//! In-process execution ledger.
//!
//! All state lives behind one mutex and a redemption reads spend, checks, and commits while
//! holding it, so concurrent redemptions of the same delegation are serialized here and only
//! here.

use std::{collections::HashMap, sync::Arc};

use alloy_primitives::{keccak256, Address, FixedBytes, U256};
use async_trait::async_trait;
use spend_card_types::{
    unix_now, AccountRef, Environment, ExecutionLedger, LedgerReceipt, LedgerRejection,
    RedemptionSubmission, ROOT_AUTHORITY,
};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::{
    decoder::decode_redemption,
    errors::EnforcementError,
    evaluator::evaluate_caveats,
    utils::{
        crypto::recover_address,
        delegation_hash::{delegation_digest, delegation_hash},
    },
};

/// Single call, revert on failure.
const MODE_SINGLE_DEFAULT: FixedBytes<32> = FixedBytes::ZERO;

type Clock = Arc<dyn Fn() -> u64 + Send + Sync>;

#[derive(Default)]
struct LedgerState {
    balances: HashMap<Address, U256>,
    /// Smart account -> owner EOA whose signatures the account accepts.
    owners: HashMap<Address, Address>,
    /// (delegation hash, period index) -> cumulative spend.
    spent: HashMap<(FixedBytes<32>, u64), U256>,
    tx_count: u64,
}

pub struct ReferenceLedger {
    environment: Environment,
    clock: Clock,
    state: Mutex<LedgerState>,
}

impl ReferenceLedger {
    pub fn new(environment: Environment) -> Self {
        Self {
            environment,
            clock: Arc::new(unix_now),
            state: Mutex::new(LedgerState::default()),
        }
    }

    /// Replace the ledger's notion of "now" (block timestamp).
    pub fn with_clock(mut self, clock: Arc<dyn Fn() -> u64 + Send + Sync>) -> Self {
        self.clock = clock;
        self
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    /// Deploy a smart account controlled by `owner`.
    pub async fn register_account(&self, account: AccountRef, owner: Address) {
        self.state.lock().await.owners.insert(account.address(), owner);
    }

    pub async fn fund(&self, account: AccountRef, amount: U256) {
        let mut state = self.state.lock().await;
        let balance = state.balances.entry(account.address()).or_default();
        *balance = balance.saturating_add(amount);
    }

    pub async fn spent_in_period(&self, delegation_hash: FixedBytes<32>, period_index: u64) -> U256 {
        self.state
            .lock()
            .await
            .spent
            .get(&(delegation_hash, period_index))
            .copied()
            .unwrap_or_default()
    }

    async fn execute(
        &self,
        submission: &RedemptionSubmission,
    ) -> Result<LedgerReceipt, EnforcementError> {
        if submission.to != self.environment.delegation_manager {
            return Err(EnforcementError::WrongManager);
        }
        let redemption = decode_redemption(&submission.calldata)?;
        if redemption.mode != MODE_SINGLE_DEFAULT {
            return Err(EnforcementError::UnsupportedMode);
        }
        let delegation = &redemption.delegation;
        let execution = &redemption.execution;
        if delegation.delegate != submission.sender {
            return Err(EnforcementError::InvalidDelegate);
        }
        if delegation.authority != ROOT_AUTHORITY {
            return Err(EnforcementError::InvalidAuthority);
        }

        let hash = delegation_hash(delegation);
        let digest = delegation_digest(delegation, &self.environment);
        let signer =
            recover_address(digest, &delegation.signature).map_err(|_| EnforcementError::InvalidSignature)?;

        let now = (self.clock)();
        let mut state = self.state.lock().await;

        let owner = *state
            .owners
            .get(&delegation.delegator)
            .ok_or(EnforcementError::UnknownDelegator(delegation.delegator))?;
        if signer != owner {
            return Err(EnforcementError::InvalidSignature);
        }

        let charge = evaluate_caveats(delegation, execution, &self.environment, now, |index| {
            state.spent.get(&(hash, index)).copied().unwrap_or_default()
        })?;

        let balance = state
            .balances
            .get(&delegation.delegator)
            .copied()
            .unwrap_or_default();
        if balance < execution.value {
            return Err(EnforcementError::InsufficientBalance {
                balance,
                requested: execution.value,
            });
        }

        // Commit: everything below is infallible.
        state.spent.insert((hash, charge.window.index), charge.spent_after);
        state
            .balances
            .insert(delegation.delegator, balance - execution.value);
        let credited = state.balances.entry(execution.target).or_default();
        *credited = credited.saturating_add(execution.value);
        state.tx_count += 1;

        let mut preimage = hash.to_vec();
        preimage.extend_from_slice(&state.tx_count.to_be_bytes());
        let tx_hash = keccak256(preimage);

        info!(
            delegation = %hash,
            %tx_hash,
            period_index = charge.window.index,
            spent = %charge.spent_after,
            allowance = %charge.window.allowance,
            "redemption executed"
        );
        Ok(LedgerReceipt {
            tx_hash,
            period_start: Some(charge.window.start),
        })
    }
}

#[async_trait]
impl ExecutionLedger for ReferenceLedger {
    async fn submit_redemption(
        &self,
        submission: &RedemptionSubmission,
    ) -> Result<LedgerReceipt, LedgerRejection> {
        self.execute(submission).await.map_err(|e| {
            debug!(sender = %submission.sender, error = %e, "redemption rejected");
            LedgerRejection::new(e.to_string())
        })
    }

    async fn get_balance(&self, account: AccountRef) -> Result<U256, LedgerRejection> {
        Ok(self
            .state
            .lock()
            .await
            .balances
            .get(&account.address())
            .copied()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::Bytes;
    use alloy_sol_types::{SolCall, SolValue};
    use k256::ecdsa::SigningKey;
    use spend_card_types::abi;

    use super::*;
    use crate::utils::crypto::address_of;

    const T0: u64 = 1_700_000_000;

    fn environment() -> Environment {
        Environment {
            chain_id: 1,
            delegation_manager: Address::repeat_byte(0xd0),
            native_token_period_transfer_enforcer: Address::repeat_byte(0xe1),
            allowed_targets_enforcer: Address::repeat_byte(0xe2),
        }
    }

    fn owner_key() -> SigningKey {
        SigningKey::from_slice(&[8u8; 32]).unwrap()
    }

    fn signed_delegation(key: &SigningKey, allowance: u64) -> abi::Delegation {
        let mut terms = U256::from(allowance).to_be_bytes::<32>().to_vec();
        terms.extend_from_slice(&U256::from(60u64).to_be_bytes::<32>());
        terms.extend_from_slice(&U256::from(T0).to_be_bytes::<32>());
        let mut delegation = abi::Delegation {
            delegate: Address::repeat_byte(0xbb),
            delegator: Address::repeat_byte(0xaa),
            authority: ROOT_AUTHORITY,
            caveats: vec![abi::Caveat {
                enforcer: Address::repeat_byte(0xe1),
                terms: terms.into(),
                args: Bytes::new(),
            }],
            salt: U256::from(1u64),
            signature: Bytes::new(),
        };
        let digest = delegation_digest(&delegation, &environment());
        let (sig, recid) = key.sign_prehash_recoverable(digest.as_slice()).unwrap();
        let mut bytes = sig.to_bytes().to_vec();
        bytes.push(27 + recid.to_byte());
        delegation.signature = bytes.into();
        delegation
    }

    fn submission(delegation: &abi::Delegation, value: u64) -> RedemptionSubmission {
        let mut execution = Address::repeat_byte(0x11).to_vec();
        execution.extend_from_slice(&U256::from(value).to_be_bytes::<32>());
        let calldata = abi::redeemDelegationsCall {
            permissionContexts: vec![vec![delegation.clone()].abi_encode().into()],
            modes: vec![FixedBytes::ZERO],
            executionCallDatas: vec![execution.into()],
        }
        .abi_encode();
        RedemptionSubmission {
            sender: delegation.delegate,
            to: Address::repeat_byte(0xd0),
            calldata: calldata.into(),
        }
    }

    async fn ledger(now: u64) -> ReferenceLedger {
        let ledger = ReferenceLedger::new(environment()).with_clock(Arc::new(move || now));
        let treasury = AccountRef::new(Address::repeat_byte(0xaa));
        ledger
            .register_account(treasury, address_of(owner_key().verifying_key()))
            .await;
        ledger.fund(treasury, U256::from(1_000u64)).await;
        ledger
    }

    #[tokio::test]
    async fn executes_and_moves_funds() {
        let ledger = ledger(T0 + 1).await;
        let delegation = signed_delegation(&owner_key(), 100);
        let receipt = ledger
            .submit_redemption(&submission(&delegation, 40))
            .await
            .unwrap();
        assert_eq!(receipt.period_start, Some(T0));
        assert_eq!(
            ledger
                .get_balance(AccountRef::new(Address::repeat_byte(0x11)))
                .await
                .unwrap(),
            U256::from(40u64)
        );
        assert_eq!(
            ledger
                .get_balance(AccountRef::new(Address::repeat_byte(0xaa)))
                .await
                .unwrap(),
            U256::from(960u64)
        );
        assert_eq!(
            ledger.spent_in_period(delegation_hash(&delegation), 0).await,
            U256::from(40u64)
        );
    }

    #[tokio::test]
    async fn rejects_once_period_is_exhausted() {
        let ledger = ledger(T0 + 1).await;
        let delegation = signed_delegation(&owner_key(), 100);
        ledger
            .submit_redemption(&submission(&delegation, 70))
            .await
            .unwrap();
        let rejection = ledger
            .submit_redemption(&submission(&delegation, 31))
            .await
            .unwrap_err();
        assert!(rejection.reason.contains("exceeds period allowance"));
    }

    #[tokio::test]
    async fn foreign_signature_is_rejected() {
        let ledger = ledger(T0 + 1).await;
        let stranger = SigningKey::from_slice(&[9u8; 32]).unwrap();
        let delegation = signed_delegation(&stranger, 100);
        let rejection = ledger
            .submit_redemption(&submission(&delegation, 1))
            .await
            .unwrap_err();
        assert_eq!(rejection.reason, EnforcementError::InvalidSignature.to_string());
    }

    #[tokio::test]
    async fn only_the_delegate_may_redeem() {
        let ledger = ledger(T0 + 1).await;
        let delegation = signed_delegation(&owner_key(), 100);
        let mut forged = submission(&delegation, 1);
        forged.sender = Address::repeat_byte(0xcc);
        let rejection = ledger.submit_redemption(&forged).await.unwrap_err();
        assert_eq!(rejection.reason, EnforcementError::InvalidDelegate.to_string());
    }

    #[tokio::test]
    async fn insufficient_balance_leaves_state_untouched() {
        let ledger = ledger(T0 + 1).await;
        let delegation = signed_delegation(&owner_key(), 5_000);
        let rejection = ledger
            .submit_redemption(&submission(&delegation, 2_000))
            .await
            .unwrap_err();
        assert!(rejection.reason.contains("insufficient balance"));
        assert_eq!(
            ledger.spent_in_period(delegation_hash(&delegation), 0).await,
            U256::ZERO
        );
    }
}
