//! Redemption protocol.
//!
//! The engine checks an intent locally against the card's scope (allow list, activation window,
//! per-period ceiling) and then submits it to the execution ledger. The local amount check is
//! optimistic: the engine does not track what has already been spent, and two concurrent
//! redemptions may both pass it. The ledger's per-period accounting is the only enforcement,
//! and the engine never serializes redemptions itself.

use std::{sync::Arc, time::Duration};

use alloy_primitives::{Address, Bytes, B256, U256};
use spend_card_types::{
    current_period, AccountRef, Environment, Execution, ExecutionLedger, PeriodWindow,
    RedemptionSubmission,
};
use tracing::{info, warn};

use crate::{
    config::EngineConfig,
    encoder::redemption_submission,
    error::{CardError, CardResult},
    store::{Card, CardId, DelegationStore},
};

/// What the redeemer asks for. Ephemeral, never persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RedemptionIntent {
    pub card_id: CardId,
    pub recipient: AccountRef,
    pub amount: U256,
}

/// A redemption that passed local checks and is ready for the ledger.
#[derive(Clone, Debug)]
pub struct PreparedRedemption {
    pub card: Card,
    pub window: PeriodWindow,
    pub execution: Execution,
    pub submission: RedemptionSubmission,
}

/// Outcome of a redemption the ledger accepted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecutionReceipt {
    pub card_id: CardId,
    pub tx_hash: B256,
    pub recipient: AccountRef,
    pub amount: U256,
    /// Period window as computed locally.
    pub window: PeriodWindow,
}

pub struct RedemptionEngine {
    store: Arc<dyn DelegationStore>,
    ledger: Arc<dyn ExecutionLedger>,
    environment: Environment,
    ledger_timeout: Duration,
}

impl RedemptionEngine {
    pub fn new(
        config: &EngineConfig,
        store: Arc<dyn DelegationStore>,
        ledger: Arc<dyn ExecutionLedger>,
    ) -> Self {
        Self {
            store,
            ledger,
            environment: config.environment.clone(),
            ledger_timeout: config.ledger_timeout(),
        }
    }

    /// Load the card, run the local checks and encode the ledger submission.
    pub async fn prepare(
        &self,
        intent: &RedemptionIntent,
        now: u64,
    ) -> CardResult<PreparedRedemption> {
        prepare_redemption(self.store.as_ref(), &self.environment, intent, now).await
    }

    /// Redeem `intent` at instant `now`.
    ///
    /// Ledger rejections and timeouts are returned as-is and never retried: resubmitting a value
    /// transfer without idempotency could execute it twice.
    pub async fn redeem(&self, intent: &RedemptionIntent, now: u64) -> CardResult<ExecutionReceipt> {
        let prepared = self.prepare(intent, now).await?;
        let window = prepared.window;

        let outcome = tokio::time::timeout(
            self.ledger_timeout,
            self.ledger.submit_redemption(&prepared.submission),
        )
        .await;

        let receipt = match outcome {
            Err(_) => {
                warn!(
                    card_id = %intent.card_id,
                    timeout = ?self.ledger_timeout,
                    "ledger submission timed out; outcome unknown to the engine"
                );
                return Err(CardError::LedgerTimeout(self.ledger_timeout));
            }
            Ok(Err(rejection)) => {
                warn!(
                    card_id = %intent.card_id,
                    amount = %intent.amount,
                    period_index = window.index,
                    period_start = window.start,
                    reason = %rejection.reason,
                    "ledger rejected a redemption that passed local checks"
                );
                return Err(CardError::LedgerRejected(rejection.reason));
            }
            Ok(Ok(receipt)) => receipt,
        };

        if let Some(ledger_start) = receipt.period_start {
            if ledger_start != window.start {
                warn!(
                    card_id = %intent.card_id,
                    local_period_start = window.start,
                    ledger_period_start = ledger_start,
                    "ledger charged a different period than the local check assumed"
                );
            }
        }

        info!(
            card_id = %intent.card_id,
            tx_hash = %receipt.tx_hash,
            recipient = %intent.recipient,
            amount = %intent.amount,
            "redemption executed"
        );
        Ok(ExecutionReceipt {
            card_id: intent.card_id,
            tx_hash: receipt.tx_hash,
            recipient: intent.recipient,
            amount: intent.amount,
            window,
        })
    }
}

/// Local half of a redemption: load the card, check recipient, window and amount, and encode the
/// submission. Never contacts a ledger.
pub async fn prepare_redemption(
    store: &dyn DelegationStore,
    environment: &Environment,
    intent: &RedemptionIntent,
    now: u64,
) -> CardResult<PreparedRedemption> {
    let card = store.get_card(intent.card_id).await?;
    let capability = card.capability();
    let scope = capability.scope();

    if !scope.permits_recipient(&intent.recipient) {
        return Err(CardError::RecipientNotAllowed(intent.recipient));
    }

    let window = current_period(scope, now)?;

    if intent.amount.is_zero() || intent.amount > window.allowance {
        return Err(CardError::AmountExceedsLimit {
            amount: intent.amount,
            limit: window.allowance,
        });
    }

    let execution = Execution {
        target: Address::from(intent.recipient),
        value: intent.amount,
        call_data: Bytes::new(),
    };
    let submission = redemption_submission(capability, &execution, environment);
    Ok(PreparedRedemption {
        card,
        window,
        execution,
        submission,
    })
}
