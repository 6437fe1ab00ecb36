//! Card lifecycle: directory-authorized issuance, lookup, previews and redemption.

use std::sync::Arc;

use alloy_primitives::U256;
use spend_card_types::{
    current_period, AccountRef, ExecutionLedger, PeriodWindow, SignedCapability, SpendingScope,
};
use tracing::error;

use crate::{
    config::EngineConfig,
    directory::Directory,
    error::{CardError, CardResult},
    issuer::DelegationIssuer,
    redeem::{ExecutionReceipt, RedemptionEngine, RedemptionIntent},
    signer::DelegationSigner,
    store::{Card, CardId, DelegationStore},
};

/// Result of issuing a card.
#[derive(Clone, Debug)]
pub struct IssuedCard {
    pub card_id: CardId,
    pub capability: SignedCapability,
}

/// Period preview for display ("resets every ...").
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PeriodPreview {
    pub window: PeriodWindow,
    pub next_reset: u64,
}

pub struct CardService {
    issuer: DelegationIssuer,
    store: Arc<dyn DelegationStore>,
    ledger: Arc<dyn ExecutionLedger>,
    directory: Arc<dyn Directory>,
    redemption: RedemptionEngine,
}

impl CardService {
    pub fn new(
        config: &EngineConfig,
        store: Arc<dyn DelegationStore>,
        ledger: Arc<dyn ExecutionLedger>,
        directory: Arc<dyn Directory>,
    ) -> Self {
        Self {
            issuer: DelegationIssuer::new(config),
            redemption: RedemptionEngine::new(config, store.clone(), ledger.clone()),
            store,
            ledger,
            directory,
        }
    }

    /// Sign a capability and store it as a card. Nothing is stored unless signing succeeds.
    pub async fn issue<S>(
        &self,
        signer: &S,
        delegator: AccountRef,
        delegatee: AccountRef,
        scope: SpendingScope,
    ) -> CardResult<IssuedCard>
    where
        S: DelegationSigner + ?Sized,
    {
        sign_and_store(
            &self.issuer,
            self.store.as_ref(),
            signer,
            delegator,
            delegatee,
            scope,
        )
        .await
    }

    /// Issue a card to a directory user on behalf of an organization admin.
    pub async fn issue_card<S>(
        &self,
        signer: &S,
        admin: AccountRef,
        org_id: &str,
        treasury: AccountRef,
        delegatee_user_id: &str,
        scope: SpendingScope,
    ) -> CardResult<IssuedCard>
    where
        S: DelegationSigner + ?Sized,
    {
        if !self.directory.is_admin(admin, org_id).await {
            return Err(CardError::Unauthorized {
                account: admin,
                org_id: org_id.to_string(),
            });
        }
        let delegatee = self
            .directory
            .resolve_account(delegatee_user_id)
            .await
            .ok_or_else(|| CardError::UnknownUser(delegatee_user_id.to_string()))?;
        self.issue(signer, treasury, delegatee, scope).await
    }

    pub async fn card_for(&self, card_id: CardId) -> CardResult<Card> {
        self.store.get_card(card_id).await
    }

    pub async fn cards_for(&self, account: AccountRef) -> CardResult<Vec<Card>> {
        self.store.list_cards_by_delegatee(account).await
    }

    pub async fn treasury_balance(&self, account: AccountRef) -> CardResult<U256> {
        self.ledger
            .get_balance(account)
            .await
            .map_err(|rejection| CardError::LedgerRejected(rejection.reason))
    }

    pub async fn redeem(
        &self,
        intent: &RedemptionIntent,
        now: u64,
    ) -> CardResult<ExecutionReceipt> {
        self.redemption.redeem(intent, now).await
    }

    pub fn redemption(&self) -> &RedemptionEngine {
        &self.redemption
    }
}

/// Issue through `issuer` and persist the result in `store`.
///
/// A store failure after a successful signature is logged and returned as
/// `IssuanceInconsistent` carrying the signed capability.
pub async fn sign_and_store<S>(
    issuer: &DelegationIssuer,
    store: &dyn DelegationStore,
    signer: &S,
    delegator: AccountRef,
    delegatee: AccountRef,
    scope: SpendingScope,
) -> CardResult<IssuedCard>
where
    S: DelegationSigner + ?Sized,
{
    let capability = issuer.issue(signer, delegator, delegatee, scope).await?;

    match store.create_card(delegatee, capability.clone()).await {
        Ok(card_id) => Ok(IssuedCard {
            card_id,
            capability,
        }),
        Err(e) => {
            error!(
                %delegator,
                %delegatee,
                signature = ?capability.signature(),
                error = %e,
                "delegation signed but not stored; signed capability is undiscoverable"
            );
            Err(CardError::IssuanceInconsistent {
                capability: Box::new(capability),
                reason: e.to_string(),
            })
        }
    }
}

/// Window containing `now` and when the allowance next resets.
pub fn preview(scope: &SpendingScope, now: u64) -> CardResult<PeriodPreview> {
    let window = current_period(scope, now)?;
    Ok(PeriodPreview {
        window,
        next_reset: window.end,
    })
}
