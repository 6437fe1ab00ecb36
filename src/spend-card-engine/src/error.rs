use std::time::Duration;

use alloy_primitives::U256;
use spend_card_types::{AccountRef, PeriodError, ScopeError, SignedCapability};

use crate::store::CardId;

/// Errors surfaced by issuance, storage and redemption.
///
/// Local validation failures (`RecipientNotAllowed`, `NotYetActive`, `AmountExceedsLimit`) are
/// raised before anything is sent to the ledger; ledger failures are carried verbatim.
#[derive(Debug, thiserror::Error)]
pub enum CardError {
    #[error("invalid scope: {0}")]
    InvalidScope(#[from] ScopeError),

    #[error("delegator signer denied the delegation: {reason}")]
    SigningDenied { reason: String },

    #[error("card issued to {issued_to} does not match capability delegatee {delegatee}")]
    ScopeMismatch {
        issued_to: AccountRef,
        delegatee: AccountRef,
    },

    #[error("card {0} not found")]
    NotFound(CardId),

    #[error("card is not active until {start_date} (now {now})")]
    NotYetActive { start_date: u64, now: u64 },

    #[error("recipient {0} is not on the card's allow list")]
    RecipientNotAllowed(AccountRef),

    #[error("amount {amount} wei is outside the period allowance (0, {limit}] wei")]
    AmountExceedsLimit { amount: U256, limit: U256 },

    #[error("ledger rejected the redemption: {0}")]
    LedgerRejected(String),

    #[error("ledger did not answer within {0:?}")]
    LedgerTimeout(Duration),

    /// A valid signature exists for a capability that could not be stored.
    #[error("delegation was signed but the card could not be stored: {reason}")]
    IssuanceInconsistent {
        capability: Box<SignedCapability>,
        reason: String,
    },

    #[error("{account} is not an admin of organization {org_id}")]
    Unauthorized { account: AccountRef, org_id: String },

    #[error("user {0} has no account in the directory")]
    UnknownUser(String),

    #[error("card storage failure: {0}")]
    Storage(String),

    #[error("invalid engine configuration: {0}")]
    Config(String),
}

impl From<PeriodError> for CardError {
    fn from(err: PeriodError) -> Self {
        match err {
            PeriodError::NotYetActive { start_date, at } => {
                CardError::NotYetActive { start_date, now: at }
            }
        }
    }
}

pub type CardResult<T> = Result<T, CardError>;
