//! Card persistence.
//!
//! A card record is written once and then only read. Implementations must make each card
//! appear atomically: readers see the full record or nothing.

mod file;
mod memory;

use core::fmt;
use core::str::FromStr;

use alloy_primitives::{Bytes, U256};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use spend_card_types::{unix_now, AccountRef, Capability, SignedCapability, SpendingScope};
use uuid::Uuid;

use crate::error::{CardError, CardResult};

pub use file::JsonFileCardStore;
pub use memory::MemoryCardStore;

/// Opaque card identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardId(Uuid);

impl CardId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for CardId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// Externally visible handle to a signed capability.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Card {
    id: CardId,
    issued_to: AccountRef,
    capability: SignedCapability,
    created_at: u64,
}

impl Card {
    /// Fresh card for `capability`; fails with `ScopeMismatch` unless `issued_to` is the delegatee.
    pub fn issue(issued_to: AccountRef, capability: SignedCapability) -> CardResult<Self> {
        if issued_to != capability.delegatee() {
            return Err(CardError::ScopeMismatch {
                issued_to,
                delegatee: capability.delegatee(),
            });
        }
        Ok(Self {
            id: CardId::generate(),
            issued_to,
            capability,
            created_at: unix_now(),
        })
    }

    pub fn id(&self) -> CardId {
        self.id
    }

    pub fn issued_to(&self) -> AccountRef {
        self.issued_to
    }

    pub fn capability(&self) -> &SignedCapability {
        &self.capability
    }

    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    pub fn to_record(&self) -> CardRecord {
        let capability = self.capability.capability();
        let scope = capability.scope();
        CardRecord {
            id: self.id,
            issued_to: self.issued_to,
            delegator: capability.delegator(),
            delegatee: capability.delegatee(),
            period_amount: scope.period_amount(),
            period_duration: scope.period_duration(),
            start_date: scope.start_date(),
            allow_list: scope.allow_list().iter().copied().collect(),
            salt: capability.salt(),
            signature: self.capability.signature().clone(),
            created_at: self.created_at,
        }
    }
}

/// Persisted layout of a card.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardRecord {
    pub id: CardId,
    pub issued_to: AccountRef,
    pub delegator: AccountRef,
    pub delegatee: AccountRef,
    pub period_amount: U256,
    pub period_duration: u64,
    pub start_date: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allow_list: Vec<AccountRef>,
    pub salt: U256,
    pub signature: Bytes,
    pub created_at: u64,
}

impl CardRecord {
    /// Rebuild the card; a record that no longer forms a valid card is a storage failure.
    pub fn into_card(self) -> CardResult<Card> {
        let scope = SpendingScope::new(
            self.period_amount,
            self.period_duration,
            self.start_date,
            self.allow_list,
        )
        .map_err(|e| CardError::Storage(format!("card {} has an invalid scope: {e}", self.id)))?;
        if self.issued_to != self.delegatee {
            return Err(CardError::Storage(format!(
                "card {} is issued to {} but delegates to {}",
                self.id, self.issued_to, self.delegatee
            )));
        }
        let capability = Capability::new(self.delegator, self.delegatee, scope, self.salt);
        Ok(Card {
            id: self.id,
            issued_to: self.issued_to,
            capability: SignedCapability::new(capability, self.signature),
            created_at: self.created_at,
        })
    }
}

#[async_trait]
pub trait DelegationStore: Send + Sync {
    /// Persist a new card for `capability`. Rejects with `ScopeMismatch` if `issued_to` is not the
    /// capability's delegatee.
    async fn create_card(
        &self,
        issued_to: AccountRef,
        capability: SignedCapability,
    ) -> CardResult<CardId>;

    async fn get_card(&self, id: CardId) -> CardResult<Card>;

    /// Cards whose delegatee is `account`, oldest first.
    async fn list_cards_by_delegatee(&self, account: AccountRef) -> CardResult<Vec<Card>>;
}

#[cfg(test)]
pub(crate) mod test_support {
    use alloy_primitives::Address;
    use spend_card_types::build_scope;

    use super::*;

    pub fn account(byte: u8) -> AccountRef {
        AccountRef::new(Address::repeat_byte(byte))
    }

    pub fn signed(delegatee: AccountRef) -> SignedCapability {
        let scope = build_scope(U256::from(1_000u64), 3_600, Some(1_700_000_000))
            .unwrap()
            .with_allow_list([account(0x51), account(0x52)]);
        SignedCapability::new(
            Capability::new(account(0xaa), delegatee, scope, U256::from(3u64)),
            Bytes::from(vec![9u8; 65]),
        )
    }
}
