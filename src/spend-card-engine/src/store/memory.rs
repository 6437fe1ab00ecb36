use std::collections::HashMap;

use async_trait::async_trait;
use spend_card_types::{AccountRef, SignedCapability};
use tokio::sync::RwLock;

use super::{Card, CardId, DelegationStore};
use crate::error::{CardError, CardResult};

/// In-process card store.
#[derive(Default)]
pub struct MemoryCardStore {
    cards: RwLock<HashMap<CardId, Card>>,
}

impl MemoryCardStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.cards.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.cards.read().await.is_empty()
    }
}

#[async_trait]
impl DelegationStore for MemoryCardStore {
    async fn create_card(
        &self,
        issued_to: AccountRef,
        capability: SignedCapability,
    ) -> CardResult<CardId> {
        let card = Card::issue(issued_to, capability)?;
        let id = card.id();
        self.cards.write().await.insert(id, card);
        Ok(id)
    }

    async fn get_card(&self, id: CardId) -> CardResult<Card> {
        self.cards
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(CardError::NotFound(id))
    }

    async fn list_cards_by_delegatee(&self, account: AccountRef) -> CardResult<Vec<Card>> {
        let mut cards: Vec<Card> = self
            .cards
            .read()
            .await
            .values()
            .filter(|card| card.capability().delegatee() == account)
            .cloned()
            .collect();
        cards.sort_by_key(Card::created_at);
        Ok(cards)
    }
}
