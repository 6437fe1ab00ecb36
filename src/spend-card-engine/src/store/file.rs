use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use spend_card_types::{AccountRef, SignedCapability};
use tokio::fs;

use super::{Card, CardId, CardRecord, DelegationStore};
use crate::error::{CardError, CardResult};

/// Card store keeping one JSON file per card under a directory.
///
/// Each card is written to `<id>.json.tmp` and renamed into place, so a reader never observes a
/// half-written record.
pub struct JsonFileCardStore {
    dir: PathBuf,
}

impl JsonFileCardStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn card_path(&self, id: CardId) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    async fn read_record(path: &Path) -> CardResult<Option<CardRecord>> {
        let raw = match fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(CardError::Storage(format!(
                    "failed reading {}: {e}",
                    path.display()
                )))
            }
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| CardError::Storage(format!("failed parsing {}: {e}", path.display())))
    }
}

#[async_trait]
impl DelegationStore for JsonFileCardStore {
    async fn create_card(
        &self,
        issued_to: AccountRef,
        capability: SignedCapability,
    ) -> CardResult<CardId> {
        let card = Card::issue(issued_to, capability)?;
        let path = self.card_path(card.id());

        fs::create_dir_all(&self.dir).await.map_err(|e| {
            CardError::Storage(format!("failed creating directory {}: {e}", self.dir.display()))
        })?;
        ensure_absent(&path).await?;

        let serialised = serde_json::to_string_pretty(&card.to_record())
            .map_err(|e| CardError::Storage(format!("failed serialising card: {e}")))?;
        write_atomic(&path, serialised.as_bytes()).await?;
        Ok(card.id())
    }

    async fn get_card(&self, id: CardId) -> CardResult<Card> {
        match Self::read_record(&self.card_path(id)).await? {
            Some(record) => record.into_card(),
            None => Err(CardError::NotFound(id)),
        }
    }

    async fn list_cards_by_delegatee(&self, account: AccountRef) -> CardResult<Vec<Card>> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(CardError::Storage(format!(
                    "failed listing {}: {e}",
                    self.dir.display()
                )))
            }
        };

        let mut cards = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| CardError::Storage(format!("failed listing {}: {e}", self.dir.display())))?
        {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            if let Some(record) = Self::read_record(&path).await? {
                if record.delegatee == account {
                    cards.push(record.into_card()?);
                }
            }
        }
        cards.sort_by_key(Card::created_at);
        Ok(cards)
    }
}

async fn ensure_absent(path: &Path) -> CardResult<()> {
    match fs::try_exists(path).await {
        Ok(false) => Ok(()),
        Ok(true) => Err(CardError::Storage(format!(
            "refusing to overwrite existing card {}",
            path.display()
        ))),
        Err(e) => Err(CardError::Storage(format!(
            "failed checking {}: {e}",
            path.display()
        ))),
    }
}

/// Write `<path>.tmp` and rename it over `path`. The temp file never outlives a failure.
async fn write_atomic(path: &Path, contents: &[u8]) -> CardResult<()> {
    let tmp_path = tmp_path_for(path);
    if let Err(e) = fs::write(&tmp_path, contents).await {
        let _ = fs::remove_file(&tmp_path).await;
        return Err(CardError::Storage(format!(
            "failed writing temp file {}: {e}",
            tmp_path.display()
        )));
    }
    if let Err(e) = fs::rename(&tmp_path, path).await {
        let _ = fs::remove_file(&tmp_path).await;
        return Err(CardError::Storage(format!(
            "failed replacing {}: {e}",
            path.display()
        )));
    }
    Ok(())
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_os_string();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}
