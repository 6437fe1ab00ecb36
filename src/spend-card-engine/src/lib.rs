//! Spend card engine: issues periodic spending delegations, stores them as cards and redeems
//! them against an execution ledger.

pub mod config;
pub mod directory;
pub mod encoder;
pub mod error;
pub mod issuer;
pub mod redeem;
pub mod service;
pub mod signer;
pub mod store;


pub use config::EngineConfig;
pub use directory::{Directory, MemoryDirectory, Role};
pub use error::{CardError, CardResult};
pub use issuer::DelegationIssuer;
pub use redeem::{
    prepare_redemption, ExecutionReceipt, PreparedRedemption, RedemptionEngine, RedemptionIntent,
};
pub use service::{preview, sign_and_store, CardService, IssuedCard, PeriodPreview};
pub use signer::{DelegationSigner, LocalKeySigner, SignerRejection};
pub use store::{Card, CardId, CardRecord, DelegationStore, JsonFileCardStore, MemoryCardStore};
