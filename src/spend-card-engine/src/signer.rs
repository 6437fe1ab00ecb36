//! Delegator signing contract.
//!
//! The signer is an external collaborator (wallet, hardware device, remote key service). It is
//! asked to sign the EIP-712 digest of one exact delegation under one environment and either
//! returns a 65-byte `r || s || v` signature or rejects.

use alloy_primitives::{Address, Bytes, FixedBytes};
use async_trait::async_trait;
use k256::ecdsa::SigningKey;

use spend_card_types::abi;

use crate::encoder::keccak256_bytes;

/// Signer refused or failed to sign.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{reason}")]
pub struct SignerRejection {
    pub reason: String,
}

impl SignerRejection {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
pub trait DelegationSigner: Send + Sync {
    /// Sign `digest`, the typed-data hash of `delegation`.
    ///
    /// `delegation` is passed for signers that display what they are approving; the signature
    /// must be over `digest` only.
    async fn sign_delegation(
        &self,
        delegation: &abi::Delegation,
        digest: FixedBytes<32>,
    ) -> Result<Bytes, SignerRejection>;
}

/// Signer backed by an in-process secp256k1 key (the owner key of the treasury account).
pub struct LocalKeySigner {
    key: SigningKey,
}

impl LocalKeySigner {
    pub fn new(key: SigningKey) -> Self {
        Self { key }
    }

    pub fn from_slice(secret: &[u8]) -> Result<Self, k256::ecdsa::Error> {
        Ok(Self::new(SigningKey::from_slice(secret)?))
    }

    /// EOA address of the key.
    pub fn address(&self) -> Address {
        let point = self.key.verifying_key().to_encoded_point(false);
        let hash = keccak256_bytes(&point.as_bytes()[1..]);
        Address::from_slice(&hash[12..])
    }
}

#[async_trait]
impl DelegationSigner for LocalKeySigner {
    async fn sign_delegation(
        &self,
        _delegation: &abi::Delegation,
        digest: FixedBytes<32>,
    ) -> Result<Bytes, SignerRejection> {
        let (signature, recovery_id) = self
            .key
            .sign_prehash_recoverable(digest.as_slice())
            .map_err(|e| SignerRejection::new(format!("local key failed to sign: {e}")))?;

        let mut sig_bytes = Vec::with_capacity(65);
        sig_bytes.extend_from_slice(&signature.to_bytes());
        sig_bytes.push(27 + recovery_id.to_byte());
        Ok(sig_bytes.into())
    }
}
