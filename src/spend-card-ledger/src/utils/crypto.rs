//! Signature recovery.
//!
//! Purpose: check that the delegation's digest was signed by the owner of the delegator account,
//! the off-chain counterpart of the account's ERC-1271 check.

use alloy_primitives::{keccak256, Address, FixedBytes};
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;

/// Recover an EOA address from a 32-byte digest and a 65-byte ECDSA signature.
///
/// Accepts v in {0, 1, 27, 28}.
pub fn recover_address(digest: FixedBytes<32>, sig: &[u8]) -> Result<Address, ()> {
    if sig.len() != 65 {
        return Err(());
    }
    let v = match sig[64] {
        27 | 28 => sig[64] - 27,
        0 | 1 => sig[64],
        _ => return Err(()),
    };
    let recovery_id = RecoveryId::from_byte(v).ok_or(())?;
    let signature = Signature::from_slice(&sig[..64]).map_err(|_| ())?;
    let key = VerifyingKey::recover_from_prehash(digest.as_slice(), &signature, recovery_id)
        .map_err(|_| ())?;
    Ok(address_of(&key))
}

pub fn address_of(key: &VerifyingKey) -> Address {
    let point = key.to_encoded_point(false);
    let hash = keccak256(&point.as_bytes()[1..]);
    Address::from_slice(&hash[12..])
}
