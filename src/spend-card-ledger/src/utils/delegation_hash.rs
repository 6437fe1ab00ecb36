//! EIP-712 hashing of delegations.
//!
//! The delegator signs `delegation_digest`; the struct hash doubles as the delegation's identity
//! for per-period spend accounting.

use alloy_primitives::{keccak256, Address, FixedBytes, U256};
use spend_card_types::{abi, Environment};

fn address_word(address: Address) -> [u8; 32] {
    let mut padded = [0u8; 32];
    padded[12..32].copy_from_slice(address.as_slice());
    padded
}

/// `hashStruct(Delegation)`; the signature field is not part of the typed data.
pub fn delegation_hash(delegation: &abi::Delegation) -> FixedBytes<32> {
    // keccak256("Caveat(address enforcer,bytes terms)")
    let caveat_type_hash = keccak256(b"Caveat(address enforcer,bytes terms)");
    let mut caveats_buf = Vec::with_capacity(32 * delegation.caveats.len());
    for caveat in &delegation.caveats {
        let mut buf = Vec::with_capacity(32 * 3);
        buf.extend_from_slice(caveat_type_hash.as_slice());
        buf.extend_from_slice(&address_word(caveat.enforcer));
        buf.extend_from_slice(keccak256(&caveat.terms).as_slice());
        caveats_buf.extend_from_slice(keccak256(buf).as_slice());
    }
    // Array encoding: keccak256 of the concatenated element hashes.
    let caveats_hash = keccak256(caveats_buf);

    let delegation_type_hash = keccak256(
        b"Delegation(address delegate,address delegator,bytes32 authority,Caveat[] caveats,uint256 salt)Caveat(address enforcer,bytes terms)",
    );
    let mut struct_buf = Vec::with_capacity(32 * 6);
    struct_buf.extend_from_slice(delegation_type_hash.as_slice());
    struct_buf.extend_from_slice(&address_word(delegation.delegate));
    struct_buf.extend_from_slice(&address_word(delegation.delegator));
    struct_buf.extend_from_slice(delegation.authority.as_slice());
    struct_buf.extend_from_slice(caveats_hash.as_slice());
    struct_buf.extend_from_slice(&delegation.salt.to_be_bytes::<32>());
    keccak256(struct_buf)
}

/// Digest the delegator must have signed, under the `DelegationManager` domain.
pub fn delegation_digest(delegation: &abi::Delegation, environment: &Environment) -> FixedBytes<32> {
    // Domain type hash: keccak256("EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)")
    let domain_type_hash = keccak256(
        b"EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)",
    );
    let domain_name_hash = keccak256(b"DelegationManager");
    let domain_version_hash = keccak256(b"1");

    let mut domain_buf = Vec::with_capacity(32 * 5);
    domain_buf.extend_from_slice(domain_type_hash.as_slice());
    domain_buf.extend_from_slice(domain_name_hash.as_slice());
    domain_buf.extend_from_slice(domain_version_hash.as_slice());
    domain_buf.extend_from_slice(&U256::from(environment.chain_id).to_be_bytes::<32>());
    domain_buf.extend_from_slice(&address_word(environment.delegation_manager));
    let domain_separator = keccak256(domain_buf);

    // Final digest: keccak256("\x19\x01" || domainSeparator || structHash)
    let mut final_buf = Vec::with_capacity(2 + 32 + 32);
    final_buf.extend_from_slice(b"\x19\x01");
    final_buf.extend_from_slice(domain_separator.as_slice());
    final_buf.extend_from_slice(delegation_hash(delegation).as_slice());
    keccak256(final_buf)
}
