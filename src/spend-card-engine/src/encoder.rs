use alloy_primitives::{Address, Bytes, FixedBytes, B256, U256};
use alloy_sol_types::{SolCall, SolValue};
use sha3::{Digest, Keccak256};

use spend_card_types::{
    abi, Capability, Caveat, Environment, Execution, RedemptionSubmission, SignedCapability,
    PERIOD_TRANSFER_TERMS_LEN, ROOT_AUTHORITY,
};

/// Single call, revert on failure (ERC-7579 `CALLTYPE_SINGLE` / `EXECTYPE_DEFAULT`).
pub const MODE_SINGLE_DEFAULT: B256 = B256::ZERO;

/// Encode the terms of a caveat.
pub fn encode_terms(caveat: &Caveat) -> Vec<u8> {
    match caveat {
        Caveat::NativeTokenPeriodTransfer {
            period_amount,
            period_duration,
            start_date,
        } => {
            let mut buf = Vec::with_capacity(PERIOD_TRANSFER_TERMS_LEN);
            buf.extend_from_slice(&period_amount.to_be_bytes::<32>());
            buf.extend_from_slice(&U256::from(*period_duration).to_be_bytes::<32>());
            buf.extend_from_slice(&U256::from(*start_date).to_be_bytes::<32>());
            buf
        }
        Caveat::AllowedTargets { targets } => {
            let mut buf = Vec::with_capacity(20 * targets.len());
            for target in targets {
                buf.extend_from_slice(target.as_slice());
            }
            buf
        }
    }
}

/// Wire caveats for a capability under an environment.
pub fn wire_caveats(capability: &Capability, environment: &Environment) -> Vec<abi::Caveat> {
    capability
        .caveats()
        .iter()
        .map(|caveat| abi::Caveat {
            enforcer: environment.enforcer_address(caveat.kind()),
            terms: encode_terms(caveat).into(),
            args: Bytes::new(),
        })
        .collect()
}

/// Wire delegation for a capability carrying `signature` (empty while unsigned).
pub fn wire_delegation(
    capability: &Capability,
    environment: &Environment,
    signature: Bytes,
) -> abi::Delegation {
    abi::Delegation {
        delegate: capability.delegatee().address(),
        delegator: capability.delegator().address(),
        authority: ROOT_AUTHORITY,
        caveats: wire_caveats(capability, environment),
        salt: capability.salt(),
        signature,
    }
}

pub(crate) fn keccak256_bytes(bytes: &[u8]) -> FixedBytes<32> {
    let mut h = Keccak256::new();
    h.update(bytes);
    FixedBytes::from_slice(&h.finalize())
}

fn address_word(address: Address) -> [u8; 32] {
    let mut padded = [0u8; 32];
    padded[12..32].copy_from_slice(address.as_slice());
    padded
}

/// EIP-712 struct hash of a delegation (the delegation hash the ledger tracks spend under).
pub fn delegation_struct_hash(delegation: &abi::Delegation) -> FixedBytes<32> {
    let caveat_type_hash = keccak256_bytes(b"Caveat(address enforcer,bytes terms)");
    let mut caveats_buf = Vec::with_capacity(32 * delegation.caveats.len());
    for caveat in &delegation.caveats {
        let mut buf = Vec::with_capacity(32 * 3);
        buf.extend_from_slice(caveat_type_hash.as_slice());
        buf.extend_from_slice(&address_word(caveat.enforcer));
        buf.extend_from_slice(keccak256_bytes(&caveat.terms).as_slice());
        caveats_buf.extend_from_slice(keccak256_bytes(&buf).as_slice());
    }
    let caveats_hash = keccak256_bytes(&caveats_buf);

    let delegation_type_hash = keccak256_bytes(
        b"Delegation(address delegate,address delegator,bytes32 authority,Caveat[] caveats,uint256 salt)Caveat(address enforcer,bytes terms)",
    );
    let mut struct_buf = Vec::with_capacity(32 * 6);
    struct_buf.extend_from_slice(delegation_type_hash.as_slice());
    struct_buf.extend_from_slice(&address_word(delegation.delegate));
    struct_buf.extend_from_slice(&address_word(delegation.delegator));
    struct_buf.extend_from_slice(delegation.authority.as_slice());
    struct_buf.extend_from_slice(caveats_hash.as_slice());
    struct_buf.extend_from_slice(&delegation.salt.to_be_bytes::<32>());
    keccak256_bytes(&struct_buf)
}

/// Compute the delegation EIP-712 digest (must match the ledger's `delegation_digest`).
pub fn delegation_digest(delegation: &abi::Delegation, environment: &Environment) -> FixedBytes<32> {
    let domain_type_hash = keccak256_bytes(
        b"EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)",
    );
    let domain_name_hash = keccak256_bytes(b"DelegationManager");
    let domain_version_hash = keccak256_bytes(b"1");

    let mut domain_buf = Vec::with_capacity(32 * 5);
    domain_buf.extend_from_slice(domain_type_hash.as_slice());
    domain_buf.extend_from_slice(domain_name_hash.as_slice());
    domain_buf.extend_from_slice(domain_version_hash.as_slice());
    domain_buf.extend_from_slice(&U256::from(environment.chain_id).to_be_bytes::<32>());
    domain_buf.extend_from_slice(&address_word(environment.delegation_manager));
    let domain_separator = keccak256_bytes(&domain_buf);

    let struct_hash = delegation_struct_hash(delegation);

    let mut final_buf = Vec::with_capacity(2 + 32 + 32);
    final_buf.extend_from_slice(b"\x19\x01");
    final_buf.extend_from_slice(domain_separator.as_slice());
    final_buf.extend_from_slice(struct_hash.as_slice());
    keccak256_bytes(&final_buf)
}

/// Single-mode execution calldata: `target (20) || value (32) || callData`.
pub fn encode_execution(execution: &Execution) -> Vec<u8> {
    let mut buf = Vec::with_capacity(20 + 32 + execution.call_data.len());
    buf.extend_from_slice(execution.target.as_slice());
    buf.extend_from_slice(&execution.value.to_be_bytes::<32>());
    buf.extend_from_slice(&execution.call_data);
    buf
}

/// Encode the `redeemDelegations` call redeeming `capability` for a single execution.
pub fn encode_redeem_calldata(
    capability: &SignedCapability,
    execution: &Execution,
    environment: &Environment,
) -> Vec<u8> {
    let delegation = wire_delegation(
        capability.capability(),
        environment,
        capability.signature().clone(),
    );
    let permission_context = vec![delegation].abi_encode();
    abi::redeemDelegationsCall {
        permissionContexts: vec![permission_context.into()],
        modes: vec![MODE_SINGLE_DEFAULT],
        executionCallDatas: vec![encode_execution(execution).into()],
    }
    .abi_encode()
}

/// Build the transaction the delegatee submits to the delegation manager.
pub fn redemption_submission(
    capability: &SignedCapability,
    execution: &Execution,
    environment: &Environment,
) -> RedemptionSubmission {
    RedemptionSubmission {
        sender: capability.delegatee().address(),
        to: environment.delegation_manager,
        calldata: encode_redeem_calldata(capability, execution, environment).into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spend_card_types::{build_scope, AccountRef};

    fn environment() -> Environment {
        Environment {
            chain_id: 11_155_111,
            delegation_manager: Address::repeat_byte(0xd0),
            native_token_period_transfer_enforcer: Address::repeat_byte(0xe1),
            allowed_targets_enforcer: Address::repeat_byte(0xe2),
        }
    }

    fn capability(allow: &[u8]) -> Capability {
        let scope = build_scope(U256::from(1_000u64), 86_400, Some(1_700_000_000))
            .unwrap()
            .with_allow_list(allow.iter().map(|b| AccountRef::new(Address::repeat_byte(*b))));
        Capability::new(
            AccountRef::new(Address::repeat_byte(0xaa)),
            AccountRef::new(Address::repeat_byte(0xbb)),
            scope,
            U256::from(42u64),
        )
    }

    #[test]
    fn keccak_matches_known_vectors() {
        assert_eq!(
            keccak256_bytes(b""),
            "0xc5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
                .parse::<FixedBytes<32>>()
                .unwrap()
        );
        assert_eq!(
            keccak256_bytes(b"DelegationManager"),
            alloy_primitives::keccak256(b"DelegationManager")
        );
    }

    #[test]
    fn period_terms_are_three_words() {
        let terms = encode_terms(&Caveat::NativeTokenPeriodTransfer {
            period_amount: U256::from(5u64),
            period_duration: 60,
            start_date: 7,
        });
        assert_eq!(terms.len(), PERIOD_TRANSFER_TERMS_LEN);
        assert_eq!(terms[31], 5);
        assert_eq!(terms[63], 60);
        assert_eq!(terms[95], 7);
    }

    #[test]
    fn wire_delegation_uses_environment_enforcers() {
        let env = environment();
        let delegation = wire_delegation(&capability(&[0x01, 0x02]), &env, Bytes::new());
        assert_eq!(delegation.authority, ROOT_AUTHORITY);
        assert_eq!(delegation.delegate, Address::repeat_byte(0xbb));
        assert_eq!(delegation.caveats.len(), 2);
        assert_eq!(delegation.caveats[0].enforcer, Address::repeat_byte(0xe1));
        assert_eq!(delegation.caveats[1].enforcer, Address::repeat_byte(0xe2));
        assert_eq!(delegation.caveats[1].terms.len(), 40);
    }

    #[test]
    fn digest_ignores_signature_but_binds_scope_and_domain() {
        let env = environment();
        let unsigned = wire_delegation(&capability(&[]), &env, Bytes::new());
        let signed = wire_delegation(&capability(&[]), &env, Bytes::from(vec![1u8; 65]));
        assert_eq!(
            delegation_digest(&unsigned, &env),
            delegation_digest(&signed, &env)
        );

        let restricted = wire_delegation(&capability(&[0x01]), &env, Bytes::new());
        assert_ne!(
            delegation_digest(&unsigned, &env),
            delegation_digest(&restricted, &env)
        );

        let other_chain = Environment {
            chain_id: 1,
            ..env.clone()
        };
        assert_ne!(
            delegation_digest(&unsigned, &env),
            delegation_digest(&unsigned, &other_chain)
        );
    }

    #[test]
    fn execution_is_packed() {
        let encoded = encode_execution(&Execution {
            target: Address::repeat_byte(0x11),
            value: U256::from(3u64),
            call_data: Bytes::new(),
        });
        assert_eq!(encoded.len(), 52);
        assert_eq!(&encoded[..20], Address::repeat_byte(0x11).as_slice());
        assert_eq!(encoded[51], 3);
    }

    #[test]
    fn redeem_calldata_starts_with_selector() {
        let env = environment();
        let signed = SignedCapability::new(capability(&[]), Bytes::from(vec![0u8; 65]));
        let execution = Execution {
            target: Address::repeat_byte(0x11),
            value: U256::from(3u64),
            call_data: Bytes::new(),
        };
        let submission = redemption_submission(&signed, &execution, &env);
        assert_eq!(submission.to, env.delegation_manager);
        assert_eq!(submission.sender, Address::repeat_byte(0xbb));
        assert_eq!(
            &submission.calldata[..4],
            abi::redeemDelegationsCall::SELECTOR.as_slice()
        );
    }
}
