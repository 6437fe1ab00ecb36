use alloy_primitives::{Address, Bytes, FixedBytes};
use alloy_sol_types::{SolCall, SolValue};
use spend_card_types::{abi, Caveat, EnforcerKind, Environment, Execution, PERIOD_TRANSFER_TERMS_LEN};

use crate::{
    errors::{DecodeError, EnforcementError},
    utils::bytes::{read_address, read_u256_be, read_u64_word, read_vec},
};

/// A decoded single-delegation, single-execution redemption.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedRedemption {
    pub delegation: abi::Delegation,
    pub mode: FixedBytes<32>,
    pub execution: Execution,
}

/// Decode `redeemDelegations` calldata. Batches and delegation chains are not supported.
pub fn decode_redemption(calldata: &[u8]) -> Result<DecodedRedemption, DecodeError> {
    let call = abi::redeemDelegationsCall::abi_decode(calldata, true)
        .map_err(|_| DecodeError::NotRedeemDelegations)?;
    if call.permissionContexts.len() != 1
        || call.modes.len() != 1
        || call.executionCallDatas.len() != 1
    {
        return Err(DecodeError::UnsupportedBatch);
    }

    let mut chain = <Vec<abi::Delegation>>::abi_decode(&call.permissionContexts[0], true)
        .map_err(|_| DecodeError::MalformedPermissionContext)?;
    if chain.len() != 1 {
        return Err(DecodeError::UnsupportedChain(chain.len()));
    }
    let delegation = chain.remove(0);

    Ok(DecodedRedemption {
        delegation,
        mode: call.modes[0],
        execution: decode_execution(&call.executionCallDatas[0])?,
    })
}

/// Decode single-mode execution calldata: `target (20) || value (32) || callData`.
pub fn decode_execution(bytes: &[u8]) -> Result<Execution, DecodeError> {
    let mut i = 0usize;
    let target = read_address(bytes, &mut i).map_err(|_| DecodeError::TruncatedExecution)?;
    let value = read_u256_be(bytes, &mut i).map_err(|_| DecodeError::TruncatedExecution)?;
    let rest = bytes.len() - i;
    let call_data = read_vec(bytes, &mut i, rest).map_err(|_| DecodeError::TruncatedExecution)?;
    Ok(Execution {
        target,
        value,
        call_data: Bytes::from(call_data),
    })
}

/// Decode a caveat's terms according to its enforcer. `None` for enforcers this ledger does not know.
pub fn decode_caveat(
    caveat: &abi::Caveat,
    environment: &Environment,
) -> Result<Option<Caveat>, EnforcementError> {
    let Some(kind) = environment.enforcer_kind(caveat.enforcer) else {
        return Ok(None);
    };
    let terms = caveat.terms.as_ref();
    let decoded = match kind {
        EnforcerKind::NativeTokenPeriodTransfer => {
            if terms.len() != PERIOD_TRANSFER_TERMS_LEN {
                return Err(DecodeError::MalformedTerms.into());
            }
            let mut i = 0usize;
            let period_amount = read_u256_be(terms, &mut i).map_err(|_| DecodeError::MalformedTerms)?;
            // Out-of-range duration/start words cannot describe a usable period.
            let period_duration =
                read_u64_word(terms, &mut i).map_err(|_| EnforcementError::InvalidTerms)?;
            let start_date =
                read_u64_word(terms, &mut i).map_err(|_| EnforcementError::InvalidTerms)?;
            Caveat::NativeTokenPeriodTransfer {
                period_amount,
                period_duration,
                start_date,
            }
        }
        EnforcerKind::AllowedTargets => {
            if terms.is_empty() || terms.len() % 20 != 0 {
                return Err(DecodeError::MalformedTerms.into());
            }
            let mut i = 0usize;
            let mut targets = Vec::with_capacity(terms.len() / 20);
            while i < terms.len() {
                let target: Address =
                    read_address(terms, &mut i).map_err(|_| DecodeError::MalformedTerms)?;
                targets.push(target);
            }
            Caveat::AllowedTargets { targets }
        }
    };
    Ok(Some(decoded))
}

#[cfg(test)]
mod tests {
    use alloy_primitives::U256;

    use super::*;

    fn environment() -> Environment {
        Environment {
            chain_id: 1,
            delegation_manager: Address::repeat_byte(0xd0),
            native_token_period_transfer_enforcer: Address::repeat_byte(0xe1),
            allowed_targets_enforcer: Address::repeat_byte(0xe2),
        }
    }

    #[test]
    fn decodes_execution_with_and_without_calldata() {
        let mut bytes = Address::repeat_byte(0x11).to_vec();
        bytes.extend_from_slice(&U256::from(4u64).to_be_bytes::<32>());
        let plain = decode_execution(&bytes).unwrap();
        assert_eq!(plain.target, Address::repeat_byte(0x11));
        assert_eq!(plain.value, U256::from(4u64));
        assert!(plain.call_data.is_empty());

        bytes.extend_from_slice(&[0xde, 0xad]);
        assert_eq!(decode_execution(&bytes).unwrap().call_data.len(), 2);

        assert_eq!(
            decode_execution(&bytes[..40]),
            Err(DecodeError::TruncatedExecution)
        );
    }

    #[test]
    fn decodes_period_terms() {
        let mut terms = U256::from(10u64).to_be_bytes::<32>().to_vec();
        terms.extend_from_slice(&U256::from(60u64).to_be_bytes::<32>());
        terms.extend_from_slice(&U256::from(5u64).to_be_bytes::<32>());
        let caveat = abi::Caveat {
            enforcer: Address::repeat_byte(0xe1),
            terms: terms.into(),
            args: Bytes::new(),
        };
        assert_eq!(
            decode_caveat(&caveat, &environment()).unwrap(),
            Some(Caveat::NativeTokenPeriodTransfer {
                period_amount: U256::from(10u64),
                period_duration: 60,
                start_date: 5,
            })
        );
    }

    #[test]
    fn rejects_ragged_target_lists() {
        let caveat = abi::Caveat {
            enforcer: Address::repeat_byte(0xe2),
            terms: vec![1u8; 30].into(),
            args: Bytes::new(),
        };
        assert_eq!(
            decode_caveat(&caveat, &environment()),
            Err(EnforcementError::Decode(DecodeError::MalformedTerms))
        );
    }

    #[test]
    fn unknown_enforcer_is_not_decoded() {
        let caveat = abi::Caveat {
            enforcer: Address::repeat_byte(0x99),
            terms: Bytes::new(),
            args: Bytes::new(),
        };
        assert_eq!(decode_caveat(&caveat, &environment()), Ok(None));
    }

    #[test]
    fn garbage_is_not_a_redemption() {
        assert_eq!(
            decode_redemption(&[1, 2, 3]),
            Err(DecodeError::NotRedeemDelegations)
        );
    }
}
