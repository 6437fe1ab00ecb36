use alloy_primitives::{Address, U256};

/// Errors during submission decoding.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("calldata is not a redeemDelegations call")]
    NotRedeemDelegations,
    #[error("expected exactly one permission context, mode and execution")]
    UnsupportedBatch,
    #[error("permission context is not an encoded delegation chain")]
    MalformedPermissionContext,
    #[error("expected a single root delegation, got a chain of {0}")]
    UnsupportedChain(usize),
    #[error("execution calldata is truncated")]
    TruncatedExecution,
    #[error("caveat terms are malformed")]
    MalformedTerms,
}

/// Errors during validation/enforcement.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnforcementError {
    #[error("submission is not addressed to the delegation manager")]
    WrongManager,
    #[error("{0}")]
    Decode(#[from] DecodeError),
    #[error("unsupported execution mode")]
    UnsupportedMode,
    #[error("caller is not the delegate")]
    InvalidDelegate,
    #[error("delegation authority is not the root authority")]
    InvalidAuthority,
    #[error("delegator account {0} is not deployed")]
    UnknownDelegator(Address),
    #[error("invalid delegation signature")]
    InvalidSignature,
    #[error("unknown caveat enforcer {0}")]
    UnknownEnforcer(Address),
    #[error("delegation carries no period transfer caveat")]
    MissingPeriodCaveat,
    #[error("period transfer terms are invalid")]
    InvalidTerms,
    #[error("transfer has not started")]
    TransferNotStarted,
    #[error("native transfers must carry empty calldata")]
    CallDataNotAllowed,
    #[error("target {0} is not allowed")]
    TargetNotAllowed(Address),
    #[error("transfer amount exceeds period allowance: spent {spent}, requested {requested}, allowance {allowance}")]
    PeriodAllowanceExceeded {
        spent: U256,
        requested: U256,
        allowance: U256,
    },
    #[error("insufficient balance: {balance} available, {requested} requested")]
    InsufficientBalance { balance: U256, requested: U256 },
}
