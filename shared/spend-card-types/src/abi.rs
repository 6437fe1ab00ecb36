//! Solidity ABI shapes of the delegation framework (`DelegationManager`).

use alloy_sol_types::sol;

sol! {
    #[derive(Debug, PartialEq, Eq)]
    struct Caveat {
        address enforcer;
        bytes terms;
        bytes args;
    }

    #[derive(Debug, PartialEq, Eq)]
    struct Delegation {
        address delegate;
        address delegator;
        bytes32 authority;
        Caveat[] caveats;
        uint256 salt;
        bytes signature;
    }

    /// Each context is `abi.encode(Delegation[])`; modes and executions pair up by index.
    function redeemDelegations(
        bytes[] permissionContexts,
        bytes32[] modes,
        bytes[] executionCallDatas
    ) external;
}
