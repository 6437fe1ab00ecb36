//! Reference execution ledger.
//!
//! Mirrors what the on-chain delegation manager and its caveat enforcers do for a periodic
//! native-token delegation:
//! - the delegate (and only the delegate) submits `redeemDelegations`;
//! - the delegator account's owner must have signed the delegation's EIP-712 digest;
//! - every caveat is evaluated by enforcer address, unknown enforcers fail closed;
//! - spend is accumulated per (delegation hash, period) and never exceeds the period amount;
//! - check, accounting and transfer happen atomically.

pub mod decoder;
pub mod errors;
pub mod evaluator;
pub mod ledger;
pub mod utils;

pub use errors::{DecodeError, EnforcementError};
pub use ledger::ReferenceLedger;
