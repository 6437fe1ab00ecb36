//! Shared utilities for the reference ledger.
//!
//! These helpers are small and deterministic, mirroring what the enforcers compute on-chain.

pub mod bytes;
pub mod crypto;
pub mod delegation_hash;
