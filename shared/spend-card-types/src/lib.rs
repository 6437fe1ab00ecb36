//! Shared types for spend cards: accounts, scopes, capabilities, period arithmetic and the
//! execution ledger interface.
//!
//! Both the off-chain engine (issuance, storage, redemption) and the ledger side (enforcement)
//! build on these definitions, so the period window computed at issuance preview, at local
//! redemption checks and at enforcement is always the same computation.

pub mod abi;
pub mod account;
pub mod capability;
pub mod caveats;
pub mod ledger;
pub mod period;
pub mod scope;

pub use account::{AccountParseError, AccountRef};
pub use capability::{Capability, Environment, SignedCapability, ROOT_AUTHORITY};
pub use caveats::{Caveat, EnforcerKind, PERIOD_TRANSFER_TERMS_LEN};
pub use ledger::{Execution, ExecutionLedger, LedgerReceipt, LedgerRejection, RedemptionSubmission};
pub use period::{current_period, PeriodError, PeriodWindow};
pub use scope::{build_scope, parse_amount, unix_now, ScopeError, SpendingScope};
