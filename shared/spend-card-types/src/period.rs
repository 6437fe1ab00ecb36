//! Period allowance arithmetic.
//!
//! Pure over the scope definition: it never looks at how much has been spent. The ceiling it
//! returns is the same whether asked by an issuance preview, a local redemption check or the
//! ledger's enforcement.

use alloy_primitives::U256;

use crate::scope::SpendingScope;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PeriodError {
    #[error("scope is not active until {start_date} (evaluated at {at})")]
    NotYetActive { start_date: u64, at: u64 },
}

/// The period window containing an instant, with its ceiling allowance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PeriodWindow {
    pub index: u64,
    pub start: u64,
    /// Exclusive, unless saturated at `u64::MAX`.
    pub end: u64,
    pub allowance: U256,
}

impl PeriodWindow {
    /// `end` is exclusive, except when it saturated at `u64::MAX`: that window runs to the end of
    /// time and contains `u64::MAX` itself.
    pub fn contains(&self, at: u64) -> bool {
        self.start <= at && (at < self.end || self.end == u64::MAX)
    }
}

/// Compute the period window for `scope` at instant `at`.
pub fn current_period(scope: &SpendingScope, at: u64) -> Result<PeriodWindow, PeriodError> {
    let start_date = scope.start_date();
    if at < start_date {
        return Err(PeriodError::NotYetActive { start_date, at });
    }
    let duration = scope.period_duration();
    let index = (at - start_date) / duration;
    // index * duration <= elapsed, so start <= at and cannot overflow.
    let start = start_date + index * duration;
    Ok(PeriodWindow {
        index,
        start,
        end: start.saturating_add(duration),
        allowance: scope.period_amount(),
    })
}
