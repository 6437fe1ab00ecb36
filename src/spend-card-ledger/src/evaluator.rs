use alloy_primitives::U256;
use spend_card_types::{
    abi, current_period, Caveat, Environment, Execution, PeriodWindow, SpendingScope,
};

use crate::{decoder::decode_caveat, errors::EnforcementError};

/// Charge a redemption would make against its delegation's period allowance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PeriodCharge {
    pub window: PeriodWindow,
    /// Cumulative spend in `window` once this redemption commits.
    pub spent_after: U256,
}

/// Evaluate every caveat of `delegation` against `execution` at instant `now`.
///
/// `spent_in` reports what this delegation has already spent in a given period index. Evaluation
/// is pure; committing the charge is the caller's job and must happen under the same lock the
/// spend was read under.
pub fn evaluate_caveats<F>(
    delegation: &abi::Delegation,
    execution: &Execution,
    environment: &Environment,
    now: u64,
    spent_in: F,
) -> Result<PeriodCharge, EnforcementError>
where
    F: Fn(u64) -> U256,
{
    let mut charge = None;
    for caveat in &delegation.caveats {
        let decoded = decode_caveat(caveat, environment)?
            .ok_or(EnforcementError::UnknownEnforcer(caveat.enforcer))?;
        match decoded {
            Caveat::NativeTokenPeriodTransfer {
                period_amount,
                period_duration,
                start_date,
            } => {
                if charge.is_some() {
                    return Err(EnforcementError::InvalidTerms);
                }
                let scope = SpendingScope::new(period_amount, period_duration, start_date, [])
                    .map_err(|_| EnforcementError::InvalidTerms)?;
                let window = current_period(&scope, now)
                    .map_err(|_| EnforcementError::TransferNotStarted)?;
                if !execution.call_data.is_empty() {
                    return Err(EnforcementError::CallDataNotAllowed);
                }
                let spent = spent_in(window.index);
                let exceeded = EnforcementError::PeriodAllowanceExceeded {
                    spent,
                    requested: execution.value,
                    allowance: window.allowance,
                };
                let spent_after = spent.checked_add(execution.value).ok_or(exceeded.clone())?;
                if spent_after > window.allowance {
                    return Err(exceeded);
                }
                charge = Some(PeriodCharge {
                    window,
                    spent_after,
                });
            }
            Caveat::AllowedTargets { targets } => {
                if !targets.contains(&execution.target) {
                    return Err(EnforcementError::TargetNotAllowed(execution.target));
                }
            }
        }
    }
    charge.ok_or(EnforcementError::MissingPeriodCaveat)
}
