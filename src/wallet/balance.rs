use crate::currency::{Amount, Unit};
use crate::transfer::{Transfer, TransferDirection, TransferState};
use tracing::warn;

fn counts(state: &TransferState) -> bool {
    matches!(state, TransferState::Submitted | TransferState::Pending | TransferState::Included(_))
}

/// Signed effect of `transfer` on a balance in `unit`. With `with_amount`
/// unset only the fee counts. `None` on overflow.
fn contribution(unit: &Unit, transfer: &Transfer, with_amount: bool) -> Option<Amount> {
    let zero = Amount::zero(unit);
    let amount = match (with_amount, transfer.direction()) {
        (true, TransferDirection::Received) => transfer.amount().clone(),
        (true, TransferDirection::Sent) => transfer.amount().negate(),
        _ => zero,
    };
    if transfer.direction() == TransferDirection::Received {
        return Some(amount);
    }
    match transfer.fee().filter(|fee| fee.unit().is_compatible(unit)) {
        Some(fee) => amount.sub(&fee),
        None => Some(amount),
    }
}

/// Sum of `transfers` in `unit`, net of fees paid in the same currency.
/// `fee_payers` are transfers of other currencies whose fee is charged here.
pub(super) fn compute(unit: &Unit, transfers: &[Transfer], fee_payers: &[Transfer]) -> Amount {
    let own = transfers.iter().filter(|t| t.amount().unit().is_compatible(unit)).map(|t| (t, true));
    let paid = fee_payers.iter().filter(|t| !t.amount().unit().is_compatible(unit)).map(|t| (t, false));

    let mut balance = Amount::zero(unit);
    for (transfer, with_amount) in own.chain(paid) {
        if !counts(&transfer.state()) {
            continue;
        }
        match contribution(unit, transfer, with_amount).and_then(|delta| balance.add(&delta)) {
            Some(next) => balance = next,
            None => warn!(transfer = %transfer.id(), "balance overflow; transfer not counted"),
        }
    }
    balance
}
