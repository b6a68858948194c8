use serde::Serialize;

use crate::balance::{BalanceMapping, EPSILON};
use crate::schemas::MemberId;

/// One computed transfer that moves real money from a debtor to a creditor.
/// Never persisted; recomputed from the balances that produced it.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SettlementTransaction {
    pub from: MemberId,
    pub to: MemberId,
    pub amount: f64,
}

/// Greedy two-pointer reduction of the debt graph.
///
/// Members within [`EPSILON`] of zero are already settled and skipped. Each
/// step pairs the current debtor with the current creditor for
/// `min(|debtor|, creditor)` and advances whichever side reaches zero. Not
/// provably minimal in transaction count for every input, but minimal for the
/// common fan shapes and O(n) over the mapping.
///
/// If the mapping itself does not sum to zero, one side is left with a
/// residual once the other is exhausted; no transaction is emitted for it.
pub fn simplify_debts(balances: &BalanceMapping) -> Vec<SettlementTransaction> {
    let mut debtors = Vec::new();
    let mut creditors = Vec::new();
    for (member, &balance) in balances {
        if balance < -EPSILON {
            debtors.push((member, balance));
        } else if balance > EPSILON {
            creditors.push((member, balance));
        }
    }

    let mut transactions = Vec::new();
    let mut i = 0;
    let mut j = 0;
    while i < debtors.len() && j < creditors.len() {
        let amount = debtors[i].1.abs().min(creditors[j].1);
        transactions.push(SettlementTransaction {
            from: debtors[i].0.clone(),
            to: creditors[j].0.clone(),
            amount,
        });
        debtors[i].1 += amount;
        creditors[j].1 -= amount;
        if debtors[i].1.abs() < EPSILON {
            i += 1;
        }
        if creditors[j].1 < EPSILON {
            j += 1;
        }
    }
    transactions
}
