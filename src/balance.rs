use std::collections::BTreeMap;

use crate::schemas::{ExpenseRecord, Group, MemberId, RecordKind, Split};

/// Net position per member: positive means owed money, negative means owing.
/// BTreeMap keeps iteration deterministic for the simplifier and for tests.
pub type BalanceMapping = BTreeMap<MemberId, f64>;

/// Tolerance for drift left over from f64 division of equal splits.
pub const EPSILON: f64 = 0.01;

/// Non-finite values coming out of historical records count as zero so a
/// single bad record never poisons the whole aggregation.
pub fn sanitized(amount: f64) -> f64 {
    if amount.is_finite() {
        amount
    } else {
        0.0
    }
}

fn apply(balances: &mut BalanceMapping, member: &MemberId, delta: f64) {
    balances
        .entry(member.clone())
        .and_modify(|balance| *balance += delta)
        .or_insert(delta);
}

/// Folds a group's expense history into a [`BalanceMapping`].
///
/// Every current group member starts at zero; payers, payees and split
/// participants found in the records are added as they appear, so members who
/// left the group but still show up in history keep a balance. Record order
/// does not matter.
///
/// Equal splits divide by the *current* group size. Historical group-size
/// changes are not reconstructed; this is a documented approximation.
pub fn aggregate_balances(records: &[ExpenseRecord], group: &Group) -> BalanceMapping {
    let mut balances: BalanceMapping = group
        .members
        .iter()
        .map(|member| (member.clone(), 0.0))
        .collect();

    for record in records {
        let amount = sanitized(record.amount);
        match &record.kind {
            RecordKind::Settlement { paid_to } => {
                apply(&mut balances, &record.paid_by, amount);
                apply(&mut balances, paid_to, -amount);
            }
            RecordKind::Expense { split } => {
                apply(&mut balances, &record.paid_by, amount);
                match split {
                    Split::Equal => {
                        if !group.members.is_empty() {
                            let share = amount / group.members.len() as f64;
                            for member in &group.members {
                                apply(&mut balances, member, -share);
                            }
                        }
                    }
                    Split::Explicit { shares } => {
                        for (member, share) in shares {
                            apply(&mut balances, member, -sanitized(*share));
                        }
                    }
                }
            }
        }
    }

    balances
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{assert_close, expense, group, settlement, shares};

    #[test]
    fn equal_split_three_way() {
        let group = group(&["A", "B", "C"]);
        let records = vec![expense("A", 300.0, Split::Equal)];
        let balances = aggregate_balances(&records, &group);
        assert_close(balances["A"], 200.0);
        assert_close(balances["B"], -100.0);
        assert_close(balances["C"], -100.0);
    }

    #[test]
    fn explicit_split_only_debits_listed_members() {
        let group = group(&["A", "B", "C"]);
        let records = vec![expense("A", 100.0, shares(&[("A", 20.0), ("B", 80.0)]))];
        let balances = aggregate_balances(&records, &group);
        assert_close(balances["A"], 80.0);
        assert_close(balances["B"], -80.0);
        assert_close(balances["C"], 0.0);
    }

    #[test]
    fn settlement_credits_payer_debits_payee() {
        // A hands B 50 in cash: A is owed it back, B owes it.
        let group = group(&["A", "B"]);
        let records = vec![settlement("A", "B", 50.0)];
        let balances = aggregate_balances(&records, &group);
        assert_close(balances["A"], 50.0);
        assert_close(balances["B"], -50.0);
    }

    #[test]
    fn members_without_records_still_get_a_zero_entry() {
        let group = group(&["A", "B", "C"]);
        let balances = aggregate_balances(&[], &group);
        assert_eq!(balances.len(), 3);
        assert!(balances.values().all(|b| *b == 0.0));
    }

    #[test]
    fn departed_members_in_history_are_kept() {
        // "D" left the group but is still the payer of an old expense.
        let group = group(&["A", "B"]);
        let records = vec![expense("D", 60.0, shares(&[("A", 30.0), ("B", 30.0)]))];
        let balances = aggregate_balances(&records, &group);
        assert_close(balances["D"], 60.0);
        assert_close(balances["A"], -30.0);
        assert_close(balances["B"], -30.0);
    }

    #[test]
    fn balances_sum_to_zero() {
        let group = group(&["A", "B", "C", "D"]);
        let records = vec![
            expense("A", 120.5, Split::Equal),
            expense("B", 99.99, Split::Equal),
            expense("C", 45.0, shares(&[("A", 15.0), ("B", 15.0), ("D", 15.0)])),
            settlement("D", "A", 20.0),
            settlement("B", "C", 12.34),
        ];
        let balances = aggregate_balances(&records, &group);
        let total: f64 = balances.values().sum();
        assert!(total.abs() < EPSILON, "drift {total}");
    }

    #[test]
    fn aggregation_is_idempotent() {
        let group = group(&["A", "B", "C"]);
        let records = vec![
            expense("A", 75.0, Split::Equal),
            settlement("B", "A", 25.0),
        ];
        let first = aggregate_balances(&records, &group);
        let second = aggregate_balances(&records, &group);
        assert_eq!(first, second);
    }

    #[test]
    fn record_order_does_not_change_the_mapping() {
        use rand::rngs::StdRng;
        use rand::seq::SliceRandom;
        use rand::SeedableRng;

        let group = group(&["A", "B", "C"]);
        let records = vec![
            expense("A", 90.0, Split::Equal),
            expense("B", 45.0, shares(&[("A", 20.0), ("C", 25.0)])),
            settlement("C", "A", 10.0),
            expense("C", 33.0, Split::Equal),
            settlement("A", "B", 5.5),
        ];
        let baseline = aggregate_balances(&records, &group);

        for seed in 0..16 {
            let mut shuffled = records.clone();
            shuffled.shuffle(&mut StdRng::seed_from_u64(seed));
            let balances = aggregate_balances(&shuffled, &group);
            for (member, balance) in &baseline {
                assert_close(balances[member], *balance);
            }
        }
    }

    #[test]
    fn non_finite_amounts_contribute_nothing() {
        let group = group(&["A", "B"]);
        let records = vec![
            expense("A", f64::NAN, Split::Equal),
            expense("A", f64::INFINITY, shares(&[("B", f64::INFINITY)])),
            expense("A", 40.0, Split::Equal),
        ];
        let balances = aggregate_balances(&records, &group);
        assert_close(balances["A"], 20.0);
        assert_close(balances["B"], -20.0);
    }

    #[test]
    fn equal_split_with_no_members_debits_nobody() {
        let group = group(&[]);
        let records = vec![expense("A", 30.0, Split::Equal)];
        let balances = aggregate_balances(&records, &group);
        assert_close(balances["A"], 30.0);
    }
}
