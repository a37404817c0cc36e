//! Goal balance reconciliation.
//!
//! Balances and transaction validity are a derived view of the transaction
//! history. [`reconcile`] rebuilds that view from scratch for the current
//! snapshot, so any edit, deletion or out-of-order write converges on the
//! next pass instead of being repaired at edit time.

use std::collections::HashMap;

use uuid::Uuid;

use crate::{Money, SavingsGoal, Transaction};

/// Output of a reconciliation pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reconciliation {
    /// Every transaction, in input order, with validity recomputed.
    pub transactions: Vec<Transaction>,
    /// Every goal, in input order, with `current_amount` recomputed.
    pub goals: Vec<SavingsGoal>,
    /// `true` when at least one validity flag or reason changed. The whole
    /// transaction list is then written back.
    pub transactions_changed: bool,
    /// Only the goals whose balance moved.
    pub changed_goals: Vec<SavingsGoal>,
}

impl Reconciliation {
    /// `true` when the input was already consistent.
    pub fn is_clean(&self) -> bool {
        !self.transactions_changed && self.changed_goals.is_empty()
    }
}

/// Reason attached to a transaction whose recorded starting balance does not
/// match the balance rebuilt from its chain.
pub fn mismatch_reason(expected: Money, found: Money) -> String {
    format!("Historical mismatch. Expected {expected}, found {found}")
}

/// Recomputes every goal balance and every goal-linked transaction's
/// validity.
///
/// For each goal the linked transactions are walked by ascending `date`
/// starting from a zero balance. A transaction whose
/// `savings_meta.previous_amount` differs from the running balance is marked
/// invalid. Contributions add to the balance, withdrawals subtract, any other
/// category linked to a goal is neutral.
///
/// Transactions without a goal, or pointing at a goal that is not in `goals`,
/// are left untouched.
pub fn reconcile(transactions: &[Transaction], goals: &[SavingsGoal]) -> Reconciliation {
    let mut corrected = transactions.to_vec();

    // Lists are kept newest first; walking them backwards keeps transactions
    // sharing a date in the order they were recorded.
    let mut chains: HashMap<Uuid, Vec<usize>> =
        goals.iter().map(|goal| (goal.id, Vec::new())).collect();
    for (index, tx) in corrected.iter().enumerate().rev() {
        if let Some(goal_id) = tx.goal_id
            && let Some(chain) = chains.get_mut(&goal_id)
        {
            chain.push(index);
        }
    }

    let mut transactions_changed = false;
    let mut balances: HashMap<Uuid, Money> = HashMap::with_capacity(goals.len());

    for (goal_id, chain) in &mut chains {
        chain.sort_by_key(|&index| corrected[index].date);

        let mut running = Money::ZERO;
        for &index in chain.iter() {
            let tx = &mut corrected[index];
            let reason = tx
                .savings_meta
                .filter(|meta| meta.previous_amount != running)
                .map(|meta| mismatch_reason(running, meta.previous_amount));
            let is_valid = reason.is_none();

            if tx.is_valid != is_valid || tx.invalidation_reason != reason {
                transactions_changed = true;
                tx.is_valid = is_valid;
                tx.invalidation_reason = reason;
            }

            running += tx.goal_delta();
        }
        balances.insert(*goal_id, running);
    }

    let mut changed_goals = Vec::new();
    let goals = goals
        .iter()
        .map(|goal| {
            let balance = balances.get(&goal.id).copied().unwrap_or(Money::ZERO);
            if balance == goal.current_amount {
                return goal.clone();
            }
            let updated = SavingsGoal {
                current_amount: balance,
                ..goal.clone()
            };
            changed_goals.push(updated.clone());
            updated
        })
        .collect();

    Reconciliation {
        transactions: corrected,
        goals,
        transactions_changed,
        changed_goals,
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeZone, Utc};

    use super::*;
    use crate::{
        SAVINGS_CONTRIBUTION, SAVINGS_WITHDRAWAL, SavingsMeta, TransactionKind,
        transactions::insert_newest_first,
    };

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 2, day, 8, 30, 0).unwrap()
    }

    fn goal(name: &str, target: i64) -> SavingsGoal {
        SavingsGoal::new(name, Money::units(target), "🎯", at(1)).unwrap()
    }

    fn linked(
        goal: &SavingsGoal,
        category: &str,
        amount: i64,
        day: u32,
        previous: i64,
    ) -> Transaction {
        let kind = if category == SAVINGS_WITHDRAWAL {
            TransactionKind::Income
        } else {
            TransactionKind::Expense
        };
        let mut tx = Transaction::new(kind, category, Money::units(amount), at(day), "").unwrap();
        let delta = if category == SAVINGS_WITHDRAWAL {
            -amount
        } else {
            amount
        };
        tx.goal_id = Some(goal.id);
        tx.savings_meta = Some(SavingsMeta::new(
            Money::units(previous),
            Money::units(previous + delta),
        ));
        tx
    }

    fn ledger(txs: Vec<Transaction>) -> Vec<Transaction> {
        let mut list = Vec::new();
        for tx in txs {
            insert_newest_first(&mut list, tx);
        }
        list
    }

    #[test]
    fn rebuilds_balance_from_chain() {
        let car = goal("Car", 1000);
        let txs = ledger(vec![
            linked(&car, SAVINGS_CONTRIBUTION, 100, 2, 0),
            linked(&car, SAVINGS_CONTRIBUTION, 50, 3, 100),
            linked(&car, SAVINGS_WITHDRAWAL, 30, 4, 150),
        ]);

        let result = reconcile(&txs, std::slice::from_ref(&car));

        assert_eq!(result.goals[0].current_amount, Money::units(120));
        assert_eq!(result.changed_goals.len(), 1);
        assert!(!result.transactions_changed);
        assert!(result.transactions.iter().all(|tx| tx.is_valid));
    }

    #[test]
    fn deleting_an_early_contribution_invalidates_later_ones() {
        let car = goal("Car", 1000);
        let first = linked(&car, SAVINGS_CONTRIBUTION, 100, 2, 0);
        let second = linked(&car, SAVINGS_CONTRIBUTION, 50, 3, 100);
        let txs = ledger(vec![first.clone(), second.clone()]);
        let settled = reconcile(&txs, std::slice::from_ref(&car));

        let remaining: Vec<_> = settled
            .transactions
            .into_iter()
            .filter(|tx| tx.id != first.id)
            .collect();
        let result = reconcile(&remaining, &settled.goals);

        let tx = &result.transactions[0];
        assert!(!tx.is_valid);
        assert_eq!(
            tx.invalidation_reason.as_deref(),
            Some("Historical mismatch. Expected 0.00, found 100.00")
        );
        assert!(result.transactions_changed);
        assert_eq!(result.goals[0].current_amount, Money::units(50));
    }

    #[test]
    fn orders_chain_by_date_not_insertion() {
        let car = goal("Car", 1000);
        // Recorded late but dated first.
        let backdated = linked(&car, SAVINGS_CONTRIBUTION, 40, 2, 0);
        let later = linked(&car, SAVINGS_CONTRIBUTION, 10, 5, 40);
        let txs = vec![backdated, later];

        let result = reconcile(&txs, std::slice::from_ref(&car));

        assert!(result.transactions.iter().all(|tx| tx.is_valid));
        assert_eq!(result.goals[0].current_amount, Money::units(50));
    }

    #[test]
    fn second_pass_changes_nothing() {
        let car = goal("Car", 1000);
        let first = linked(&car, SAVINGS_CONTRIBUTION, 100, 2, 0);
        let drifted = linked(&car, SAVINGS_CONTRIBUTION, 50, 3, 70);
        let txs = ledger(vec![first, drifted]);

        let once = reconcile(&txs, std::slice::from_ref(&car));
        let twice = reconcile(&once.transactions, &once.goals);

        assert!(!once.is_clean());
        assert!(twice.is_clean());
        assert_eq!(once.transactions, twice.transactions);
        assert_eq!(once.goals, twice.goals);
    }

    #[test]
    fn goal_without_transactions_settles_at_zero() {
        let mut car = goal("Car", 1000);
        car.current_amount = Money::units(75);

        let result = reconcile(&[], std::slice::from_ref(&car));

        assert_eq!(result.goals[0].current_amount, Money::ZERO);
        assert_eq!(result.changed_goals[0].id, car.id);
    }

    #[test]
    fn only_changed_goals_are_reported() {
        let car = goal("Car", 1000);
        let mut trip = goal("Trip", 500);
        trip.current_amount = Money::units(20);
        let txs = ledger(vec![linked(&trip, SAVINGS_CONTRIBUTION, 20, 2, 0)]);

        let result = reconcile(&txs, &[car, trip.clone()]);

        assert!(result.changed_goals.is_empty());
        assert_eq!(result.goals[1], trip);
    }

    #[test]
    fn unlinked_and_foreign_transactions_are_ignored() {
        let car = goal("Car", 1000);
        let gone = goal("Gone", 10);
        let mut frozen = linked(&gone, SAVINGS_CONTRIBUTION, 5, 2, 999);
        frozen.goal_id = None;
        let orphan = linked(&gone, SAVINGS_CONTRIBUTION, 5, 3, 999);
        let plain =
            Transaction::new(TransactionKind::Expense, "Food", Money::units(9), at(4), "").unwrap();

        let result = reconcile(&[frozen, orphan, plain], std::slice::from_ref(&car));

        assert!(result.transactions.iter().all(|tx| tx.is_valid));
        assert!(!result.transactions_changed);
        assert_eq!(result.goals[0].current_amount, Money::ZERO);
    }

    #[test]
    fn other_categories_on_a_goal_are_neutral() {
        let car = goal("Car", 1000);
        let deposit = linked(&car, SAVINGS_CONTRIBUTION, 10, 2, 0);
        let mut odd = linked(&car, SAVINGS_CONTRIBUTION, 99, 3, 10);
        odd.category = "Food".to_string();
        let after = linked(&car, SAVINGS_CONTRIBUTION, 5, 4, 10);

        let result = reconcile(&ledger(vec![deposit, odd, after]), std::slice::from_ref(&car));

        assert!(result.transactions.iter().all(|tx| tx.is_valid));
        assert_eq!(result.goals[0].current_amount, Money::units(15));
    }

    #[test]
    fn oversized_chain_saturates_instead_of_panicking() {
        let car = goal("Car", 1000);
        let huge = Money::units(50_000_000_000_000_000);
        let mut txs = Vec::new();
        for (day, previous) in [(2, Money::ZERO), (3, huge)] {
            let mut tx = linked(&car, SAVINGS_CONTRIBUTION, 1, day, 0);
            tx.amount = huge;
            tx.savings_meta = Some(SavingsMeta::new(previous, previous + huge));
            txs.push(tx);
        }

        let result = reconcile(&ledger(txs), std::slice::from_ref(&car));

        assert_eq!(result.goals[0].current_amount, Money::new(i64::MAX));
        assert!(result.transactions.iter().all(|tx| tx.is_valid));
    }

    #[test]
    fn clears_stale_invalid_flag_once_chain_is_repaired() {
        let car = goal("Car", 1000);
        let mut tx = linked(&car, SAVINGS_CONTRIBUTION, 10, 2, 0);
        tx.is_valid = false;
        tx.invalidation_reason = Some(mismatch_reason(Money::ZERO, Money::units(3)));

        let result = reconcile(&[tx], std::slice::from_ref(&car));

        assert!(result.transactions_changed);
        assert!(result.transactions[0].is_valid);
        assert_eq!(result.transactions[0].invalidation_reason, None);
    }
}
