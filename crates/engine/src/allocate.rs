//! Contribution and withdrawal planning.
//!
//! The allocator turns a [`PendingTransaction`] and a goal selection into the
//! concrete goal-linked transactions to post, plus the goal copies they
//! affect. It never touches a store: the session applies the plan and the
//! reconciler confirms it.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    Currency, EngineError, Money, NewGoal, PendingTransaction, ResultEngine, SAVINGS_CONTRIBUTION,
    SAVINGS_WITHDRAWAL, SavingsGoal, SavingsMeta, Transaction, TransactionKind, goals, util,
};

/// Plan produced by the allocator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Allocation {
    /// New transactions, every one linked to a goal and carrying a balance
    /// snapshot.
    pub transactions: Vec<Transaction>,
    /// Updated copies of the affected goals, with their projected balances.
    /// A goal created by the plan is included here.
    pub goals: Vec<SavingsGoal>,
    /// The selected goal went from below its target to at or above it.
    pub completed: bool,
}

fn linked(
    kind: TransactionKind,
    category: &str,
    amount: Money,
    date: DateTime<Utc>,
    description: &str,
    goal: &SavingsGoal,
    current: Money,
) -> ResultEngine<Transaction> {
    let mut tx = Transaction::new(kind, category, amount, date, description)?;
    tx.goal_id = Some(goal.id);
    tx.savings_meta = Some(SavingsMeta::new(goal.current_amount, current));
    Ok(tx)
}

fn find_open_goal(goals: &[SavingsGoal], goal_id: Uuid) -> ResultEngine<&SavingsGoal> {
    let goal = goals
        .iter()
        .find(|goal| goal.id == goal_id)
        .ok_or_else(|| EngineError::KeyNotFound(goal_id.to_string()))?;
    if goal.is_archived {
        return Err(EngineError::GoalArchived(goal.name.clone()));
    }
    Ok(goal)
}

/// Contributes `pending` to an existing goal.
///
/// A targeted goal only takes what it still needs; the excess is posted to
/// General Savings as a separate spillover transaction and both goals get a
/// notification. General Savings itself never splits.
pub fn contribute(
    pending: &PendingTransaction,
    goal_id: Uuid,
    goals: &[SavingsGoal],
    currency: Currency,
) -> ResultEngine<Allocation> {
    util::ensure_positive(pending.amount)?;
    let goal = find_open_goal(goals, goal_id)?;
    let amount = pending.amount;

    match goal.room() {
        Some(room) if amount > room => split(pending, goal, room.max(Money::ZERO), goals, currency),
        _ => {
            let description = match pending.note() {
                Some(note) => format!("{note} (Goal: {})", goal.name),
                None => format!("Contribution to savings goal: \"{}\"", goal.name),
            };
            let current = goal.current_amount + amount;
            let tx = linked(
                TransactionKind::Expense,
                SAVINGS_CONTRIBUTION,
                amount,
                pending.date,
                &description,
                goal,
                current,
            )?;
            let completed = !goal.is_complete() && goal.target().is_some_and(|t| current >= t);
            Ok(Allocation {
                transactions: vec![tx],
                goals: vec![SavingsGoal {
                    current_amount: current,
                    ..goal.clone()
                }],
                completed,
            })
        }
    }
}

fn split(
    pending: &PendingTransaction,
    goal: &SavingsGoal,
    room: Money,
    goals: &[SavingsGoal],
    currency: Currency,
) -> ResultEngine<Allocation> {
    let spill = pending.amount - room;
    let general = if spill.is_positive() {
        Some(
            goals
                .iter()
                .find(|goal| goal.is_unbounded())
                .ok_or(EngineError::MissingGeneralSavings)?,
        )
    } else {
        None
    };

    let mut transactions = Vec::with_capacity(2);
    let mut updated = goal.clone();

    if room.is_positive() {
        let description = format!("Final contribution to complete: \"{}\"", goal.name);
        updated.current_amount = goal.current_amount + room;
        transactions.push(linked(
            TransactionKind::Expense,
            SAVINGS_CONTRIBUTION,
            room,
            pending.date,
            &description,
            goal,
            updated.current_amount,
        )?);
    }
    updated.unread_notification_message = Some(format!(
        "Excess of {} transferred to General Savings.",
        currency.format(spill)
    ));

    let mut affected = vec![updated];

    if let Some(general) = general {
        let description = format!("Spillover from \"{}\" to General Savings", goal.name);
        let current = general.current_amount + spill;
        transactions.push(linked(
            TransactionKind::Expense,
            SAVINGS_CONTRIBUTION,
            spill,
            pending.date,
            &description,
            general,
            current,
        )?);
        affected.push(SavingsGoal {
            current_amount: current,
            unread_notification_message: Some(format!(
                "Received {} spillover from \"{}\".",
                currency.format(spill),
                goal.name
            )),
            ..general.clone()
        });
    }

    Ok(Allocation {
        transactions,
        goals: affected,
        completed: room.is_positive(),
    })
}

/// Creates a targeted goal and posts `pending` as its first contribution.
/// The amount is never split, even when it exceeds the target.
pub fn contribute_to_new_goal(
    pending: &PendingTransaction,
    new_goal: &NewGoal,
    goals: &[SavingsGoal],
    created_at: DateTime<Utc>,
) -> ResultEngine<Allocation> {
    util::ensure_positive(pending.amount)?;
    let goal = SavingsGoal::new(
        &new_goal.name,
        new_goal.target,
        new_goal.emoji.as_deref().unwrap_or_default(),
        created_at,
    )?;
    goals::ensure_unique_name(goals, &goal.name, None)?;

    let description = format!("Initial contribution to new goal: \"{}\"", goal.name);
    let tx = linked(
        TransactionKind::Expense,
        SAVINGS_CONTRIBUTION,
        pending.amount,
        pending.date,
        &description,
        &goal,
        pending.amount,
    )?;
    let completed = pending.amount >= new_goal.target;
    Ok(Allocation {
        transactions: vec![tx],
        goals: vec![SavingsGoal {
            current_amount: pending.amount,
            ..goal
        }],
        completed,
    })
}

/// Withdraws `pending` from a goal holding at least that much.
pub fn withdraw(
    pending: &PendingTransaction,
    goal_id: Uuid,
    goals: &[SavingsGoal],
) -> ResultEngine<Allocation> {
    util::ensure_positive(pending.amount)?;
    let goal = find_open_goal(goals, goal_id)?;
    if pending.amount > goal.current_amount {
        return Err(EngineError::InsufficientFunds(format!(
            "\"{}\" holds {}, cannot withdraw {}",
            goal.name, goal.current_amount, pending.amount
        )));
    }

    let description = match pending.note() {
        Some(note) => format!("{note} (From Goal: {})", goal.name),
        None => format!("Withdrawal from savings goal: \"{}\"", goal.name),
    };
    let current = goal.current_amount - pending.amount;
    let tx = linked(
        TransactionKind::Income,
        SAVINGS_WITHDRAWAL,
        pending.amount,
        pending.date,
        &description,
        goal,
        current,
    )?;
    Ok(Allocation {
        transactions: vec![tx],
        goals: vec![SavingsGoal {
            current_amount: current,
            ..goal.clone()
        }],
        completed: false,
    })
}

/// Goals a withdrawal of `amount` may be taken from.
pub fn withdrawal_candidates(goals: &[SavingsGoal], amount: Money) -> Vec<&SavingsGoal> {
    goals
        .iter()
        .filter(|goal| !goal.is_archived && goal.current_amount >= amount)
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 4, 10, 18, 0, 0).unwrap()
    }

    fn pending(units: i64) -> PendingTransaction {
        PendingTransaction::new(Money::units(units), now())
    }

    fn goal(name: &str, target: i64, current: i64) -> SavingsGoal {
        let mut goal = SavingsGoal::new(name, Money::units(target), "🎯", now()).unwrap();
        goal.current_amount = Money::units(current);
        goal
    }

    fn general(current: i64) -> SavingsGoal {
        let mut goal = SavingsGoal::general_savings(now());
        goal.current_amount = Money::units(current);
        goal
    }

    #[test]
    fn overshoot_is_split_into_completion_and_spillover() {
        let gs = general(10);
        let laptop = goal("Laptop", 100, 80);
        let goals = vec![gs.clone(), laptop.clone()];

        let plan = contribute(&pending(50), laptop.id, &goals, Currency::Usd).unwrap();

        assert!(plan.completed);
        assert_eq!(plan.transactions.len(), 2);
        let finish = &plan.transactions[0];
        assert_eq!(finish.amount, Money::units(20));
        assert_eq!(finish.goal_id, Some(laptop.id));
        assert_eq!(finish.description, "Final contribution to complete: \"Laptop\"");
        assert_eq!(
            finish.savings_meta,
            Some(SavingsMeta::new(Money::units(80), Money::units(100)))
        );
        let spill = &plan.transactions[1];
        assert_eq!(spill.amount, Money::units(30));
        assert_eq!(spill.goal_id, Some(gs.id));
        assert_eq!(spill.description, "Spillover from \"Laptop\" to General Savings");
        assert_eq!(
            spill.savings_meta,
            Some(SavingsMeta::new(Money::units(10), Money::units(40)))
        );

        assert_eq!(
            plan.goals[0].unread_notification_message.as_deref(),
            Some("Excess of $30.00 transferred to General Savings.")
        );
        assert_eq!(plan.goals[1].current_amount, Money::units(40));
        assert_eq!(
            plan.goals[1].unread_notification_message.as_deref(),
            Some("Received $30.00 spillover from \"Laptop\".")
        );
    }

    #[test]
    fn completed_goal_sends_everything_to_general_savings() {
        let gs = general(0);
        let done = goal("Bike", 100, 100);
        let goals = vec![gs.clone(), done.clone()];

        let plan = contribute(&pending(25), done.id, &goals, Currency::Eur).unwrap();

        assert!(!plan.completed);
        assert_eq!(plan.transactions.len(), 1);
        assert_eq!(plan.transactions[0].goal_id, Some(gs.id));
        assert_eq!(plan.transactions[0].amount, Money::units(25));
        assert_eq!(
            plan.goals[0].unread_notification_message.as_deref(),
            Some("Excess of €25.00 transferred to General Savings.")
        );
    }

    #[test]
    fn general_savings_never_splits() {
        let gs = general(1_000);
        let plan = contribute(&pending(5_000), gs.id, std::slice::from_ref(&gs), Currency::Usd)
            .unwrap();

        assert_eq!(plan.transactions.len(), 1);
        assert!(!plan.completed);
        assert_eq!(plan.goals[0].current_amount, Money::units(6_000));
        assert_eq!(
            plan.transactions[0].description,
            "Contribution to savings goal: \"General Savings\""
        );
    }

    #[test]
    fn exact_fill_completes_without_split() {
        let gs = general(0);
        let trip = goal("Trip", 100, 60);
        let goals = vec![gs, trip.clone()];

        let plan = contribute(
            &pending(40).description("June bonus"),
            trip.id,
            &goals,
            Currency::Usd,
        )
        .unwrap();

        assert_eq!(plan.transactions.len(), 1);
        assert!(plan.completed);
        assert_eq!(plan.transactions[0].description, "June bonus (Goal: Trip)");
        assert_eq!(plan.goals.len(), 1);
    }

    #[test]
    fn spillover_without_general_savings_posts_nothing() {
        let laptop = goal("Laptop", 100, 80);
        let err = contribute(&pending(50), laptop.id, std::slice::from_ref(&laptop), Currency::Usd)
            .unwrap_err();
        assert_eq!(err, EngineError::MissingGeneralSavings);
    }

    #[test]
    fn archived_goal_rejects_contributions() {
        let mut old = goal("Old", 100, 10);
        old.is_archived = true;
        let err =
            contribute(&pending(5), old.id, std::slice::from_ref(&old), Currency::Usd).unwrap_err();
        assert_eq!(err, EngineError::GoalArchived("Old".to_string()));
    }

    #[test]
    fn new_goal_takes_whole_amount() {
        let gs = general(0);
        let plan = contribute_to_new_goal(
            &pending(150),
            &NewGoal::new("  Camera ", Money::units(100)).emoji("📷"),
            std::slice::from_ref(&gs),
            now(),
        )
        .unwrap();

        assert!(plan.completed);
        let camera = &plan.goals[0];
        assert_eq!(camera.name, "Camera");
        assert_eq!(camera.current_amount, Money::units(150));
        let tx = &plan.transactions[0];
        assert_eq!(tx.goal_id, Some(camera.id));
        assert_eq!(tx.description, "Initial contribution to new goal: \"Camera\"");
        assert_eq!(
            tx.savings_meta,
            Some(SavingsMeta::new(Money::ZERO, Money::units(150)))
        );
    }

    #[test]
    fn new_goal_rejects_duplicate_active_name() {
        let goals = vec![general(0), goal("Camera", 100, 0)];
        let err = contribute_to_new_goal(
            &pending(10),
            &NewGoal::new("camera", Money::units(50)),
            &goals,
            now(),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::DuplicateGoal(_)));
    }

    #[test]
    fn withdrawal_guards_balance() {
        let car = goal("Car", 1_000, 50);
        let err = withdraw(&pending(60), car.id, std::slice::from_ref(&car)).unwrap_err();
        assert!(matches!(err, EngineError::InsufficientFunds(_)));

        let plan = withdraw(&pending(50), car.id, std::slice::from_ref(&car)).unwrap();
        let tx = &plan.transactions[0];
        assert_eq!(tx.kind, TransactionKind::Income);
        assert_eq!(tx.category, SAVINGS_WITHDRAWAL);
        assert_eq!(tx.description, "Withdrawal from savings goal: \"Car\"");
        assert_eq!(tx.savings_meta, Some(SavingsMeta::new(Money::units(50), Money::ZERO)));
        assert_eq!(plan.goals[0].current_amount, Money::ZERO);
    }

    #[test]
    fn candidates_exclude_archived_and_short_goals() {
        let rich = goal("Rich", 500, 300);
        let poor = goal("Poor", 500, 10);
        let mut shelved = goal("Shelved", 100, 100);
        shelved.is_archived = true;
        let goals = vec![rich.clone(), poor, shelved];

        let names: Vec<_> = withdrawal_candidates(&goals, Money::units(100))
            .into_iter()
            .map(|goal| goal.name.as_str())
            .collect();
        assert_eq!(names, vec!["Rich"]);
    }
}
