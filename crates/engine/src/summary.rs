//! Period totals for dashboards and reports.

use std::{collections::HashMap, fmt};

use chrono::{DateTime, Datelike, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{Money, Transaction, TransactionKind};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimePeriod {
    Daily,
    Weekly,
    #[default]
    Monthly,
    Yearly,
}

impl fmt::Display for TimePeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Daily => "Daily",
            Self::Weekly => "Weekly",
            Self::Monthly => "Monthly",
            Self::Yearly => "Yearly",
        })
    }
}

/// Which transactions a summary covers. Calendar days are UTC days.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SummaryRange {
    /// The current day, week (starting Sunday), month or year.
    Period(TimePeriod),
    /// Inclusive day bounds; either may be open. Reversed bounds are
    /// swapped.
    Dates {
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    },
}

impl SummaryRange {
    fn contains(&self, date: DateTime<Utc>, today: NaiveDate) -> bool {
        let day = date.date_naive();
        match *self {
            Self::Period(TimePeriod::Daily) => day == today,
            Self::Period(TimePeriod::Weekly) => {
                let offset = u64::from(today.weekday().num_days_from_sunday());
                today
                    .checked_sub_days(Days::new(offset))
                    .is_some_and(|start| day >= start)
            }
            Self::Period(TimePeriod::Monthly) => {
                day.year() == today.year() && day.month() == today.month()
            }
            Self::Period(TimePeriod::Yearly) => day.year() == today.year(),
            Self::Dates { start, end } => {
                let (start, end) = match (start, end) {
                    (Some(s), Some(e)) if s > e => (Some(e), Some(s)),
                    bounds => bounds,
                };
                start.is_none_or(|s| day >= s) && end.is_none_or(|e| day <= e)
            }
        }
    }

    /// Heading used by reports.
    pub fn title(&self) -> String {
        match *self {
            Self::Period(period) => format!("{period} Report"),
            Self::Dates {
                start: Some(s),
                end: Some(e),
            } => format!("From {s} to {e}"),
            Self::Dates {
                start: Some(s),
                end: None,
            } => format!("From {s}"),
            Self::Dates {
                start: None,
                end: Some(e),
            } => format!("Until {e}"),
            Self::Dates {
                start: None,
                end: None,
            } => "All Transactions".to_string(),
        }
    }
}

/// Level and experience earned by logging transactions: a level every ten
/// entries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub level: usize,
    pub xp: usize,
}

impl Progress {
    pub fn from_count(count: usize) -> Self {
        Self {
            level: count / 10 + 1,
            xp: (count % 10) * 10,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub title: String,
    pub transactions: Vec<Transaction>,
    pub total_income: Money,
    pub total_expense: Money,
    pub balance: Money,
    pub largest_income: Option<Transaction>,
    pub largest_expense: Option<Transaction>,
    /// Expense totals per category, largest first.
    pub expense_by_category: Vec<(String, Money)>,
    /// Computed over the whole history, not only the range.
    pub progress: Progress,
}

fn largest(list: &[&Transaction], kind: TransactionKind) -> Option<Transaction> {
    list.iter()
        .copied()
        .filter(|tx| tx.kind == kind)
        .fold(None::<&Transaction>, |best, tx| match best {
            Some(best) if best.amount >= tx.amount => Some(best),
            _ => Some(tx),
        })
        .cloned()
}

/// Summarizes `transactions` (newest first) over `range`.
pub fn summarize(transactions: &[Transaction], range: SummaryRange, today: NaiveDate) -> Summary {
    let selected: Vec<&Transaction> = transactions
        .iter()
        .filter(|tx| range.contains(tx.date, today))
        .collect();

    let total = |kind: TransactionKind| -> Money {
        selected
            .iter()
            .filter(|tx| tx.kind == kind)
            .map(|tx| tx.amount)
            .sum()
    };
    let total_income = total(TransactionKind::Income);
    let total_expense = total(TransactionKind::Expense);

    let mut by_category: HashMap<&str, Money> = HashMap::new();
    for tx in selected.iter().filter(|tx| tx.kind == TransactionKind::Expense) {
        *by_category.entry(tx.category.as_str()).or_default() += tx.amount;
    }
    let mut expense_by_category: Vec<(String, Money)> = by_category
        .into_iter()
        .map(|(category, amount)| (category.to_string(), amount))
        .collect();
    expense_by_category.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    Summary {
        title: range.title(),
        largest_income: largest(&selected, TransactionKind::Income),
        largest_expense: largest(&selected, TransactionKind::Expense),
        transactions: selected.into_iter().cloned().collect(),
        total_income,
        total_expense,
        balance: total_income - total_expense,
        expense_by_category,
        progress: Progress::from_count(transactions.len()),
    }
}
