//! Command structs for session operations.
//!
//! These types group parameters for write operations (plain transactions,
//! savings flows, goal management), keeping call sites readable and avoiding
//! long argument lists.

use chrono::{DateTime, Utc};

use crate::{Money, TransactionKind};

/// A plain income or expense to record.
#[derive(Clone, Debug)]
pub struct TransactionDraft {
    pub kind: TransactionKind,
    pub category: String,
    pub amount: Money,
    pub date: DateTime<Utc>,
    pub description: String,
}

impl TransactionDraft {
    #[must_use]
    pub fn new(
        kind: TransactionKind,
        category: impl Into<String>,
        amount: Money,
        date: DateTime<Utc>,
    ) -> Self {
        Self {
            kind,
            category: category.into(),
            amount,
            date,
            description: String::new(),
        }
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Amount, date and optional note for a contribution or withdrawal, before
/// the allocator turns it into concrete transactions.
#[derive(Clone, Debug)]
pub struct PendingTransaction {
    pub amount: Money,
    pub date: DateTime<Utc>,
    pub description: Option<String>,
}

impl PendingTransaction {
    #[must_use]
    pub fn new(amount: Money, date: DateTime<Utc>) -> Self {
        Self {
            amount,
            date,
            description: None,
        }
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        let description = description.into();
        self.description = Some(description).filter(|d| !d.trim().is_empty());
        self
    }

    pub(crate) fn note(&self) -> Option<&str> {
        self.description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
    }
}

/// Partial update of an existing transaction. Unset fields are left as they
/// are.
#[derive(Clone, Debug, Default)]
pub struct TransactionEdit {
    pub kind: Option<TransactionKind>,
    pub category: Option<String>,
    pub amount: Option<Money>,
    pub date: Option<DateTime<Utc>>,
    pub description: Option<String>,
    /// Drops the goal link and the balance snapshot.
    pub unlink_goal: bool,
}

impl TransactionEdit {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn kind(mut self, kind: TransactionKind) -> Self {
        self.kind = Some(kind);
        self
    }

    #[must_use]
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    #[must_use]
    pub fn amount(mut self, amount: Money) -> Self {
        self.amount = Some(amount);
        self
    }

    #[must_use]
    pub fn date(mut self, date: DateTime<Utc>) -> Self {
        self.date = Some(date);
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn unlink_goal(mut self) -> Self {
        self.unlink_goal = true;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.kind.is_none()
            && self.category.is_none()
            && self.amount.is_none()
            && self.date.is_none()
            && self.description.is_none()
            && !self.unlink_goal
    }
}

/// A targeted goal to create.
#[derive(Clone, Debug)]
pub struct NewGoal {
    pub name: String,
    pub target: Money,
    pub emoji: Option<String>,
}

impl NewGoal {
    #[must_use]
    pub fn new(name: impl Into<String>, target: Money) -> Self {
        Self {
            name: name.into(),
            target,
            emoji: None,
        }
    }

    #[must_use]
    pub fn emoji(mut self, emoji: impl Into<String>) -> Self {
        self.emoji = Some(emoji.into());
        self
    }
}

/// Partial update of a goal's name, target or emoji.
#[derive(Clone, Debug, Default)]
pub struct GoalEdit {
    pub name: Option<String>,
    pub target: Option<Money>,
    pub emoji: Option<String>,
}

impl GoalEdit {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn target(mut self, target: Money) -> Self {
        self.target = Some(target);
        self
    }

    #[must_use]
    pub fn emoji(mut self, emoji: impl Into<String>) -> Self {
        self.emoji = Some(emoji.into());
        self
    }
}
