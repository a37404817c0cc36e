//! Transaction primitives.
//!
//! A `Transaction` is a single income or expense. Transactions linked to a
//! savings goal (`goal_id`) form that goal's contribution/withdrawal chain and
//! carry a [`SavingsMeta`] snapshot of the goal balance around them.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, Money, ResultEngine, util};

/// Expense category that moves money into a savings goal.
pub const SAVINGS_CONTRIBUTION: &str = "Savings Contribution";
/// Income category that moves money out of a savings goal.
pub const SAVINGS_WITHDRAWAL: &str = "Savings Withdrawal";

pub const INCOME_CATEGORIES: [&str; 6] = [
    "Salary",
    "Freelance",
    "Investment",
    "Gift",
    SAVINGS_WITHDRAWAL,
    "Other",
];

pub const EXPENSE_CATEGORIES: [&str; 10] = [
    "Food",
    "Housing",
    "Transport",
    "Utilities",
    "Entertainment",
    "Health",
    "Shopping",
    "Education",
    SAVINGS_CONTRIBUTION,
    "Other",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Income,
    Expense,
}

impl TransactionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
        }
    }
}

impl TryFrom<&str> for TransactionKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "income" => Ok(Self::Income),
            "expense" => Ok(Self::Expense),
            other => Err(EngineError::InvalidAmount(format!(
                "invalid transaction kind: {other}"
            ))),
        }
    }
}

/// Goal balance immediately before and after a goal-linked transaction, as
/// of when it was created. Written once, validated by the reconciler.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavingsMeta {
    pub previous_amount: Money,
    pub current_amount: Money,
}

impl SavingsMeta {
    pub fn new(previous_amount: Money, current_amount: Money) -> Self {
        Self {
            previous_amount,
            current_amount,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub category: String,
    pub amount: Money,
    pub date: DateTime<Utc>,
    #[serde(default, deserialize_with = "util::string_or_null")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal_id: Option<Uuid>,
    #[serde(default = "util::default_true", deserialize_with = "util::true_if_null")]
    pub is_valid: bool,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "util::non_empty_string"
    )]
    pub invalidation_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub savings_meta: Option<SavingsMeta>,
}

impl Transaction {
    /// Creates a plain (not goal-linked) transaction with a fresh id.
    pub fn new(
        kind: TransactionKind,
        category: &str,
        amount: Money,
        date: DateTime<Utc>,
        description: &str,
    ) -> ResultEngine<Self> {
        util::ensure_positive(amount)?;
        let category = util::normalize_required_name(category, "category")?;
        Ok(Self {
            id: Uuid::new_v4(),
            kind,
            category,
            amount,
            date,
            description: description.trim().to_string(),
            goal_id: None,
            is_valid: true,
            invalidation_reason: None,
            savings_meta: None,
        })
    }

    pub fn is_contribution(&self) -> bool {
        self.category == SAVINGS_CONTRIBUTION
    }

    pub fn is_withdrawal(&self) -> bool {
        self.category == SAVINGS_WITHDRAWAL
    }

    /// Effect on the linked goal balance. Categories other than the two
    /// savings ones are balance-neutral.
    pub fn goal_delta(&self) -> Money {
        if self.is_contribution() {
            self.amount
        } else if self.is_withdrawal() {
            -self.amount
        } else {
            Money::ZERO
        }
    }
}

/// `true` for the two categories that only the allocator may post.
pub fn is_savings_category(category: &str) -> bool {
    let category = category.trim();
    category.eq_ignore_ascii_case(SAVINGS_CONTRIBUTION)
        || category.eq_ignore_ascii_case(SAVINGS_WITHDRAWAL)
}

/// Inserts keeping the list sorted newest first. A transaction sharing its
/// date with existing ones goes before them.
pub(crate) fn insert_newest_first(list: &mut Vec<Transaction>, tx: Transaction) {
    let index = list
        .iter()
        .position(|existing| existing.date <= tx.date)
        .unwrap_or(list.len());
    list.insert(index, tx);
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub kind: String,
    pub category: String,
    pub amount_minor: i64,
    pub occurred_at: DateTimeUtc,
    pub description: String,
    pub goal_id: Option<String>,
    pub is_valid: bool,
    pub invalidation_reason: Option<String>,
    pub meta_previous_minor: Option<i64>,
    pub meta_current_minor: Option<i64>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<(&Transaction, &str)> for ActiveModel {
    fn from((tx, user_id): (&Transaction, &str)) -> Self {
        Self {
            id: ActiveValue::Set(tx.id.to_string()),
            user_id: ActiveValue::Set(user_id.to_string()),
            kind: ActiveValue::Set(tx.kind.as_str().to_string()),
            category: ActiveValue::Set(tx.category.clone()),
            amount_minor: ActiveValue::Set(tx.amount.cents()),
            occurred_at: ActiveValue::Set(tx.date),
            description: ActiveValue::Set(tx.description.clone()),
            goal_id: ActiveValue::Set(tx.goal_id.map(|id| id.to_string())),
            is_valid: ActiveValue::Set(tx.is_valid),
            invalidation_reason: ActiveValue::Set(tx.invalidation_reason.clone()),
            meta_previous_minor: ActiveValue::Set(
                tx.savings_meta.map(|meta| meta.previous_amount.cents()),
            ),
            meta_current_minor: ActiveValue::Set(
                tx.savings_meta.map(|meta| meta.current_amount.cents()),
            ),
        }
    }
}

impl TryFrom<Model> for Transaction {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let savings_meta = match (model.meta_previous_minor, model.meta_current_minor) {
            (Some(previous), Some(current)) => {
                Some(SavingsMeta::new(Money::new(previous), Money::new(current)))
            }
            _ => None,
        };
        Ok(Self {
            id: util::parse_uuid(&model.id, "transaction")?,
            kind: TransactionKind::try_from(model.kind.as_str())?,
            category: model.category,
            amount: Money::new(model.amount_minor),
            date: model.occurred_at,
            description: model.description,
            goal_id: model
                .goal_id
                .as_deref()
                .map(|id| util::parse_uuid(id, "goal"))
                .transpose()?,
            is_valid: model.is_valid,
            invalidation_reason: model.invalidation_reason,
            savings_meta,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, day, 12, 0, 0).unwrap()
    }

    #[test]
    fn new_rejects_non_positive_amounts() {
        let err = Transaction::new(TransactionKind::Expense, "Food", Money::ZERO, at(1), "")
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidAmount(_)));
    }

    #[test]
    fn goal_delta_follows_category() {
        let mut tx =
            Transaction::new(TransactionKind::Expense, "Food", Money::units(5), at(1), "").unwrap();
        assert_eq!(tx.goal_delta(), Money::ZERO);
        tx.category = SAVINGS_CONTRIBUTION.to_string();
        assert_eq!(tx.goal_delta(), Money::units(5));
        tx.category = SAVINGS_WITHDRAWAL.to_string();
        assert_eq!(tx.goal_delta(), Money::units(-5));
    }

    #[test]
    fn insert_keeps_newest_first() {
        let mut list = Vec::new();
        for day in [2, 5, 1, 3] {
            let tx = Transaction::new(TransactionKind::Income, "Gift", Money::units(1), at(day), "")
                .unwrap();
            insert_newest_first(&mut list, tx);
        }
        let days: Vec<_> = list.iter().map(|tx| tx.date).collect();
        assert_eq!(days, vec![at(5), at(3), at(2), at(1)]);
    }

    #[test]
    fn deserializes_legacy_nulls() {
        let json = r#"{
            "id": "0b9e0c3e-52a2-4d0c-8f2f-2d1c44b0a8a1",
            "user_id": "someone",
            "type": "expense",
            "category": "Food",
            "amount": 12.5,
            "date": "2024-05-01T10:00:00.000Z",
            "description": null,
            "goal_id": null,
            "is_valid": null,
            "invalidation_reason": ""
        }"#;
        let tx: Transaction = serde_json::from_str(json).unwrap();
        assert_eq!(tx.amount, Money::new(1250));
        assert!(tx.is_valid);
        assert_eq!(tx.invalidation_reason, None);
        assert_eq!(tx.description, "");
        assert_eq!(tx.goal_id, None);
    }
}
