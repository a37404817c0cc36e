//! The module contains the representation of a savings goal ("quest").
use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use sea_orm::entity::{ActiveValue, prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, Money, ResultEngine, util};

pub const GENERAL_SAVINGS_NAME: &str = "General Savings";
pub const GENERAL_SAVINGS_EMOJI: &str = "🏦";
pub const DEFAULT_GOAL_EMOJI: &str = "💰";

/// What kind of bound a goal has.
///
/// A targeted goal accepts contributions up to its target; anything above is
/// split off to General Savings. The unbounded goal is General Savings
/// itself: exactly one per user, never deletable, never split.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GoalKind {
    Targeted { target: Money },
    Unbounded,
}

/// A savings goal.
///
/// `current_amount` is derived: the reconciler recomputes it from the goal's
/// transaction chain after every change, so the stored value is never trusted
/// as input.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "GoalRecord", into = "GoalRecord")]
pub struct SavingsGoal {
    pub id: Uuid,
    pub name: String,
    pub kind: GoalKind,
    pub current_amount: Money,
    pub emoji: String,
    pub is_archived: bool,
    pub unread_notification_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl SavingsGoal {
    /// A new targeted goal with a zero balance.
    pub fn new(
        name: &str,
        target: Money,
        emoji: &str,
        created_at: DateTime<Utc>,
    ) -> ResultEngine<Self> {
        let name = util::normalize_required_name(name, "goal")?;
        util::ensure_target(target)?;
        let emoji = emoji.trim();
        Ok(Self {
            id: Uuid::new_v4(),
            name,
            kind: GoalKind::Targeted { target },
            current_amount: Money::ZERO,
            emoji: if emoji.is_empty() {
                DEFAULT_GOAL_EMOJI.to_string()
            } else {
                emoji.to_string()
            },
            is_archived: false,
            unread_notification_message: None,
            created_at,
        })
    }

    pub fn general_savings(created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: GENERAL_SAVINGS_NAME.to_string(),
            kind: GoalKind::Unbounded,
            current_amount: Money::ZERO,
            emoji: GENERAL_SAVINGS_EMOJI.to_string(),
            is_archived: false,
            unread_notification_message: None,
            created_at,
        }
    }

    pub fn is_unbounded(&self) -> bool {
        self.kind == GoalKind::Unbounded
    }

    pub fn is_deletable(&self) -> bool {
        !self.is_unbounded()
    }

    pub fn target(&self) -> Option<Money> {
        match self.kind {
            GoalKind::Targeted { target } => Some(target),
            GoalKind::Unbounded => None,
        }
    }

    /// How much the goal can still take before reaching its target. `None`
    /// means unlimited.
    pub fn room(&self) -> Option<Money> {
        self.target().map(|target| target - self.current_amount)
    }

    pub fn is_complete(&self) -> bool {
        self.target()
            .is_some_and(|target| self.current_amount >= target)
    }

    pub(crate) fn name_key(&self) -> String {
        util::name_key(&self.name)
    }
}

/// Display order for active goals: General Savings first, then goals still
/// in progress, then completed ones; oldest first within each group.
pub fn display_order(a: &SavingsGoal, b: &SavingsGoal) -> Ordering {
    let rank = |goal: &SavingsGoal| match (goal.is_unbounded(), goal.is_complete()) {
        (true, _) => 0,
        (false, false) => 1,
        (false, true) => 2,
    };
    rank(a)
        .cmp(&rank(b))
        .then_with(|| a.created_at.cmp(&b.created_at))
}

/// Rejects `name` when an active goal other than `exclude` already uses it.
/// Archived goals do not reserve their names.
pub(crate) fn ensure_unique_name(
    goals: &[SavingsGoal],
    name: &str,
    exclude: Option<Uuid>,
) -> ResultEngine<()> {
    let key = util::name_key(name);
    let taken = goals
        .iter()
        .any(|goal| !goal.is_archived && Some(goal.id) != exclude && goal.name_key() == key);
    if taken {
        return Err(EngineError::DuplicateGoal(name.trim().to_string()));
    }
    Ok(())
}

/// Flat wire representation shared with backup files.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct GoalRecord {
    id: Uuid,
    name: String,
    #[serde(default)]
    target_amount: Money,
    #[serde(default)]
    current_amount: Money,
    #[serde(default, deserialize_with = "util::string_or_null")]
    emoji: String,
    created_at: DateTime<Utc>,
    #[serde(default = "util::default_true", deserialize_with = "util::true_if_null")]
    is_deletable: bool,
    #[serde(default)]
    unread_notification_message: Option<String>,
    #[serde(default, deserialize_with = "false_if_null")]
    is_archived: bool,
}

fn false_if_null<'de, D: serde::Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(false))
}

impl TryFrom<GoalRecord> for SavingsGoal {
    type Error = EngineError;

    fn try_from(record: GoalRecord) -> Result<Self, Self::Error> {
        let kind = if record.is_deletable {
            if record.target_amount.is_negative() {
                return Err(EngineError::InvalidAmount(format!(
                    "negative target for goal '{}'",
                    record.name
                )));
            }
            GoalKind::Targeted {
                target: record.target_amount,
            }
        } else {
            GoalKind::Unbounded
        };
        Ok(Self {
            id: record.id,
            name: util::normalize_required_name(&record.name, "goal")?,
            kind,
            current_amount: record.current_amount,
            emoji: record.emoji,
            is_archived: record.is_archived,
            unread_notification_message: record.unread_notification_message,
            created_at: record.created_at,
        })
    }
}

impl From<SavingsGoal> for GoalRecord {
    fn from(goal: SavingsGoal) -> Self {
        Self {
            id: goal.id,
            target_amount: goal.target().unwrap_or(Money::ZERO),
            is_deletable: goal.is_deletable(),
            name: goal.name,
            current_amount: goal.current_amount,
            emoji: goal.emoji,
            created_at: goal.created_at,
            unread_notification_message: goal.unread_notification_message,
            is_archived: goal.is_archived,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "savings_goals")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub name: String,
    pub target_minor: i64,
    pub current_minor: i64,
    pub emoji: String,
    pub is_deletable: bool,
    pub is_archived: bool,
    pub unread_notification_message: Option<String>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<(&SavingsGoal, &str)> for ActiveModel {
    fn from((goal, user_id): (&SavingsGoal, &str)) -> Self {
        Self {
            id: ActiveValue::Set(goal.id.to_string()),
            user_id: ActiveValue::Set(user_id.to_string()),
            name: ActiveValue::Set(goal.name.clone()),
            target_minor: ActiveValue::Set(goal.target().unwrap_or(Money::ZERO).cents()),
            current_minor: ActiveValue::Set(goal.current_amount.cents()),
            emoji: ActiveValue::Set(goal.emoji.clone()),
            is_deletable: ActiveValue::Set(goal.is_deletable()),
            is_archived: ActiveValue::Set(goal.is_archived),
            unread_notification_message: ActiveValue::Set(
                goal.unread_notification_message.clone(),
            ),
            created_at: ActiveValue::Set(goal.created_at),
        }
    }
}

impl TryFrom<Model> for SavingsGoal {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let kind = if model.is_deletable {
            GoalKind::Targeted {
                target: Money::new(model.target_minor),
            }
        } else {
            GoalKind::Unbounded
        };
        Ok(Self {
            id: util::parse_uuid(&model.id, "goal")?,
            name: model.name,
            kind,
            current_amount: Money::new(model.current_minor),
            emoji: model.emoji,
            is_archived: model.is_archived,
            unread_notification_message: model.unread_notification_message,
            created_at: model.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, day, 9, 0, 0).unwrap()
    }

    #[test]
    fn targeted_goal_room_and_completion() {
        let mut goal = SavingsGoal::new("Laptop", Money::units(100), "💻", at(1)).unwrap();
        goal.current_amount = Money::units(80);
        assert_eq!(goal.room(), Some(Money::units(20)));
        assert!(!goal.is_complete());
        goal.current_amount = Money::units(100);
        assert!(goal.is_complete());
        assert!(goal.is_deletable());
    }

    #[test]
    fn general_savings_is_unbounded() {
        let goal = SavingsGoal::general_savings(at(1));
        assert_eq!(goal.room(), None);
        assert!(!goal.is_complete());
        assert!(!goal.is_deletable());
    }

    #[test]
    fn new_rejects_zero_target() {
        let err = SavingsGoal::new("Car", Money::ZERO, "🚗", at(1)).unwrap_err();
        assert!(matches!(err, EngineError::InvalidAmount(_)));
    }

    #[test]
    fn new_rejects_target_above_the_limit() {
        assert!(SavingsGoal::new("Moon", Money::MAX, "", at(1)).is_ok());
        let err = SavingsGoal::new("Moon", Money::MAX + Money::new(1), "", at(1)).unwrap_err();
        assert!(matches!(err, EngineError::InvalidAmount(_)));
    }

    #[test]
    fn wire_record_maps_deletable_flag_to_kind() {
        let json = r#"{
            "id": "5f0a4d0e-8a34-4f1e-9b43-1f6f0b4a4c11",
            "user_id": "u1",
            "name": "General Savings",
            "target_amount": 0,
            "current_amount": 42.5,
            "emoji": "🏦",
            "created_at": "2024-01-01T00:00:00Z",
            "is_deletable": false,
            "unread_notification_message": null,
            "is_archived": null
        }"#;
        let goal: SavingsGoal = serde_json::from_str(json).unwrap();
        assert!(goal.is_unbounded());
        assert_eq!(goal.current_amount, Money::new(4250));
        assert!(!goal.is_archived);

        let back = serde_json::to_value(&goal).unwrap();
        assert_eq!(back["is_deletable"], serde_json::Value::Bool(false));
        assert_eq!(back["target_amount"], serde_json::json!(0.0));
    }

    #[test]
    fn display_order_puts_general_savings_first_and_completed_last() {
        let general = SavingsGoal::general_savings(at(5));
        let mut done = SavingsGoal::new("Done", Money::units(10), "🎁", at(1)).unwrap();
        done.current_amount = Money::units(10);
        let older = SavingsGoal::new("Older", Money::units(10), "🚗", at(2)).unwrap();
        let newer = SavingsGoal::new("Newer", Money::units(10), "🏠", at(3)).unwrap();

        let mut goals = vec![done.clone(), newer.clone(), general.clone(), older.clone()];
        goals.sort_by(display_order);
        let names: Vec<_> = goals.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["General Savings", "Older", "Newer", "Done"]);
    }
}
