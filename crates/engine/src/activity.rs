//! Daily check-ins and streaks.
//!
//! A user is "active" on a calendar day when they recorded anything or
//! explicitly checked in. Streaks count consecutive active days.

use chrono::{Days, NaiveDate};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "activity_log")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub log_date: Date,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<(&str, NaiveDate)> for ActiveModel {
    fn from((user_id, log_date): (&str, NaiveDate)) -> Self {
        Self {
            user_id: ActiveValue::Set(user_id.to_string()),
            log_date: ActiveValue::Set(log_date),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Streaks {
    /// Run ending on the last active day, or 0 when that day is older than
    /// yesterday.
    pub current: u32,
    pub longest: u32,
}

/// Computes streaks from the active days (any order, duplicates allowed).
pub fn streaks(days: &[NaiveDate], today: NaiveDate) -> Streaks {
    let mut days = days.to_vec();
    days.sort_unstable();
    days.dedup();

    let Some(&last) = days.last() else {
        return Streaks::default();
    };

    let mut run = 1;
    let mut longest = 1;
    for pair in days.windows(2) {
        if pair[0].checked_add_days(Days::new(1)) == Some(pair[1]) {
            run += 1;
        } else {
            run = 1;
        }
        longest = longest.max(run);
    }

    let broken = today
        .checked_sub_days(Days::new(1))
        .is_some_and(|yesterday| last < yesterday);
    Streaks {
        current: if broken { 0 } else { run },
        longest,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 5, d).unwrap()
    }

    #[test]
    fn empty_log_has_no_streak() {
        assert_eq!(streaks(&[], day(10)), Streaks::default());
    }

    #[test]
    fn counts_runs_and_keeps_longest() {
        let log = [day(1), day(2), day(3), day(6), day(8), day(9)];
        assert_eq!(
            streaks(&log, day(9)),
            Streaks {
                current: 2,
                longest: 3
            }
        );
    }

    #[test]
    fn yesterday_keeps_streak_alive() {
        let log = [day(7), day(8)];
        assert_eq!(streaks(&log, day(9)).current, 2);
        assert_eq!(streaks(&log, day(10)).current, 0);
        assert_eq!(streaks(&log, day(10)).longest, 2);
    }

    #[test]
    fn ignores_duplicates_and_order() {
        let log = [day(3), day(2), day(3), day(2)];
        assert_eq!(
            streaks(&log, day(3)),
            Streaks {
                current: 2,
                longest: 2
            }
        );
    }
}
