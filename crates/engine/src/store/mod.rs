//! Durable per-user storage of transactions, goals and activity days.
//!
//! The session treats the store as the remote side of an optimistic update:
//! local state changes first, then the store is told. Implementations must
//! be safe to share across tasks.

use std::{
    collections::HashMap,
    sync::{
        Mutex, MutexGuard,
        atomic::{AtomicBool, Ordering},
    },
};

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::{EngineError, ResultEngine, SavingsGoal, Transaction};

mod sqlite;

pub use sqlite::SqliteStore;

#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// All transactions of the user, newest first. Rows sharing a date come
    /// most recently written first.
    async fn list_transactions(&self, user_id: &str) -> ResultEngine<Vec<Transaction>>;
    /// Inserts or replaces by id.
    async fn upsert_transactions(
        &self,
        user_id: &str,
        transactions: &[Transaction],
    ) -> ResultEngine<()>;
    /// Unknown ids are ignored.
    async fn delete_transactions(&self, user_id: &str, ids: &[Uuid]) -> ResultEngine<()>;
    /// All goals of the user, oldest first.
    async fn list_goals(&self, user_id: &str) -> ResultEngine<Vec<SavingsGoal>>;
    /// Inserts or replaces by id.
    async fn upsert_goals(&self, user_id: &str, goals: &[SavingsGoal]) -> ResultEngine<()>;
    /// Removes the goal and clears `goal_id` on the transactions pointing at
    /// it. Their balance snapshots are kept.
    async fn delete_goal(&self, user_id: &str, goal_id: Uuid) -> ResultEngine<()>;
    async fn list_activity(&self, user_id: &str) -> ResultEngine<Vec<NaiveDate>>;
    /// Idempotent.
    async fn log_activity(&self, user_id: &str, day: NaiveDate) -> ResultEngine<()>;
    async fn clear_activity(&self, user_id: &str) -> ResultEngine<()>;
}

#[derive(Debug, Default)]
struct UserData {
    // Write order, oldest first.
    transactions: Vec<Transaction>,
    goals: Vec<SavingsGoal>,
    activity: Vec<NaiveDate>,
}

/// In-process store. Writes can be made to fail on demand to exercise the
/// session's persistence error paths.
#[derive(Debug, Default)]
pub struct MemoryStore {
    users: Mutex<HashMap<String, UserData>>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every write returns [`EngineError::Store`] and changes
    /// nothing. Reads keep working.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn users(&self) -> ResultEngine<MutexGuard<'_, HashMap<String, UserData>>> {
        self.users
            .lock()
            .map_err(|_| EngineError::Store("memory store lock poisoned".to_string()))
    }

    fn write<T>(
        &self,
        user_id: &str,
        f: impl FnOnce(&mut UserData) -> T,
    ) -> ResultEngine<T> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(EngineError::Store("write rejected".to_string()));
        }
        let mut users = self.users()?;
        Ok(f(users.entry(user_id.to_string()).or_default()))
    }

    fn read<T>(&self, user_id: &str, f: impl FnOnce(&UserData) -> T) -> ResultEngine<T> {
        let users = self.users()?;
        let empty = UserData::default();
        Ok(f(users.get(user_id).unwrap_or(&empty)))
    }
}

fn upsert_by_id<T: Clone>(rows: &mut Vec<T>, incoming: &[T], id: impl Fn(&T) -> Uuid) {
    for row in incoming {
        match rows.iter_mut().find(|existing| id(existing) == id(row)) {
            Some(existing) => *existing = row.clone(),
            None => rows.push(row.clone()),
        }
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn list_transactions(&self, user_id: &str) -> ResultEngine<Vec<Transaction>> {
        self.read(user_id, |data| {
            let mut list: Vec<_> = data.transactions.iter().rev().cloned().collect();
            list.sort_by(|a, b| b.date.cmp(&a.date));
            list
        })
    }

    async fn upsert_transactions(
        &self,
        user_id: &str,
        transactions: &[Transaction],
    ) -> ResultEngine<()> {
        self.write(user_id, |data| {
            upsert_by_id(&mut data.transactions, transactions, |tx| tx.id)
        })
    }

    async fn delete_transactions(&self, user_id: &str, ids: &[Uuid]) -> ResultEngine<()> {
        self.write(user_id, |data| {
            data.transactions.retain(|tx| !ids.contains(&tx.id))
        })
    }

    async fn list_goals(&self, user_id: &str) -> ResultEngine<Vec<SavingsGoal>> {
        self.read(user_id, |data| {
            let mut goals = data.goals.clone();
            goals.sort_by_key(|goal| goal.created_at);
            goals
        })
    }

    async fn upsert_goals(&self, user_id: &str, goals: &[SavingsGoal]) -> ResultEngine<()> {
        self.write(user_id, |data| {
            upsert_by_id(&mut data.goals, goals, |goal| goal.id)
        })
    }

    async fn delete_goal(&self, user_id: &str, goal_id: Uuid) -> ResultEngine<()> {
        self.write(user_id, |data| {
            data.goals.retain(|goal| goal.id != goal_id);
            for tx in &mut data.transactions {
                if tx.goal_id == Some(goal_id) {
                    tx.goal_id = None;
                }
            }
        })
    }

    async fn list_activity(&self, user_id: &str) -> ResultEngine<Vec<NaiveDate>> {
        self.read(user_id, |data| data.activity.clone())
    }

    async fn log_activity(&self, user_id: &str, day: NaiveDate) -> ResultEngine<()> {
        self.write(user_id, |data| {
            if !data.activity.contains(&day) {
                data.activity.push(day);
            }
        })
    }

    async fn clear_activity(&self, user_id: &str) -> ResultEngine<()> {
        self.write(user_id, |data| data.activity.clear())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::{Money, TransactionKind};

    fn tx(day: u32) -> Transaction {
        let date = Utc.with_ymd_and_hms(2025, 6, day, 0, 0, 0).unwrap();
        Transaction::new(TransactionKind::Expense, "Food", Money::units(1), date, "").unwrap()
    }

    #[tokio::test]
    async fn lists_newest_first_with_latest_write_winning_ties() {
        let store = MemoryStore::new();
        let (a, b, c) = (tx(1), tx(2), tx(2));
        store
            .upsert_transactions("u", &[a.clone(), b.clone(), c.clone()])
            .await
            .unwrap();

        let ids: Vec<_> = store
            .list_transactions("u")
            .await
            .unwrap()
            .into_iter()
            .map(|tx| tx.id)
            .collect();
        assert_eq!(ids, vec![c.id, b.id, a.id]);
    }

    #[tokio::test]
    async fn users_are_isolated() {
        let store = MemoryStore::new();
        store.upsert_transactions("a", &[tx(1)]).await.unwrap();
        assert!(store.list_transactions("b").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failing_writes_leave_data_untouched() {
        let store = MemoryStore::new();
        store.fail_writes(true);
        let err = store.upsert_transactions("u", &[tx(1)]).await.unwrap_err();
        assert!(err.is_persistence());
        store.fail_writes(false);
        assert!(store.list_transactions("u").await.unwrap().is_empty());
    }
}
