use async_trait::async_trait;
use chrono::NaiveDate;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, TransactionTrait,
    sea_query::{Expr, OnConflict},
};
use uuid::Uuid;

use super::LedgerStore;
use crate::{ResultEngine, SavingsGoal, Transaction, activity, goals, transactions};

// Keeps multi-row statements well under SQLite's bound parameter limit.
const CHUNK: usize = 500;

/// [`LedgerStore`] backed by a sea-orm connection. The schema comes from the
/// `migration` crate.
#[derive(Clone, Debug)]
pub struct SqliteStore {
    database: DatabaseConnection,
}

impl SqliteStore {
    pub fn new(database: DatabaseConnection) -> Self {
        Self { database }
    }
}

#[async_trait]
impl LedgerStore for SqliteStore {
    async fn list_transactions(&self, user_id: &str) -> ResultEngine<Vec<Transaction>> {
        transactions::Entity::find()
            .filter(transactions::Column::UserId.eq(user_id))
            .order_by_desc(transactions::Column::OccurredAt)
            .order_by_desc(Expr::cust("rowid"))
            .all(&self.database)
            .await?
            .into_iter()
            .map(Transaction::try_from)
            .collect()
    }

    async fn upsert_transactions(&self, user_id: &str, rows: &[Transaction]) -> ResultEngine<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let on_conflict =
            OnConflict::columns([transactions::Column::UserId, transactions::Column::Id])
                .update_columns([
                    transactions::Column::Kind,
                    transactions::Column::Category,
                    transactions::Column::AmountMinor,
                    transactions::Column::OccurredAt,
                    transactions::Column::Description,
                    transactions::Column::GoalId,
                    transactions::Column::IsValid,
                    transactions::Column::InvalidationReason,
                    transactions::Column::MetaPreviousMinor,
                    transactions::Column::MetaCurrentMinor,
                ])
                .to_owned();

        let db_tx = self.database.begin().await?;
        for chunk in rows.chunks(CHUNK) {
            transactions::Entity::insert_many(
                chunk
                    .iter()
                    .map(|tx| transactions::ActiveModel::from((tx, user_id))),
            )
            .on_conflict(on_conflict.clone())
            .exec_without_returning(&db_tx)
            .await?;
        }
        db_tx.commit().await?;
        Ok(())
    }

    async fn delete_transactions(&self, user_id: &str, ids: &[Uuid]) -> ResultEngine<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let db_tx = self.database.begin().await?;
        for chunk in ids.chunks(CHUNK) {
            transactions::Entity::delete_many()
                .filter(transactions::Column::UserId.eq(user_id))
                .filter(transactions::Column::Id.is_in(chunk.iter().map(Uuid::to_string)))
                .exec(&db_tx)
                .await?;
        }
        db_tx.commit().await?;
        Ok(())
    }

    async fn list_goals(&self, user_id: &str) -> ResultEngine<Vec<SavingsGoal>> {
        goals::Entity::find()
            .filter(goals::Column::UserId.eq(user_id))
            .order_by_asc(goals::Column::CreatedAt)
            .order_by_asc(Expr::cust("rowid"))
            .all(&self.database)
            .await?
            .into_iter()
            .map(SavingsGoal::try_from)
            .collect()
    }

    async fn upsert_goals(&self, user_id: &str, rows: &[SavingsGoal]) -> ResultEngine<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let on_conflict = OnConflict::columns([goals::Column::UserId, goals::Column::Id])
            .update_columns([
                goals::Column::Name,
                goals::Column::TargetMinor,
                goals::Column::CurrentMinor,
                goals::Column::Emoji,
                goals::Column::IsDeletable,
                goals::Column::IsArchived,
                goals::Column::UnreadNotificationMessage,
            ])
            .to_owned();

        let db_tx = self.database.begin().await?;
        for chunk in rows.chunks(CHUNK) {
            goals::Entity::insert_many(
                chunk
                    .iter()
                    .map(|goal| goals::ActiveModel::from((goal, user_id))),
            )
            .on_conflict(on_conflict.clone())
            .exec_without_returning(&db_tx)
            .await?;
        }
        db_tx.commit().await?;
        Ok(())
    }

    async fn delete_goal(&self, user_id: &str, goal_id: Uuid) -> ResultEngine<()> {
        let goal_id = goal_id.to_string();
        let db_tx = self.database.begin().await?;
        transactions::Entity::update_many()
            .col_expr(
                transactions::Column::GoalId,
                Expr::value(Option::<String>::None),
            )
            .filter(transactions::Column::UserId.eq(user_id))
            .filter(transactions::Column::GoalId.eq(goal_id.as_str()))
            .exec(&db_tx)
            .await?;
        goals::Entity::delete_many()
            .filter(goals::Column::UserId.eq(user_id))
            .filter(goals::Column::Id.eq(goal_id.as_str()))
            .exec(&db_tx)
            .await?;
        db_tx.commit().await?;
        Ok(())
    }

    async fn list_activity(&self, user_id: &str) -> ResultEngine<Vec<NaiveDate>> {
        let rows = activity::Entity::find()
            .filter(activity::Column::UserId.eq(user_id))
            .order_by_asc(activity::Column::LogDate)
            .all(&self.database)
            .await?;
        Ok(rows.into_iter().map(|row| row.log_date).collect())
    }

    async fn log_activity(&self, user_id: &str, day: NaiveDate) -> ResultEngine<()> {
        activity::Entity::insert(activity::ActiveModel::from((user_id, day)))
            .on_conflict(
                OnConflict::columns([activity::Column::UserId, activity::Column::LogDate])
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&self.database)
            .await?;
        Ok(())
    }

    async fn clear_activity(&self, user_id: &str) -> ResultEngine<()> {
        activity::Entity::delete_many()
            .filter(activity::Column::UserId.eq(user_id))
            .exec(&self.database)
            .await?;
        Ok(())
    }
}
