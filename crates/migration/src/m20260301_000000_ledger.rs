//! Initial schema for the savings ledger:
//!
//! - `transactions`: income and expenses, optionally linked to a goal
//! - `savings_goals`: targeted goals and the per-user General Savings
//! - `activity_log`: one row per user per active day

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum Transactions {
    Table,
    Id,
    UserId,
    Kind,
    Category,
    AmountMinor,
    OccurredAt,
    Description,
    GoalId,
    IsValid,
    InvalidationReason,
    MetaPreviousMinor,
    MetaCurrentMinor,
}

#[derive(Iden)]
enum SavingsGoals {
    Table,
    Id,
    UserId,
    Name,
    TargetMinor,
    CurrentMinor,
    Emoji,
    IsDeletable,
    IsArchived,
    UnreadNotificationMessage,
    CreatedAt,
}

#[derive(Iden)]
enum ActivityLog {
    Table,
    UserId,
    LogDate,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SavingsGoals::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(SavingsGoals::Id).string().not_null())
                    .col(ColumnDef::new(SavingsGoals::UserId).string().not_null())
                    .col(ColumnDef::new(SavingsGoals::Name).string().not_null())
                    .col(
                        ColumnDef::new(SavingsGoals::TargetMinor)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(SavingsGoals::CurrentMinor)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(SavingsGoals::Emoji)
                            .string()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(SavingsGoals::IsDeletable)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(SavingsGoals::IsArchived)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(SavingsGoals::UnreadNotificationMessage).string())
                    .col(
                        ColumnDef::new(SavingsGoals::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(SavingsGoals::UserId)
                            .col(SavingsGoals::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-savings_goals-user_id")
                    .table(SavingsGoals::Table)
                    .col(SavingsGoals::UserId)
                    .col(SavingsGoals::CreatedAt)
                    .to_owned(),
            )
            .await?;

        // goal_id carries no foreign key: deleting a goal unlinks its
        // transactions explicitly and backups may reference missing goals.
        manager
            .create_table(
                Table::create()
                    .table(Transactions::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Transactions::Id).string().not_null())
                    .col(ColumnDef::new(Transactions::UserId).string().not_null())
                    .col(ColumnDef::new(Transactions::Kind).string().not_null())
                    .col(ColumnDef::new(Transactions::Category).string().not_null())
                    .col(
                        ColumnDef::new(Transactions::AmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Transactions::OccurredAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Transactions::Description)
                            .string()
                            .not_null()
                            .default(""),
                    )
                    .col(ColumnDef::new(Transactions::GoalId).string())
                    .col(
                        ColumnDef::new(Transactions::IsValid)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(Transactions::InvalidationReason).string())
                    .col(ColumnDef::new(Transactions::MetaPreviousMinor).big_integer())
                    .col(ColumnDef::new(Transactions::MetaCurrentMinor).big_integer())
                    .primary_key(
                        Index::create()
                            .col(Transactions::UserId)
                            .col(Transactions::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-transactions-user_id-occurred_at")
                    .table(Transactions::Table)
                    .col(Transactions::UserId)
                    .col(Transactions::OccurredAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-transactions-goal_id")
                    .table(Transactions::Table)
                    .col(Transactions::GoalId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ActivityLog::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(ActivityLog::UserId).string().not_null())
                    .col(ColumnDef::new(ActivityLog::LogDate).date().not_null())
                    .primary_key(
                        Index::create()
                            .col(ActivityLog::UserId)
                            .col(ActivityLog::LogDate),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ActivityLog::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Transactions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(SavingsGoals::Table).to_owned())
            .await?;
        Ok(())
    }
}
