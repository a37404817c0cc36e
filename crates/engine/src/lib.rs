//! FinQuest savings ledger.
//!
//! Transactions, savings goals and the rules keeping them consistent: the
//! [`reconcile`](reconcile::reconcile) pass rebuilds goal balances from their
//! transaction chains, the [`allocate`] functions plan contributions and
//! withdrawals, and a [`Session`] applies both on top of a [`LedgerStore`].

pub use activity::Streaks;
pub use allocate::Allocation;
pub use backup::{BACKUP_VERSION, Backup};
pub use commands::{GoalEdit, NewGoal, PendingTransaction, TransactionDraft, TransactionEdit};
pub use currency::Currency;
pub use error::EngineError;
pub use goals::{
    DEFAULT_GOAL_EMOJI, GENERAL_SAVINGS_EMOJI, GENERAL_SAVINGS_NAME, GoalKind, SavingsGoal,
};
pub use money::Money;
pub use reconcile::Reconciliation;
pub use session::{Clock, Session, SessionBuilder};
pub use store::{LedgerStore, MemoryStore, SqliteStore};
pub use summary::{Progress, Summary, SummaryRange, TimePeriod};
pub use transactions::{
    EXPENSE_CATEGORIES, INCOME_CATEGORIES, SAVINGS_CONTRIBUTION, SAVINGS_WITHDRAWAL, SavingsMeta,
    Transaction, TransactionKind, is_savings_category,
};

mod activity;
pub mod allocate;
mod backup;
mod commands;
mod currency;
mod error;
mod goals;
mod money;
pub mod reconcile;
mod session;
mod store;
mod summary;
mod transactions;
mod util;

pub type ResultEngine<T> = Result<T, EngineError>;
