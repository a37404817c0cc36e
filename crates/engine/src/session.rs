//! The ledger mutator.
//!
//! A [`Session`] owns one user's working copy of the ledger. Every write
//! follows the same steps: validate, change the local copy, tell the store,
//! then reconcile and write back whatever the reconciler corrected. A failed
//! store call never rolls the local copy back; the next reconciliation or
//! [`Session::reload`] converges it.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::{
    Allocation, Backup, Currency, EngineError, GoalEdit, LedgerStore, Money, NewGoal,
    PendingTransaction, ResultEngine, SavingsGoal, Streaks, Summary, SummaryRange, Transaction,
    TransactionDraft, TransactionEdit, activity, allocate, backup, goals, reconcile, summary,
    transactions::{insert_newest_first, is_savings_category},
    util,
};

/// Source of "now" for a session.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub struct Session {
    store: Arc<dyn LedgerStore>,
    user_id: String,
    currency: Currency,
    clock: Clock,
    transactions: Vec<Transaction>,
    goals: Vec<SavingsGoal>,
    activity: Vec<NaiveDate>,
}

/// Logs a failed store call and reports it as a persistence error.
fn store_error(action: &str, err: EngineError) -> EngineError {
    tracing::error!("failed to {action}: {err}");
    match err {
        EngineError::Store(_) => err,
        other => EngineError::Store(format!("failed to {action}: {other}")),
    }
}

/// First error among independent store calls, all of which were attempted.
fn first_error(results: impl IntoIterator<Item = ResultEngine<()>>) -> ResultEngine<()> {
    results.into_iter().collect::<ResultEngine<Vec<()>>>()?;
    Ok(())
}

impl Session {
    /// Return a builder for `Session`. Help to build the struct.
    pub fn builder() -> SessionBuilder {
        SessionBuilder::default()
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }

    // ---- persistence plumbing ----

    async fn load(&mut self) -> ResultEngine<()> {
        let transactions = self
            .store
            .list_transactions(&self.user_id)
            .await
            .map_err(|err| store_error("load transactions", err))?;
        let mut goals = self
            .store
            .list_goals(&self.user_id)
            .await
            .map_err(|err| store_error("load goals", err))?;
        let activity = self
            .store
            .list_activity(&self.user_id)
            .await
            .map_err(|err| store_error("load activity", err))?;

        match goals.iter().filter(|goal| goal.is_unbounded()).count() {
            0 => {
                let general = SavingsGoal::general_savings(self.now());
                self.store
                    .upsert_goals(&self.user_id, std::slice::from_ref(&general))
                    .await
                    .map_err(|err| store_error("create General Savings", err))?;
                tracing::info!("created General Savings for user {}", self.user_id);
                goals.push(general);
            }
            1 => {}
            n => tracing::warn!(
                "user {} has {n} General Savings goals, using the oldest",
                self.user_id
            ),
        }

        self.transactions = transactions;
        self.goals = goals;
        self.activity = activity;
        self.settle().await
    }

    /// Reconciles the local copy and writes back the corrections.
    async fn settle(&mut self) -> ResultEngine<()> {
        let outcome = reconcile::reconcile(&self.transactions, &self.goals);
        if outcome.is_clean() {
            return Ok(());
        }
        tracing::debug!(
            "reconciled: transactions changed {}, {} goal balances moved",
            outcome.transactions_changed,
            outcome.changed_goals.len()
        );
        self.transactions = outcome.transactions;
        self.goals = outcome.goals;

        let mut results = Vec::with_capacity(2);
        if outcome.transactions_changed {
            results.push(
                self.store
                    .upsert_transactions(&self.user_id, &self.transactions)
                    .await
                    .map_err(|err| store_error("save reconciled transactions", err)),
            );
        }
        if !outcome.changed_goals.is_empty() {
            results.push(
                self.store
                    .upsert_goals(&self.user_id, &outcome.changed_goals)
                    .await
                    .map_err(|err| store_error("save reconciled goals", err)),
            );
        }
        first_error(results)
    }

    async fn save_transactions(&self, rows: &[Transaction]) -> ResultEngine<()> {
        self.store
            .upsert_transactions(&self.user_id, rows)
            .await
            .map_err(|err| store_error("save transactions", err))
    }

    async fn save_goals(&self, rows: &[SavingsGoal]) -> ResultEngine<()> {
        self.store
            .upsert_goals(&self.user_id, rows)
            .await
            .map_err(|err| store_error("save goals", err))
    }

    /// Records today as an active day, once per calendar day.
    async fn log_today(&mut self) -> ResultEngine<()> {
        let today = self.today();
        if self.activity.contains(&today) {
            return Ok(());
        }
        self.activity.push(today);
        self.store
            .log_activity(&self.user_id, today)
            .await
            .map_err(|err| store_error("log activity", err))
    }

    fn goal_index(&self, goal_id: Uuid) -> ResultEngine<usize> {
        self.goals
            .iter()
            .position(|goal| goal.id == goal_id)
            .ok_or_else(|| EngineError::KeyNotFound(goal_id.to_string()))
    }

    /// Replaces the local copy with the store's.
    pub async fn reload(&mut self) -> ResultEngine<()> {
        self.load().await
    }

    /// Ends the session, dropping the local copy.
    pub fn sign_out(self) {
        tracing::info!("user {} signed out", self.user_id);
    }

    // ---- transactions ----

    /// Records a plain income or expense.
    pub async fn add_transaction(&mut self, draft: TransactionDraft) -> ResultEngine<Transaction> {
        if is_savings_category(&draft.category) {
            return Err(EngineError::InvalidOperation(
                "savings movements are recorded with contribute or withdraw".to_string(),
            ));
        }
        let tx = Transaction::new(
            draft.kind,
            &draft.category,
            draft.amount,
            draft.date,
            &draft.description,
        )?;
        insert_newest_first(&mut self.transactions, tx.clone());

        let saved = self.save_transactions(std::slice::from_ref(&tx)).await;
        let logged = self.log_today().await;
        let settled = self.settle().await;
        first_error([saved, logged, settled])?;
        Ok(tx)
    }

    /// Changes only the fields set in `edit`. The goal link and balance
    /// snapshot survive unless `unlink_goal` is set; the reconciler then
    /// re-validates the whole chain.
    pub async fn edit_transaction(
        &mut self,
        transaction_id: Uuid,
        edit: TransactionEdit,
    ) -> ResultEngine<Transaction> {
        let index = self
            .transactions
            .iter()
            .position(|tx| tx.id == transaction_id)
            .ok_or_else(|| EngineError::KeyNotFound(transaction_id.to_string()))?;
        let mut updated = self.transactions[index].clone();

        if let Some(kind) = edit.kind {
            updated.kind = kind;
        }
        if let Some(category) = edit.category.as_deref() {
            let category = util::normalize_required_name(category, "category")?;
            if is_savings_category(&category) && category != updated.category {
                return Err(EngineError::InvalidOperation(
                    "savings movements are recorded with contribute or withdraw".to_string(),
                ));
            }
            updated.category = category;
        }
        if let Some(amount) = edit.amount {
            util::ensure_positive(amount)?;
            updated.amount = amount;
        }
        if let Some(date) = edit.date {
            updated.date = date;
        }
        if let Some(description) = edit.description.as_deref() {
            updated.description = description.trim().to_string();
        }
        if edit.unlink_goal {
            updated.goal_id = None;
            updated.savings_meta = None;
            updated.is_valid = true;
            updated.invalidation_reason = None;
        }

        if updated.date == self.transactions[index].date {
            self.transactions[index] = updated.clone();
        } else {
            self.transactions.remove(index);
            insert_newest_first(&mut self.transactions, updated.clone());
        }

        let saved = self.save_transactions(std::slice::from_ref(&updated)).await;
        let settled = self.settle().await;
        first_error([saved, settled])?;
        Ok(self
            .transactions
            .iter()
            .find(|tx| tx.id == transaction_id)
            .cloned()
            .unwrap_or(updated))
    }

    /// Deletes transactions. Later entries of the same goal chain are not
    /// repaired; the reconciler flags them instead.
    pub async fn delete_transactions(&mut self, ids: &[Uuid]) -> ResultEngine<()> {
        if ids.is_empty() {
            return Ok(());
        }
        self.transactions.retain(|tx| !ids.contains(&tx.id));
        let deleted = self
            .store
            .delete_transactions(&self.user_id, ids)
            .await
            .map_err(|err| store_error("delete transactions", err));
        let settled = self.settle().await;
        first_error([deleted, settled])
    }

    // ---- savings flows ----

    async fn apply(&mut self, plan: Allocation) -> ResultEngine<Allocation> {
        for tx in &plan.transactions {
            insert_newest_first(&mut self.transactions, tx.clone());
        }
        for goal in &plan.goals {
            match self.goals.iter_mut().find(|existing| existing.id == goal.id) {
                Some(existing) => *existing = goal.clone(),
                None => self.goals.push(goal.clone()),
            }
        }

        let goals_saved = self.save_goals(&plan.goals).await;
        let txs_saved = self.save_transactions(&plan.transactions).await;
        let logged = self.log_today().await;
        let settled = self.settle().await;
        first_error([goals_saved, txs_saved, logged, settled])?;
        Ok(plan)
    }

    /// Contributes to an existing goal, splitting any excess over its target
    /// into General Savings.
    pub async fn contribute(
        &mut self,
        pending: PendingTransaction,
        goal_id: Uuid,
    ) -> ResultEngine<Allocation> {
        let plan = allocate::contribute(&pending, goal_id, &self.goals, self.currency)?;
        self.apply(plan).await
    }

    /// Creates a goal and posts `pending` as its first contribution.
    pub async fn contribute_to_new_goal(
        &mut self,
        pending: PendingTransaction,
        new_goal: NewGoal,
    ) -> ResultEngine<Allocation> {
        let plan = allocate::contribute_to_new_goal(&pending, &new_goal, &self.goals, self.now())?;
        self.apply(plan).await
    }

    pub async fn withdraw(
        &mut self,
        pending: PendingTransaction,
        goal_id: Uuid,
    ) -> ResultEngine<Allocation> {
        let plan = allocate::withdraw(&pending, goal_id, &self.goals)?;
        self.apply(plan).await
    }

    /// Marks today as active without recording anything (a no-spend day).
    pub async fn check_in(&mut self) -> ResultEngine<()> {
        self.log_today().await
    }

    // ---- goals ----

    pub async fn create_goal(&mut self, new_goal: NewGoal) -> ResultEngine<SavingsGoal> {
        let goal = SavingsGoal::new(
            &new_goal.name,
            new_goal.target,
            new_goal.emoji.as_deref().unwrap_or_default(),
            self.now(),
        )?;
        goals::ensure_unique_name(&self.goals, &goal.name, None)?;
        self.goals.push(goal.clone());
        self.save_goals(std::slice::from_ref(&goal)).await?;
        Ok(goal)
    }

    /// Renames, retargets or re-decorates a goal. General Savings cannot be
    /// edited and a target may not drop below the amount already saved.
    pub async fn edit_goal(&mut self, goal_id: Uuid, edit: GoalEdit) -> ResultEngine<SavingsGoal> {
        let index = self.goal_index(goal_id)?;
        let current = &self.goals[index];
        if current.is_unbounded() {
            return Err(EngineError::InvalidOperation(
                "General Savings cannot be edited".to_string(),
            ));
        }
        if current.is_archived {
            return Err(EngineError::GoalArchived(current.name.clone()));
        }

        let mut updated = current.clone();
        if let Some(name) = edit.name.as_deref() {
            let name = util::normalize_required_name(name, "goal")?;
            goals::ensure_unique_name(&self.goals, &name, Some(goal_id))?;
            updated.name = name;
        }
        if let Some(target) = edit.target {
            util::ensure_target(target)?;
            if target < updated.current_amount {
                return Err(EngineError::InvalidAmount(format!(
                    "target {target} is below the {} already saved",
                    updated.current_amount
                )));
            }
            updated.kind = goals::GoalKind::Targeted { target };
        }
        if let Some(emoji) = edit.emoji.as_deref().map(str::trim).filter(|e| !e.is_empty()) {
            updated.emoji = emoji.to_string();
        }

        self.goals[index] = updated.clone();
        self.save_goals(std::slice::from_ref(&updated)).await?;
        Ok(updated)
    }

    /// Moves a completed goal out of the active list.
    pub async fn archive_goal(&mut self, goal_id: Uuid) -> ResultEngine<SavingsGoal> {
        let index = self.goal_index(goal_id)?;
        let goal = &self.goals[index];
        if goal.is_archived {
            return Ok(goal.clone());
        }
        if !goal.is_complete() {
            return Err(EngineError::InvalidOperation(format!(
                "\"{}\" has not reached its target yet",
                goal.name
            )));
        }
        self.goals[index].is_archived = true;
        let goal = self.goals[index].clone();
        self.save_goals(std::slice::from_ref(&goal)).await?;
        Ok(goal)
    }

    /// Brings an archived goal back, unless an active goal took its name in
    /// the meantime.
    pub async fn unarchive_goal(&mut self, goal_id: Uuid) -> ResultEngine<SavingsGoal> {
        let index = self.goal_index(goal_id)?;
        let goal = &self.goals[index];
        if !goal.is_archived {
            return Ok(goal.clone());
        }
        goals::ensure_unique_name(&self.goals, &goal.name, Some(goal_id))?;
        self.goals[index].is_archived = false;
        let goal = self.goals[index].clone();
        self.save_goals(std::slice::from_ref(&goal)).await?;
        Ok(goal)
    }

    /// Clears the goal's notification and returns it.
    pub async fn mark_notification_read(&mut self, goal_id: Uuid) -> ResultEngine<Option<String>> {
        let index = self.goal_index(goal_id)?;
        let Some(message) = self.goals[index].unread_notification_message.take() else {
            return Ok(None);
        };
        let goal = self.goals[index].clone();
        self.save_goals(std::slice::from_ref(&goal)).await?;
        Ok(Some(message))
    }

    /// Deletes a goal and unlinks its transactions, which keep their amounts
    /// and balance snapshots. When the store refuses, the local copy is
    /// reloaded before the error is returned.
    pub async fn delete_goal(&mut self, goal_id: Uuid) -> ResultEngine<()> {
        let index = self.goal_index(goal_id)?;
        if !self.goals[index].is_deletable() {
            return Err(EngineError::GoalNotDeletable(self.goals[index].name.clone()));
        }

        self.goals.remove(index);
        for tx in &mut self.transactions {
            if tx.goal_id == Some(goal_id) {
                tx.goal_id = None;
            }
        }

        if let Err(err) = self.store.delete_goal(&self.user_id, goal_id).await {
            let err = store_error("delete goal", err);
            if let Err(reload_err) = self.reload().await {
                tracing::error!("failed to reload after goal deletion: {reload_err}");
            }
            return Err(err);
        }
        self.settle().await
    }

    // ---- backup and reset ----

    /// Replaces all transactions and goals with the backup's. The file is
    /// validated before anything is deleted.
    pub async fn restore_backup(&mut self, bytes: &[u8]) -> ResultEngine<()> {
        let backup = Backup::parse(bytes)?;
        tracing::info!(
            "restoring backup {} with {} transactions and {} goals",
            backup.version,
            backup.transactions.len(),
            backup.savings_goals.len()
        );

        let replaced = self.replace_with(&backup).await;
        let reloaded = self.reload().await;
        first_error([replaced, reloaded])
    }

    async fn replace_with(&self, backup: &Backup) -> ResultEngine<()> {
        self.purge(true).await?;
        self.save_goals(&backup.savings_goals).await?;
        // Backups list transactions newest first; stores break date ties by
        // write order.
        let oldest_first: Vec<Transaction> = backup.transactions.iter().rev().cloned().collect();
        self.save_transactions(&oldest_first).await
    }

    /// Deletes every stored transaction and every deletable goal (all goals
    /// when `include_general` is set).
    async fn purge(&self, include_general: bool) -> ResultEngine<()> {
        let stored = self
            .store
            .list_transactions(&self.user_id)
            .await
            .map_err(|err| store_error("list transactions", err))?;
        let ids: Vec<Uuid> = stored.iter().map(|tx| tx.id).collect();
        self.store
            .delete_transactions(&self.user_id, &ids)
            .await
            .map_err(|err| store_error("delete transactions", err))?;

        let goals = self
            .store
            .list_goals(&self.user_id)
            .await
            .map_err(|err| store_error("list goals", err))?;
        for goal in goals
            .iter()
            .filter(|goal| include_general || goal.is_deletable())
        {
            self.store
                .delete_goal(&self.user_id, goal.id)
                .await
                .map_err(|err| store_error("delete goal", err))?;
        }
        Ok(())
    }

    /// Deletes transactions, targeted goals and the activity log. General
    /// Savings survives with a zero balance.
    pub async fn delete_all_data(&mut self) -> ResultEngine<()> {
        let purged = self.purge(false).await;
        let cleared = self
            .store
            .clear_activity(&self.user_id)
            .await
            .map_err(|err| store_error("clear activity", err));
        let reloaded = self.reload().await;
        first_error([purged, cleared, reloaded])
    }

    /// Backup of the local copy as pretty JSON.
    pub fn export_backup(&self) -> ResultEngine<String> {
        Backup::new(self.transactions.clone(), self.goals.clone(), self.now()).to_json()
    }

    pub fn export_csv(&self) -> ResultEngine<String> {
        backup::export_csv(&self.transactions)
    }

    // ---- queries ----

    /// Newest first.
    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn goals(&self) -> &[SavingsGoal] {
        &self.goals
    }

    pub fn goal(&self, goal_id: Uuid) -> Option<&SavingsGoal> {
        self.goals.iter().find(|goal| goal.id == goal_id)
    }

    /// Active goals, General Savings first and completed goals last.
    pub fn active_goals(&self) -> Vec<&SavingsGoal> {
        let mut active: Vec<_> = self.goals.iter().filter(|goal| !goal.is_archived).collect();
        active.sort_by(|a, b| goals::display_order(a, b));
        active
    }

    pub fn archived_goals(&self) -> Vec<&SavingsGoal> {
        self.goals.iter().filter(|goal| goal.is_archived).collect()
    }

    pub fn general_savings(&self) -> ResultEngine<&SavingsGoal> {
        self.goals
            .iter()
            .find(|goal| goal.is_unbounded())
            .ok_or(EngineError::MissingGeneralSavings)
    }

    /// The goal's transactions, newest first.
    pub fn goal_log(&self, goal_id: Uuid) -> ResultEngine<Vec<&Transaction>> {
        self.goal_index(goal_id)?;
        Ok(self
            .transactions
            .iter()
            .filter(|tx| tx.goal_id == Some(goal_id))
            .collect())
    }

    pub fn withdrawal_candidates(&self, amount: Money) -> Vec<&SavingsGoal> {
        allocate::withdrawal_candidates(&self.goals, amount)
    }

    pub fn summary(&self, range: SummaryRange) -> Summary {
        summary::summarize(&self.transactions, range, self.today())
    }

    pub fn activity(&self) -> &[NaiveDate] {
        &self.activity
    }

    pub fn streaks(&self) -> Streaks {
        activity::streaks(&self.activity, self.today())
    }
}

/// The builder for `Session`
#[derive(Default)]
pub struct SessionBuilder {
    store: Option<Arc<dyn LedgerStore>>,
    user_id: Option<String>,
    currency: Currency,
    clock: Option<Clock>,
}

impl SessionBuilder {
    /// Pass the required store
    pub fn store(mut self, store: Arc<dyn LedgerStore>) -> SessionBuilder {
        self.store = Some(store);
        self
    }

    /// Pass the required user id
    pub fn user_id(mut self, user_id: impl Into<String>) -> SessionBuilder {
        self.user_id = Some(user_id.into());
        self
    }

    /// Currency used in notifications. Defaults to USD.
    pub fn currency(mut self, currency: Currency) -> SessionBuilder {
        self.currency = currency;
        self
    }

    /// Defaults to the system clock.
    pub fn clock(
        mut self,
        clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static,
    ) -> SessionBuilder {
        let clock: Clock = Arc::new(clock);
        self.clock = Some(clock);
        self
    }

    /// Loads the user's ledger, creating General Savings if needed, and
    /// reconciles it.
    pub async fn start(self) -> ResultEngine<Session> {
        let store = self
            .store
            .ok_or_else(|| EngineError::InvalidOperation("a store is required".to_string()))?;
        let user_id = self
            .user_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| EngineError::InvalidName("user id must not be empty".to_string()))?;

        let mut session = Session {
            store,
            user_id,
            currency: self.currency,
            clock: self.clock.unwrap_or_else(|| -> Clock { Arc::new(Utc::now) }),
            transactions: Vec::new(),
            goals: Vec::new(),
            activity: Vec::new(),
        };
        session.load().await?;
        tracing::info!("session started for user {}", session.user_id);
        Ok(session)
    }
}
