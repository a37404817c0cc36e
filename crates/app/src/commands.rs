//! Runs one parsed command against an open session and prints the outcome.

use chrono::{DateTime, NaiveDate, Utc};
use engine::{
    Allocation, GoalEdit, Money, NewGoal, PendingTransaction, SavingsGoal, Session, SummaryRange,
    TimePeriod, Transaction, TransactionDraft, TransactionEdit,
};
use narrator::NarrativeService;
use uuid::Uuid;

use crate::{
    cli::{
        BackupCommand, Command, GoalCommand, OutputArgs, RangeArgs, SaveArgs, TxCommand,
        WithdrawArgs,
    },
    error::{AppError, Result},
};

pub async fn run(
    session: &mut Session,
    narrator: &dyn NarrativeService,
    command: Command,
) -> Result<()> {
    match command {
        Command::Tx(tx) => run_tx(session, tx.command).await,
        Command::Goal(goal) => run_goal(session, goal.command).await,
        Command::Save(args) => save(session, args).await,
        Command::Withdraw(args) => withdraw(session, args).await,
        Command::CheckIn => {
            session.check_in().await?;
            let streaks = session.streaks();
            println!("Checked in. Current streak: {} day(s)", streaks.current);
            Ok(())
        }
        Command::Streak => {
            let streaks = session.streaks();
            println!(
                "Current streak: {} day(s), longest: {} day(s)",
                streaks.current, streaks.longest
            );
            Ok(())
        }
        Command::Summary(range) => {
            print_summary(session, summary_range(&range));
            Ok(())
        }
        Command::Insight => {
            let text = narrator
                .insight(session.transactions(), session.currency())
                .await;
            println!("{text}");
            Ok(())
        }
        Command::Report(range) => {
            let range = summary_range(&range);
            let summary = print_summary(session, range);
            let text = narrator
                .report_summary(
                    &summary.transactions,
                    summary.total_income,
                    summary.total_expense,
                    session.currency(),
                )
                .await;
            println!("\n{text}");
            Ok(())
        }
        Command::Backup(backup) => match backup.command {
            BackupCommand::Export(out) => write_output(&out, &session.export_backup()?),
            BackupCommand::Restore(args) => {
                if !args.yes {
                    return Err(AppError::Input(
                        "restoring replaces all data, pass --yes to confirm".to_string(),
                    ));
                }
                let bytes = std::fs::read(&args.file)?;
                session.restore_backup(&bytes).await?;
                println!(
                    "Restored {} transaction(s) and {} goal(s)",
                    session.transactions().len(),
                    session.goals().len()
                );
                Ok(())
            }
        },
        Command::ExportCsv(out) => {
            if session.transactions().is_empty() {
                return Err(AppError::Input("no transaction data to export".to_string()));
            }
            write_output(&out, &session.export_csv()?)
        }
        Command::Reset(args) => {
            if !args.yes {
                return Err(AppError::Input(
                    "this deletes all data, pass --yes to confirm".to_string(),
                ));
            }
            session.delete_all_data().await?;
            println!("All data deleted");
            Ok(())
        }
    }
}

async fn run_tx(session: &mut Session, command: TxCommand) -> Result<()> {
    match command {
        TxCommand::Add(args) => {
            let mut draft =
                TransactionDraft::new(args.kind, args.category, args.amount, when(args.date));
            if let Some(description) = args.description {
                draft = draft.description(description);
            }
            let tx = session.add_transaction(draft).await?;
            println!("Added {}", tx.id);
        }
        TxCommand::Edit(args) => {
            let mut edit = TransactionEdit::new();
            if let Some(kind) = args.kind {
                edit = edit.kind(kind);
            }
            if let Some(category) = args.category {
                edit = edit.category(category);
            }
            if let Some(amount) = args.amount {
                edit = edit.amount(amount);
            }
            if let Some(date) = args.date {
                edit = edit.date(when(Some(date)));
            }
            if let Some(description) = args.description {
                edit = edit.description(description);
            }
            if args.unlink_goal {
                edit = edit.unlink_goal();
            }
            if edit.is_empty() {
                return Err(AppError::Input("nothing to change".to_string()));
            }
            let tx = session.edit_transaction(args.id, edit).await?;
            print_transaction(session, &tx);
        }
        TxCommand::Delete(args) => {
            session.delete_transactions(&args.ids).await?;
            println!("Deleted {} transaction(s)", args.ids.len());
        }
        TxCommand::List(args) => {
            let listed = session
                .transactions()
                .iter()
                .filter(|tx| !args.invalid || !tx.is_valid)
                .take(args.limit.unwrap_or(usize::MAX));
            for tx in listed {
                print_transaction(session, tx);
            }
        }
    }
    Ok(())
}

async fn run_goal(session: &mut Session, command: GoalCommand) -> Result<()> {
    match command {
        GoalCommand::Create(args) => {
            let mut new_goal = NewGoal::new(args.name, args.target);
            if let Some(emoji) = args.emoji {
                new_goal = new_goal.emoji(emoji);
            }
            let goal = session.create_goal(new_goal).await?;
            print_goal(session, &goal);
        }
        GoalCommand::Edit(args) => {
            let goal_id = resolve_goal(session, &args.goal)?;
            let mut edit = GoalEdit::new();
            if let Some(name) = args.name {
                edit = edit.name(name);
            }
            if let Some(target) = args.target {
                edit = edit.target(target);
            }
            if let Some(emoji) = args.emoji {
                edit = edit.emoji(emoji);
            }
            let goal = session.edit_goal(goal_id, edit).await?;
            print_goal(session, &goal);
        }
        GoalCommand::Archive(goal) => {
            let goal_id = resolve_goal(session, &goal.goal)?;
            let goal = session.archive_goal(goal_id).await?;
            println!("Archived {}", goal.name);
        }
        GoalCommand::Unarchive(goal) => {
            let goal_id = resolve_goal(session, &goal.goal)?;
            let goal = session.unarchive_goal(goal_id).await?;
            println!("Unarchived {}", goal.name);
        }
        GoalCommand::Delete(goal) => {
            let goal_id = resolve_goal(session, &goal.goal)?;
            session.delete_goal(goal_id).await?;
            println!("Deleted goal {goal_id}");
        }
        GoalCommand::Read(goal) => {
            let goal_id = resolve_goal(session, &goal.goal)?;
            match session.mark_notification_read(goal_id).await? {
                Some(message) => println!("{message}"),
                None => println!("No unread notification"),
            }
        }
        GoalCommand::Log(goal) => {
            let goal_id = resolve_goal(session, &goal.goal)?;
            for tx in session.goal_log(goal_id)? {
                print_transaction(session, tx);
            }
        }
        GoalCommand::List(args) => {
            let goals = if args.archived {
                session.archived_goals()
            } else {
                session.active_goals()
            };
            for goal in goals {
                print_goal(session, goal);
            }
        }
    }
    Ok(())
}

async fn save(session: &mut Session, args: SaveArgs) -> Result<()> {
    let mut pending = PendingTransaction::new(args.amount, when(args.date));
    if let Some(description) = args.description {
        pending = pending.description(description);
    }
    let allocation = match (args.goal, args.new_goal, args.target) {
        (Some(goal), None, _) => {
            let goal_id = resolve_goal(session, &goal)?;
            session.contribute(pending, goal_id).await?
        }
        (None, Some(name), Some(target)) => {
            let mut new_goal = NewGoal::new(name, target);
            if let Some(emoji) = args.emoji {
                new_goal = new_goal.emoji(emoji);
            }
            session.contribute_to_new_goal(pending, new_goal).await?
        }
        (None, None, _) => {
            let goal_id = session.general_savings()?.id;
            session.contribute(pending, goal_id).await?
        }
        _ => {
            return Err(AppError::Input(
                "pass either --goal or --new-goal with --target".to_string(),
            ));
        }
    };
    print_allocation(session, &allocation);
    Ok(())
}

async fn withdraw(session: &mut Session, args: WithdrawArgs) -> Result<()> {
    let Some(goal) = args.goal else {
        let candidates = session.withdrawal_candidates(args.amount);
        if candidates.is_empty() {
            println!(
                "No goal holds {}",
                session.currency().format(args.amount)
            );
        }
        for goal in candidates {
            print_goal(session, goal);
        }
        return Ok(());
    };
    let goal_id = resolve_goal(session, &goal)?;
    let mut pending = PendingTransaction::new(args.amount, when(args.date));
    if let Some(description) = args.description {
        pending = pending.description(description);
    }
    let allocation = session.withdraw(pending, goal_id).await?;
    print_allocation(session, &allocation);
    Ok(())
}

/// A goal is named by id, or by name with active goals taking precedence.
fn resolve_goal(session: &Session, raw: &str) -> Result<Uuid> {
    if let Ok(id) = Uuid::parse_str(raw.trim()) {
        return Ok(id);
    }
    let wanted = raw.trim().to_lowercase();
    let mut matches: Vec<&SavingsGoal> = session
        .goals()
        .iter()
        .filter(|goal| goal.name.to_lowercase() == wanted)
        .collect();
    matches.sort_by_key(|goal| goal.is_archived);
    matches
        .first()
        .map(|goal| goal.id)
        .ok_or_else(|| AppError::Input(format!("no goal named \"{}\"", raw.trim())))
}

/// A day given on the command line keeps the current time of day, so
/// entries of the same day stay in insertion order.
fn when(date: Option<NaiveDate>) -> DateTime<Utc> {
    let now = Utc::now();
    date.map_or(now, |day| day.and_time(now.time()).and_utc())
}

fn summary_range(range: &RangeArgs) -> SummaryRange {
    match range.period {
        Some(period) => SummaryRange::Period(period.into()),
        None if range.from.is_some() || range.to.is_some() => SummaryRange::Dates {
            start: range.from,
            end: range.to,
        },
        None => SummaryRange::Period(TimePeriod::default()),
    }
}

fn print_summary(session: &Session, range: SummaryRange) -> engine::Summary {
    let currency = session.currency();
    let summary = session.summary(range);
    println!("{}", summary.title);
    println!("  income:  {}", currency.format(summary.total_income));
    println!("  expense: {}", currency.format(summary.total_expense));
    println!("  balance: {}", currency.format(summary.balance));
    if let Some(tx) = &summary.largest_income {
        println!("  largest income:  {} {}", currency.format(tx.amount), tx.category);
    }
    if let Some(tx) = &summary.largest_expense {
        println!("  largest expense: {} {}", currency.format(tx.amount), tx.category);
    }
    for (category, total) in &summary.expense_by_category {
        println!("    {category}: {}", currency.format(*total));
    }
    println!(
        "  level {} ({} xp)",
        summary.progress.level, summary.progress.xp
    );
    summary
}

fn print_allocation(session: &Session, allocation: &Allocation) {
    for tx in &allocation.transactions {
        print_transaction(session, tx);
    }
    for goal in &allocation.goals {
        if let Some(message) = &goal.unread_notification_message {
            println!("{} {}: {message}", goal.emoji, goal.name);
        }
    }
    // The selected goal always comes first in the plan.
    if allocation.completed
        && let Some(goal) = allocation.goals.first()
    {
        println!("Quest complete: {} {}", goal.emoji, goal.name);
    }
}

fn print_transaction(session: &Session, tx: &Transaction) {
    let flag = match &tx.invalidation_reason {
        Some(reason) if !tx.is_valid => format!("  [{reason}]"),
        _ => String::new(),
    };
    println!(
        "{}  {}  {:<7}  {:>12}  {:<20}  {}{flag}",
        tx.id,
        tx.date.format("%Y-%m-%d"),
        tx.kind.as_str(),
        session.currency().format(tx.amount),
        tx.category,
        tx.description,
    );
}

fn print_goal(session: &Session, goal: &SavingsGoal) {
    let currency = session.currency();
    let target = goal
        .target()
        .map_or_else(|| "no limit".to_string(), |target| currency.format(target));
    let mut status = String::new();
    if goal.is_complete() {
        status.push_str("  complete");
    }
    if goal.unread_notification_message.is_some() {
        status.push_str("  (unread)");
    }
    println!(
        "{}  {} {:<24} {:>12} / {}{status}",
        goal.id,
        goal.emoji,
        goal.name,
        currency.format(goal.current_amount),
        target,
    );
}

fn write_output(out: &OutputArgs, content: &str) -> Result<()> {
    match &out.output {
        Some(path) => {
            std::fs::write(path, content)?;
            println!("Written {}", path.display());
        }
        None => println!("{content}"),
    }
    Ok(())
}
