use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use engine::{Money, TimePeriod, TransactionKind};

#[derive(Parser, Debug)]
#[command(name = "finquest")]
#[command(about = "Savings ledger with goals, spillover and streaks")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Optional config file path (TOML).
    #[arg(long, global = true)]
    pub config: Option<String>,
    /// Override the database connection string.
    #[arg(long, global = true)]
    pub database_url: Option<String>,
    /// Override the user whose ledger is opened.
    #[arg(long, global = true)]
    pub user: Option<String>,
    /// Override the display currency (e.g. USD, EUR, KES).
    #[arg(long, global = true)]
    pub currency: Option<String>,
    /// Override the log level.
    #[arg(long, global = true)]
    pub level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Plain income and expenses.
    Tx(Tx),
    /// Savings goals.
    Goal(Goal),
    /// Contribute to a goal; anything over its target goes to General Savings.
    Save(SaveArgs),
    /// Take money out of a goal.
    Withdraw(WithdrawArgs),
    /// Log today as active without recording anything.
    CheckIn,
    /// Current and longest activity streak.
    Streak,
    /// Totals for a period or a date range.
    Summary(RangeArgs),
    /// AI coaching note on recent transactions.
    Insight,
    /// Period report with an AI written summary.
    Report(RangeArgs),
    /// Backup files.
    Backup(Backup),
    /// Write every transaction as CSV.
    ExportCsv(OutputArgs),
    /// Delete every transaction, goal and activity day of the user.
    Reset(ResetArgs),
}

#[derive(Args, Debug)]
pub struct Tx {
    #[command(subcommand)]
    pub command: TxCommand,
}

#[derive(Subcommand, Debug)]
pub enum TxCommand {
    Add(TxAddArgs),
    Edit(TxEditArgs),
    Delete(TxDeleteArgs),
    List(TxListArgs),
}

#[derive(Args, Debug)]
pub struct TxAddArgs {
    #[arg(value_parser = parse_kind)]
    pub kind: TransactionKind,
    #[arg(value_parser = parse_money)]
    pub amount: Money,
    #[arg(long)]
    pub category: String,
    #[arg(long)]
    pub description: Option<String>,
    /// Day of the transaction (YYYY-MM-DD). Defaults to now.
    #[arg(long)]
    pub date: Option<NaiveDate>,
}

#[derive(Args, Debug)]
pub struct TxEditArgs {
    pub id: uuid::Uuid,
    #[arg(long, value_parser = parse_kind)]
    pub kind: Option<TransactionKind>,
    #[arg(long, value_parser = parse_money)]
    pub amount: Option<Money>,
    #[arg(long)]
    pub category: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long)]
    pub date: Option<NaiveDate>,
    /// Detach the transaction from its goal.
    #[arg(long)]
    pub unlink_goal: bool,
}

#[derive(Args, Debug)]
pub struct TxDeleteArgs {
    #[arg(required = true)]
    pub ids: Vec<uuid::Uuid>,
}

#[derive(Args, Debug)]
pub struct TxListArgs {
    /// Show at most this many, newest first.
    #[arg(long)]
    pub limit: Option<usize>,
    /// Only transactions flagged by the reconciler.
    #[arg(long)]
    pub invalid: bool,
}

#[derive(Args, Debug)]
pub struct Goal {
    #[command(subcommand)]
    pub command: GoalCommand,
}

#[derive(Subcommand, Debug)]
pub enum GoalCommand {
    Create(GoalCreateArgs),
    Edit(GoalEditArgs),
    Archive(GoalRef),
    Unarchive(GoalRef),
    Delete(GoalRef),
    /// Show and clear the goal's unread notification.
    Read(GoalRef),
    /// Transactions linked to the goal.
    Log(GoalRef),
    List(GoalListArgs),
}

/// A goal id or its name.
#[derive(Args, Debug)]
pub struct GoalRef {
    pub goal: String,
}

#[derive(Args, Debug)]
pub struct GoalCreateArgs {
    pub name: String,
    #[arg(long, value_parser = parse_money)]
    pub target: Money,
    #[arg(long)]
    pub emoji: Option<String>,
}

#[derive(Args, Debug)]
pub struct GoalEditArgs {
    pub goal: String,
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long, value_parser = parse_money)]
    pub target: Option<Money>,
    #[arg(long)]
    pub emoji: Option<String>,
}

#[derive(Args, Debug)]
pub struct GoalListArgs {
    #[arg(long)]
    pub archived: bool,
}

#[derive(Args, Debug)]
pub struct SaveArgs {
    #[arg(value_parser = parse_money)]
    pub amount: Money,
    /// Existing goal id or name.
    #[arg(long, conflicts_with = "new_goal")]
    pub goal: Option<String>,
    /// Create a goal with this name and contribute to it.
    #[arg(long, requires = "target")]
    pub new_goal: Option<String>,
    #[arg(long, value_parser = parse_money)]
    pub target: Option<Money>,
    #[arg(long)]
    pub emoji: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long)]
    pub date: Option<NaiveDate>,
}

#[derive(Args, Debug)]
pub struct WithdrawArgs {
    #[arg(value_parser = parse_money)]
    pub amount: Money,
    /// Goal id or name. Without it, the goals able to cover the amount are
    /// listed.
    #[arg(long)]
    pub goal: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long)]
    pub date: Option<NaiveDate>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum Period {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl From<Period> for TimePeriod {
    fn from(value: Period) -> Self {
        match value {
            Period::Daily => TimePeriod::Daily,
            Period::Weekly => TimePeriod::Weekly,
            Period::Monthly => TimePeriod::Monthly,
            Period::Yearly => TimePeriod::Yearly,
        }
    }
}

#[derive(Args, Debug)]
pub struct RangeArgs {
    #[arg(long, value_enum, conflicts_with_all = ["from", "to"])]
    pub period: Option<Period>,
    #[arg(long)]
    pub from: Option<NaiveDate>,
    #[arg(long)]
    pub to: Option<NaiveDate>,
}

#[derive(Args, Debug)]
pub struct Backup {
    #[command(subcommand)]
    pub command: BackupCommand,
}

#[derive(Subcommand, Debug)]
pub enum BackupCommand {
    Export(OutputArgs),
    /// Replace the whole ledger with the content of a backup file.
    Restore(RestoreArgs),
}

#[derive(Args, Debug)]
pub struct OutputArgs {
    /// Write to this file instead of stdout.
    #[arg(long, short)]
    pub output: Option<std::path::PathBuf>,
}

#[derive(Args, Debug)]
pub struct RestoreArgs {
    pub file: std::path::PathBuf,
    #[arg(long)]
    pub yes: bool,
}

#[derive(Args, Debug)]
pub struct ResetArgs {
    #[arg(long)]
    pub yes: bool,
}

fn parse_money(raw: &str) -> Result<Money, String> {
    raw.parse::<Money>().map_err(|err| err.to_string())
}

fn parse_kind(raw: &str) -> Result<TransactionKind, String> {
    TransactionKind::try_from(raw).map_err(|err| err.to_string())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_save_with_new_goal() {
        let cli = Cli::try_parse_from([
            "finquest",
            "--user",
            "ada",
            "save",
            "25,50",
            "--new-goal",
            "Bike",
            "--target",
            "300",
        ])
        .unwrap();
        assert_eq!(cli.global.user.as_deref(), Some("ada"));
        let Command::Save(args) = cli.command else {
            panic!("expected save");
        };
        assert_eq!(args.amount, Money::new(2_550));
        assert_eq!(args.new_goal.as_deref(), Some("Bike"));
        assert_eq!(args.target, Some(Money::units(300)));
    }

    #[test]
    fn new_goal_requires_target() {
        assert!(Cli::try_parse_from(["finquest", "save", "10", "--new-goal", "Bike"]).is_err());
    }

    #[test]
    fn rejects_three_decimals() {
        let parsed = Cli::try_parse_from([
            "finquest",
            "tx",
            "add",
            "expense",
            "1.234",
            "--category",
            "Food",
        ]);
        assert!(parsed.is_err());
    }
}
