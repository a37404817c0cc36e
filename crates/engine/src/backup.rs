//! Backup files and CSV export.
//!
//! A backup is a single JSON document holding every transaction and goal of
//! a user. Restores are destructive, so a file is fully parsed and validated
//! before anything is deleted.

use std::collections::HashSet;

use chrono::{DateTime, SecondsFormat, Utc};
use csv::Writer;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{EngineError, Money, ResultEngine, SavingsGoal, Transaction};

pub const BACKUP_VERSION: &str = "2.0.0";
const COMPATIBLE_PREFIX: &str = "2.0";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Backup {
    pub transactions: Vec<Transaction>,
    pub savings_goals: Vec<SavingsGoal>,
    #[serde(default)]
    pub exported_at: Option<DateTime<Utc>>,
    pub version: String,
}

impl Backup {
    pub fn new(
        transactions: Vec<Transaction>,
        savings_goals: Vec<SavingsGoal>,
        exported_at: DateTime<Utc>,
    ) -> Self {
        Self {
            transactions,
            savings_goals,
            exported_at: Some(exported_at),
            version: BACKUP_VERSION.to_string(),
        }
    }

    /// Parses and validates a backup file.
    ///
    /// Rejected with [`EngineError::BackupFormat`]: anything that is not
    /// JSON, a version not starting with `2.0`, missing `transactions` or
    /// `savingsGoals` arrays, malformed records, duplicate ids, non-positive
    /// amounts, and more than one General Savings goal.
    pub fn parse(bytes: &[u8]) -> ResultEngine<Self> {
        let value: Value = serde_json::from_slice(bytes)
            .map_err(|err| EngineError::BackupFormat(format!("not a JSON document: {err}")))?;

        let version = value
            .get("version")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if !version.starts_with(COMPATIBLE_PREFIX) {
            return Err(EngineError::BackupFormat(format!(
                "unsupported version \"{version}\""
            )));
        }
        for field in ["transactions", "savingsGoals"] {
            if !value.get(field).is_some_and(Value::is_array) {
                return Err(EngineError::BackupFormat(format!("missing \"{field}\" array")));
            }
        }

        let backup: Backup = serde_json::from_value(value)
            .map_err(|err| EngineError::BackupFormat(err.to_string()))?;
        backup.validate()?;
        Ok(backup)
    }

    fn validate(&self) -> ResultEngine<()> {
        let mut seen = HashSet::new();
        for tx in &self.transactions {
            if !seen.insert(tx.id) {
                return Err(EngineError::BackupFormat(format!(
                    "duplicate transaction id {}",
                    tx.id
                )));
            }
            if !tx.amount.is_positive() {
                return Err(EngineError::BackupFormat(format!(
                    "transaction {} has a non-positive amount",
                    tx.id
                )));
            }
            if tx.amount > Money::MAX {
                return Err(EngineError::BackupFormat(format!(
                    "transaction {} exceeds the {} limit",
                    tx.id,
                    Money::MAX
                )));
            }
        }

        seen.clear();
        for goal in &self.savings_goals {
            if !seen.insert(goal.id) {
                return Err(EngineError::BackupFormat(format!(
                    "duplicate goal id {}",
                    goal.id
                )));
            }
            if goal.target().is_some_and(|target| target > Money::MAX) {
                return Err(EngineError::BackupFormat(format!(
                    "goal {} exceeds the {} limit",
                    goal.id,
                    Money::MAX
                )));
            }
        }
        let unbounded = self
            .savings_goals
            .iter()
            .filter(|goal| goal.is_unbounded())
            .count();
        if unbounded > 1 {
            return Err(EngineError::BackupFormat(format!(
                "{unbounded} non-deletable goals, expected at most one"
            )));
        }
        Ok(())
    }

    pub fn to_json(&self) -> ResultEngine<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[derive(Serialize)]
struct CsvRow<'a> {
    id: String,
    #[serde(rename = "type")]
    kind: &'static str,
    category: &'a str,
    amount: String,
    date: String,
    description: &'a str,
    goal_id: String,
}

const CSV_HEADER: [&str; 7] = [
    "id",
    "type",
    "category",
    "amount",
    "date",
    "description",
    "goal_id",
];

/// Exports transactions as CSV with an
/// `id,type,category,amount,date,description,goal_id` header. An empty ledger
/// yields the header line alone.
pub fn export_csv(transactions: &[Transaction]) -> ResultEngine<String> {
    let mut writer = Writer::from_writer(vec![]);
    if transactions.is_empty() {
        writer.write_record(CSV_HEADER)?;
    }
    for tx in transactions {
        writer.serialize(CsvRow {
            id: tx.id.to_string(),
            kind: tx.kind.as_str(),
            category: &tx.category,
            amount: tx.amount.to_string(),
            date: tx.date.to_rfc3339_opts(SecondsFormat::Millis, true),
            description: &tx.description,
            goal_id: tx.goal_id.map(|id| id.to_string()).unwrap_or_default(),
        })?;
    }
    let data = writer
        .into_inner()
        .map_err(|err| EngineError::InvalidOperation(format!("failed to finalize export: {err}")))?;
    String::from_utf8(data)
        .map_err(|err| EngineError::InvalidOperation(format!("export is not UTF-8: {err}")))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::TransactionKind;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, 1, 9, 15, 0).unwrap()
    }

    #[test]
    fn rejects_old_versions_and_missing_arrays() {
        let old = br#"{"version":"1.4.0","transactions":[],"savingsGoals":[]}"#;
        assert!(matches!(
            Backup::parse(old),
            Err(EngineError::BackupFormat(_))
        ));

        let missing = br#"{"version":"2.0.0","transactions":[]}"#;
        assert!(matches!(
            Backup::parse(missing),
            Err(EngineError::BackupFormat(_))
        ));

        assert!(matches!(
            Backup::parse(b"not json"),
            Err(EngineError::BackupFormat(_))
        ));
    }

    #[test]
    fn accepts_any_2_0_revision() {
        let json = br#"{"version":"2.0.3","transactions":[],"savingsGoals":[]}"#;
        let backup = Backup::parse(json).unwrap();
        assert!(backup.transactions.is_empty());
        assert_eq!(backup.exported_at, None);
    }

    #[test]
    fn rejects_two_general_savings_goals() {
        let goals = vec![
            SavingsGoal::general_savings(at()),
            SavingsGoal::general_savings(at()),
        ];
        let json = Backup::new(vec![], goals, at()).to_json().unwrap();
        let err = Backup::parse(json.as_bytes()).unwrap_err();
        assert!(matches!(err, EngineError::BackupFormat(_)));
    }

    #[test]
    fn export_then_parse_keeps_everything() {
        let goal = SavingsGoal::new("Trip", Money::units(300), "✈️", at()).unwrap();
        let tx = Transaction::new(TransactionKind::Income, "Salary", Money::new(150_075), at(), "")
            .unwrap();
        let backup = Backup::new(vec![tx], vec![goal], at());

        let json = backup.to_json().unwrap();
        assert!(json.contains("\"savingsGoals\""));
        assert!(json.contains("\"exportedAt\""));
        assert_eq!(Backup::parse(json.as_bytes()).unwrap(), backup);
    }

    #[test]
    fn csv_quotes_commas_and_quotes() {
        let tx = Transaction::new(
            TransactionKind::Expense,
            "Food",
            Money::new(1_250),
            at(),
            "pizza, \"large\"",
        )
        .unwrap();

        let csv = export_csv(std::slice::from_ref(&tx)).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some("id,type,category,amount,date,description,goal_id")
        );
        assert_eq!(
            lines.next().unwrap(),
            format!(
                "{},expense,Food,12.50,2025-07-01T09:15:00.000Z,\"pizza, \"\"large\"\"\",",
                tx.id
            )
        );
    }

    #[test]
    fn empty_csv_is_header_only() {
        let csv = export_csv(&[]).unwrap();
        assert_eq!(csv, "id,type,category,amount,date,description,goal_id\n");
    }

    #[test]
    fn rejects_amounts_above_the_limit() {
        let goal = SavingsGoal::new("Yacht", Money::units(1_000), "", at()).unwrap();
        let mut txs = Vec::new();
        for _ in 0..2 {
            let mut tx = Transaction::new(
                TransactionKind::Expense,
                crate::SAVINGS_CONTRIBUTION,
                Money::units(1),
                at(),
                "",
            )
            .unwrap();
            tx.amount = Money::units(50_000_000_000_000_000);
            tx.goal_id = Some(goal.id);
            txs.push(tx);
        }
        let json = Backup::new(txs, vec![goal.clone()], at()).to_json().unwrap();
        let err = Backup::parse(json.as_bytes()).unwrap_err();
        assert!(matches!(err, EngineError::BackupFormat(_)));

        let mut huge = goal;
        huge.kind = crate::GoalKind::Targeted {
            target: Money::MAX + Money::new(1),
        };
        let json = Backup::new(vec![], vec![huge], at()).to_json().unwrap();
        let err = Backup::parse(json.as_bytes()).unwrap_err();
        assert!(matches!(err, EngineError::BackupFormat(_)));
    }
}
