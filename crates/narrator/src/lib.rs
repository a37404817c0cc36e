//! Narrative summaries of a user's transactions, written by a hosted
//! language model.
//!
//! Narratives are decoration: a [`NarrativeService`] always answers with a
//! string. When no API key is configured, or the model cannot be reached,
//! the fixed fallback texts below are returned instead.

use async_trait::async_trait;
use engine::{Currency, Money, Transaction};
use serde::Serialize;

pub use error::{NarratorError, Result};
pub use gemini::GeminiNarrator;

mod error;
mod gemini;

pub const INSIGHT_OFFLINE: &str =
    "✨ Fin's AI features are currently offline. Please check the API key configuration.";
pub const INSIGHT_FAILED: &str = "Failed to communicate with the AI assistant.";
pub const SUMMARY_OFFLINE: &str =
    "AI summary is unavailable because the API key has not been configured.";
pub const SUMMARY_FAILED: &str = "Failed to generate AI summary for the report.";

/// Report summaries look at this many transactions at most.
pub const REPORT_SAMPLE: usize = 20;

#[async_trait]
pub trait NarrativeService: Send + Sync {
    /// Short, upbeat coaching note about recent activity.
    async fn insight(&self, transactions: &[Transaction], currency: Currency) -> String;

    /// Formal paragraph for a period report.
    async fn report_summary(
        &self,
        transactions: &[Transaction],
        total_income: Money,
        total_expense: Money,
        currency: Currency,
    ) -> String;
}

/// What the model gets to see of a transaction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimplifiedTransaction {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub category: String,
    pub amount: f64,
    pub date: String,
}

impl From<&Transaction> for SimplifiedTransaction {
    fn from(tx: &Transaction) -> Self {
        Self {
            kind: tx.kind.as_str(),
            category: tx.category.clone(),
            amount: tx.amount.to_major(),
            date: tx.date.format("%-m/%-d/%Y").to_string(),
        }
    }
}

fn simplify(transactions: &[Transaction]) -> Result<String> {
    let simplified: Vec<SimplifiedTransaction> =
        transactions.iter().map(SimplifiedTransaction::from).collect();
    Ok(serde_json::to_string_pretty(&simplified)?)
}

pub(crate) fn insight_prompt(transactions: &[Transaction], currency: Currency) -> Result<String> {
    Ok(format!(
        "You are Fin, a cheerful coach in a personal finance adventure game.\n\
         Amounts are in {code}.\n\
         From the transactions below write, in under 150 words and with a few emojis:\n\
         1. a short encouraging summary of the activity;\n\
         2. the category with the highest spending;\n\
         3. one practical saving tip, quoting amounts with the {symbol} symbol;\n\
         4. that tip framed as a quest or challenge.\n\n\
         Transactions:\n{data}\n",
        code = currency.code(),
        symbol = currency.symbol(),
        data = simplify(transactions)?,
    ))
}

pub(crate) fn report_prompt(
    transactions: &[Transaction],
    total_income: Money,
    total_expense: Money,
    currency: Currency,
) -> Result<String> {
    let sample = &transactions[..transactions.len().min(REPORT_SAMPLE)];
    Ok(format!(
        "You are Fin, a financial analyst writing the summary of a formal report.\n\
         Amounts are in {code}. In under 80 words, with no emojis and no game framing, cover:\n\
         1. income against expenses for the period;\n\
         2. one observation about where the spending went;\n\
         3. a positive closing remark.\n\n\
         Total income: {total_income}\n\
         Total expense: {total_expense}\n\
         Sample transactions:\n{data}\n",
        code = currency.code(),
        data = simplify(sample)?,
    ))
}

/// A narrator that never calls out, used when AI features are disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineNarrator;

#[async_trait]
impl NarrativeService for OfflineNarrator {
    async fn insight(&self, _transactions: &[Transaction], _currency: Currency) -> String {
        INSIGHT_OFFLINE.to_string()
    }

    async fn report_summary(
        &self,
        _transactions: &[Transaction],
        _total_income: Money,
        _total_expense: Money,
        _currency: Currency,
    ) -> String {
        SUMMARY_OFFLINE.to_string()
    }
}
