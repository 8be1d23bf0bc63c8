use std::io::Read;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::models::{NewTransaction, TransactionKind};

#[derive(Debug, Deserialize)]
struct CsvTransactionRow {
    date: String,
    #[serde(rename = "type")]
    kind: String,
    amount: String,
    #[serde(default)]
    description: Option<String>,
}

/// Parse transaction CSV.
/// Expected columns: date (YYYY-MM-DD), type (INCOME/EXPENSE), amount, description (optional).
/// Amounts must be non-negative; direction comes from `type`.
pub fn parse_transactions_csv<R: Read>(reader: R) -> Result<Vec<NewTransaction>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut rows = Vec::new();
    for (line, record) in reader.deserialize::<CsvTransactionRow>().enumerate() {
        // header is line 1
        let line = line + 2;
        let row = record.with_context(|| format!("malformed CSV row at line {}", line))?;

        let date = NaiveDate::parse_from_str(&row.date, "%Y-%m-%d")
            .with_context(|| format!("line {}: invalid date '{}'", line, row.date))?;
        let kind: TransactionKind = row
            .kind
            .parse()
            .with_context(|| format!("line {}: invalid type", line))?;
        let amount: Decimal = row
            .amount
            .parse()
            .with_context(|| format!("line {}: invalid amount '{}'", line, row.amount))?;
        if amount.is_sign_negative() {
            bail!("line {}: amount must be non-negative, got {}", line, amount);
        }

        rows.push(NewTransaction {
            date,
            kind,
            amount,
            description: row.description.filter(|s| !s.is_empty()),
        });
    }

    Ok(rows)
}
