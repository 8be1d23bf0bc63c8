use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use anyhow::bail;
use chrono::NaiveDate;
use forecast_core::TimeSeriesPoint;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
    Income,
    Expense,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Income => "INCOME",
            TransactionKind::Expense => "EXPENSE",
        }
    }

    /// Signed contribution of an unsigned amount: income positive, expense negative.
    pub fn signed(&self, amount: Decimal) -> Decimal {
        match self {
            TransactionKind::Income => amount,
            TransactionKind::Expense => -amount,
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "INCOME" | "CREDIT" => Ok(TransactionKind::Income),
            "EXPENSE" | "DEBIT" => Ok(TransactionKind::Expense),
            other => bail!("unknown transaction type '{}'", other),
        }
    }
}

/// A transaction to be recorded for a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTransaction {
    pub date: NaiveDate,
    pub kind: TransactionKind,
    /// Always non-negative; direction comes from `kind`.
    pub amount: Decimal,
    pub description: Option<String>,
}

impl NewTransaction {
    pub fn income(date: NaiveDate, amount: Decimal) -> Self {
        Self {
            date,
            kind: TransactionKind::Income,
            amount,
            description: None,
        }
    }

    pub fn expense(date: NaiveDate, amount: Decimal) -> Self {
        Self {
            date,
            kind: TransactionKind::Expense,
            amount,
            description: None,
        }
    }

    pub fn signed_amount(&self) -> Decimal {
        self.kind.signed(self.amount)
    }
}

/// Collapse transactions into one net point per date with activity, ascending.
pub fn net_daily_series<I>(flows: I) -> anyhow::Result<Vec<TimeSeriesPoint>>
where
    I: IntoIterator<Item = (NaiveDate, Decimal)>,
{
    let mut by_date: BTreeMap<NaiveDate, Decimal> = BTreeMap::new();
    for (date, amount) in flows {
        let net = by_date.entry(date).or_default();
        *net = match net.checked_add(amount) {
            Some(sum) => sum,
            None => bail!("net flow on {} overflows", date),
        };
    }
    Ok(by_date
        .into_iter()
        .map(|(date, value)| TimeSeriesPoint::new(date, value))
        .collect())
}
