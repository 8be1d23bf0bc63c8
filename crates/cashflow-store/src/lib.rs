//! Storage collaborators for the forecasting engine: a SQLite database of
//! users, transactions and forecast output, plus an in-memory store.

pub mod db;
pub mod import;
pub mod memory;
pub mod models;

pub use db::CashflowDb;
pub use import::parse_transactions_csv;
pub use memory::InMemoryStore;
pub use models::{net_daily_series, NewTransaction, TransactionKind};
