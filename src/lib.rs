//! Gift-Betting Board Core
//!
//! Bet-reconciliation and aggregate-state engine for a client-side gift
//! betting board: one active bet per user, an append-only bet log as the
//! source of truth, and a candidate ledger as its incrementally-maintained
//! materialized view.

pub mod betlog;
pub mod engine;
pub mod identity;
pub mod ledger;
pub mod models;
pub mod store;
pub mod views;

pub use engine::{BetEngine, BetKind, BetReceipt};
pub use models::{BetError, BetLogEntry, BoardConfig, Candidate, SortMode, UserSession};
pub use store::{KvStore, MemoryKv, SqliteKv};
