//! Core Data Model
//! Mission: Define the entities shared by the ledger, log, and engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A gift candidate on the board.
///
/// `vote_count` and `total_amount` are a materialized view of the bet log
/// restricted to currently-active bets. The engine mutates them incrementally;
/// `BetEngine::rebuild_from_log` re-derives them for verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub id: String,
    pub name: String,
    pub image_url: String,
    pub vote_count: i64,
    pub total_amount: i64,
}

/// One appended bet action. Immutable once logged.
///
/// The amount is the raw amount the user entered, not a delta: a raise from
/// 50k to 80k logs 80k. Username and ip snapshot the session values at bet
/// time; a later rename does not rewrite history.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BetLogEntry {
    pub id: String,
    pub user_id: String,
    pub username: String,
    pub user_ip: String,
    pub candidate_id: String,
    pub candidate_name: String,
    pub amount: i64,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

/// The single live session for this installation.
///
/// `has_voted_for` + `last_bet_amount` form the active-bet pointer: at most
/// one candidate is backed by this user at any time.
#[derive(Debug, Clone)]
pub struct UserSession {
    pub user_id: String,
    pub username: String,
    pub ip: String,
    pub avatar_icon: String,
    pub has_voted_for: Option<String>,
    pub last_bet_amount: i64,
}

impl UserSession {
    /// Clear the active-bet pointer (candidate deleted or never bet).
    pub fn clear_active_bet(&mut self) {
        self.has_voted_for = None;
        self.last_bet_amount = 0;
    }
}

/// Leaderboard ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortMode {
    /// Pooled amount descending (ties keep original order).
    Value,
    /// Name ascending, case-insensitive.
    Name,
}

impl SortMode {
    pub fn as_str(&self) -> &str {
        match self {
            SortMode::Value => "value",
            SortMode::Name => "name",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "value" => Some(SortMode::Value),
            "name" => Some(SortMode::Name),
            _ => None,
        }
    }
}

/// Errors the reconciliation engine reports to callers.
/// Reported before any mutation; a failed call leaves no partial state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BetError {
    /// Amount below the configured minimum stake.
    InvalidAmount { amount: i64, min: i64 },
    /// Target candidate id is stale or was deleted.
    CandidateNotFound(String),
}

impl std::fmt::Display for BetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BetError::InvalidAmount { amount, min } => {
                write!(f, "bet amount {} below minimum {}", amount, min)
            }
            BetError::CandidateNotFound(id) => write!(f, "candidate not found: {}", id),
        }
    }
}

impl std::error::Error for BetError {}

/// Board configuration.
#[derive(Debug, Clone)]
pub struct BoardConfig {
    pub database_path: String,
    pub min_bet: i64,
    pub default_bet: i64,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            database_path: "./giftbet.db".to_string(),
            min_bet: 10_000,
            default_bet: 50_000,
        }
    }
}

impl BoardConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        let database_path =
            std::env::var("DATABASE_PATH").unwrap_or_else(|_| "./giftbet.db".to_string());

        let min_bet = std::env::var("MIN_BET_IDR")
            .unwrap_or_else(|_| "10000".to_string())
            .parse()
            .unwrap_or(10_000);

        let default_bet = std::env::var("DEFAULT_BET_IDR")
            .unwrap_or_else(|_| "50000".to_string())
            .parse()
            .unwrap_or(50_000);

        Ok(Self {
            database_path,
            min_bet,
            default_bet,
        })
    }
}
