//! Bet Log
//! Mission: Append-only audit trail of every bet action
//!
//! Entries are never mutated or removed. Candidate deletion leaves historical
//! entries pointing at the dead id; they are orphaned audit records, not a
//! live view, so per-candidate sums over the log may legitimately diverge
//! from the live ledger.

use crate::models::BetLogEntry;
use crate::store::KvStore;
use anyhow::Result;
use tracing::warn;

pub const KEY_BET_HISTORY: &str = "giftbet_bet_history";

#[derive(Debug, Clone, Default)]
pub struct BetLog {
    /// Append order, oldest first. This is replay order.
    entries: Vec<BetLogEntry>,
}

impl BetLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from the store. Entries are normalized to ascending timestamp
    /// order (older persisted data was newest-first). Corrupt data recovers
    /// to an empty log; never fatal.
    pub fn load<S: KvStore>(store: &S) -> Result<Self> {
        let Some(raw) = store.get(KEY_BET_HISTORY)? else {
            return Ok(Self::new());
        };

        match serde_json::from_str::<Vec<BetLogEntry>>(&raw) {
            Ok(mut entries) => {
                entries.sort_by_key(|e| e.timestamp);
                Ok(Self { entries })
            }
            Err(e) => {
                warn!("⚠️ Failed to parse stored bet history, starting empty: {}", e);
                Ok(Self::new())
            }
        }
    }

    /// Best-effort durable commit.
    pub fn save<S: KvStore>(&self, store: &S) -> Result<()> {
        let json = serde_json::to_string(&self.entries)?;
        store.set(KEY_BET_HISTORY, &json)
    }

    pub fn append(&mut self, entry: BetLogEntry) {
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Replay order: ascending timestamp.
    pub fn iter(&self) -> impl Iterator<Item = &BetLogEntry> {
        self.entries.iter()
    }

    /// History order: newest first.
    pub fn history(&self) -> impl Iterator<Item = &BetLogEntry> {
        self.entries.iter().rev()
    }

    /// One user's entries, newest first.
    pub fn for_user<'a>(&'a self, user_id: &'a str) -> impl Iterator<Item = &'a BetLogEntry> {
        self.history().filter(move |e| e.user_id == user_id)
    }

    /// Case-insensitive substring filter over username and candidate name,
    /// newest first. An empty term matches everything.
    pub fn search(&self, term: &str) -> Vec<&BetLogEntry> {
        let needle = term.to_lowercase();
        self.history()
            .filter(|e| {
                e.username.to_lowercase().contains(&needle)
                    || e.candidate_name.to_lowercase().contains(&needle)
            })
            .collect()
    }
}
