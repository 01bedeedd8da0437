//! Candidate Ledger
//! Mission: Live per-candidate vote and amount totals
//!
//! The ledger is a cache of what replaying the bet log (restricted to active
//! bets) would produce, mutated incrementally by the engine rather than
//! recomputed. Deltas clamp at zero so ordering edge cases can never drive a
//! total negative.

use crate::models::Candidate;
use crate::store::KvStore;
use anyhow::Result;
use chrono::Utc;
use serde::Deserialize;
use tracing::{info, warn};

pub const KEY_CANDIDATES: &str = "giftbet_candidates";

/// Pre-migration candidate shape: no per-candidate amount, just a vote tally.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyCandidate {
    id: String,
    name: String,
    image_url: String,
    #[serde(default)]
    votes: i64,
}

/// Versioned decoder: current shape first, legacy fallback.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CandidateRecord {
    Current(Candidate),
    Legacy(LegacyCandidate),
}

impl CandidateRecord {
    fn normalize(self, default_bet: i64) -> Candidate {
        match self {
            CandidateRecord::Current(c) => c,
            CandidateRecord::Legacy(legacy) => Candidate {
                id: legacy.id,
                name: legacy.name,
                image_url: legacy.image_url,
                vote_count: legacy.votes,
                total_amount: legacy.votes * default_bet,
            },
        }
    }
}

/// The candidate collection. Insertion order is the stable tie-break order
/// for the value leaderboard.
#[derive(Debug, Clone, Default)]
pub struct CandidateLedger {
    candidates: Vec<Candidate>,
    // Largest numeric id ever seen. Issued ids stay above it, so a deleted
    // candidate's id is never reissued and orphaned log entries can never
    // re-attach to a newcomer added in the same millisecond.
    id_floor: i64,
}

impl CandidateLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from the store, migrating legacy records. Corrupt data recovers
    /// to an empty collection; never fatal.
    pub fn load<S: KvStore>(store: &S, default_bet: i64) -> Result<Self> {
        let Some(raw) = store.get(KEY_CANDIDATES)? else {
            return Ok(Self::new());
        };

        match serde_json::from_str::<Vec<CandidateRecord>>(&raw) {
            Ok(records) => {
                let candidates: Vec<Candidate> = records
                    .into_iter()
                    .map(|r| r.normalize(default_bet))
                    .collect();
                let id_floor = candidates
                    .iter()
                    .filter_map(|c| c.id.parse::<i64>().ok())
                    .max()
                    .unwrap_or(0);
                Ok(Self {
                    candidates,
                    id_floor,
                })
            }
            Err(e) => {
                warn!("⚠️ Failed to parse stored candidates, starting empty: {}", e);
                Ok(Self::new())
            }
        }
    }

    /// Best-effort durable commit.
    pub fn save<S: KvStore>(&self, store: &S) -> Result<()> {
        let json = serde_json::to_string(&self.candidates)?;
        store.set(KEY_CANDIDATES, &json)
    }

    /// Create a candidate with zeroed totals and a time-based id, strictly
    /// monotonic over the ledger's lifetime.
    pub fn add(&mut self, name: &str, image_url: &str) -> Candidate {
        let mut id = Utc::now().timestamp_millis().max(self.id_floor + 1);
        while self.contains(&id.to_string()) {
            id += 1;
        }
        self.id_floor = id;

        let candidate = Candidate {
            id: id.to_string(),
            name: name.to_string(),
            image_url: image_url.to_string(),
            vote_count: 0,
            total_amount: 0,
        };
        info!("🎁 Candidate added: {} ({})", candidate.name, candidate.id);
        self.candidates.push(candidate.clone());
        candidate
    }

    /// Delete if present; silent if absent. The caller owns the
    /// session-clearing contract for deleted active bets.
    pub fn remove(&mut self, candidate_id: &str) -> Option<Candidate> {
        let idx = self.candidates.iter().position(|c| c.id == candidate_id)?;
        let removed = self.candidates.remove(idx);
        self.bump_floor(&removed.id);
        info!("🗑️ Candidate removed: {} ({})", removed.name, removed.id);
        Some(removed)
    }

    /// Retire ids issued in earlier sessions (those in the bet log) so a
    /// re-added candidate can never alias one deleted before this load.
    pub fn retire_ids<'a>(&mut self, ids: impl IntoIterator<Item = &'a str>) {
        for id in ids {
            self.bump_floor(id);
        }
    }

    fn bump_floor(&mut self, id: &str) {
        if let Ok(n) = id.parse::<i64>() {
            if n > self.id_floor {
                self.id_floor = n;
            }
        }
    }

    /// Apply vote/amount deltas, flooring both totals at zero.
    /// Deltas addressed to an absent id are dropped.
    pub fn apply_delta(&mut self, candidate_id: &str, vote_delta: i64, amount_delta: i64) -> bool {
        let Some(candidate) = self.candidates.iter_mut().find(|c| c.id == candidate_id) else {
            return false;
        };
        candidate.vote_count = (candidate.vote_count + vote_delta).max(0);
        candidate.total_amount = (candidate.total_amount + amount_delta).max(0);
        true
    }

    pub fn get(&self, candidate_id: &str) -> Option<&Candidate> {
        self.candidates.iter().find(|c| c.id == candidate_id)
    }

    pub fn contains(&self, candidate_id: &str) -> bool {
        self.get(candidate_id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Candidate> {
        self.candidates.iter()
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Sum of all pooled amounts.
    pub fn total_pool(&self) -> i64 {
        self.candidates.iter().map(|c| c.total_amount).sum()
    }

    /// Sum of all active vote counts.
    pub fn total_voters(&self) -> i64 {
        self.candidates.iter().map(|c| c.vote_count).sum()
    }

    /// Zero every total while keeping candidate identity. Used by replay.
    pub fn reset_totals(&mut self) {
        for c in &mut self.candidates {
            c.vote_count = 0;
            c.total_amount = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryKv;

    #[test]
    fn test_add_starts_zeroed_with_unique_ids() {
        let mut ledger = CandidateLedger::new();
        let a = ledger.add("Keyboard", "img:a");
        let b = ledger.add("Espresso Machine", "img:b");

        assert_ne!(a.id, b.id);
        assert_eq!(a.vote_count, 0);
        assert_eq!(a.total_amount, 0);
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn test_readd_after_remove_never_reuses_id() {
        let mut ledger = CandidateLedger::new();
        let old = ledger.add("Keyboard", "img:a");
        ledger.remove(&old.id);

        // Re-added in the same millisecond: the retired id must not come back
        let fresh = ledger.add("Keyboard", "img:a");
        assert_ne!(old.id, fresh.id);
        assert!(fresh.id.parse::<i64>().unwrap() > old.id.parse::<i64>().unwrap());
    }

    #[test]
    fn test_retire_ids_blocks_reissue() {
        let mut ledger = CandidateLedger::new();
        let logged_id = (Utc::now().timestamp_millis() + 60_000).to_string();
        ledger.retire_ids([logged_id.as_str()]);

        let fresh = ledger.add("Console", "img:c");
        assert!(fresh.id.parse::<i64>().unwrap() > logged_id.parse::<i64>().unwrap());
    }

    #[test]
    fn test_remove_silent_when_absent() {
        let mut ledger = CandidateLedger::new();
        ledger.add("Keyboard", "img:a");

        assert!(ledger.remove("nope").is_none());
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_apply_delta_floors_at_zero() {
        let mut ledger = CandidateLedger::new();
        let c = ledger.add("Keyboard", "img:a");

        ledger.apply_delta(&c.id, 1, 50_000);
        ledger.apply_delta(&c.id, -5, -999_999);

        let c = ledger.get(&c.id).unwrap();
        assert_eq!(c.vote_count, 0);
        assert_eq!(c.total_amount, 0);
    }

    #[test]
    fn test_apply_delta_dropped_for_absent_id() {
        let mut ledger = CandidateLedger::new();
        assert!(!ledger.apply_delta("ghost", 1, 10_000));
    }

    #[test]
    fn test_save_load_roundtrip() {
        let store = MemoryKv::new();
        let mut ledger = CandidateLedger::new();
        let c = ledger.add("Keyboard", "img:a");
        ledger.apply_delta(&c.id, 1, 50_000);
        ledger.save(&store).unwrap();

        let loaded = CandidateLedger::load(&store, 50_000).unwrap();
        assert_eq!(loaded.len(), 1);
        let c = loaded.get(&c.id).unwrap();
        assert_eq!(c.vote_count, 1);
        assert_eq!(c.total_amount, 50_000);
    }

    #[test]
    fn test_legacy_shape_migrates() {
        // Scenario E: {id, name, imageUrl, votes: 4} -> voteCount 4, totalAmount 4 * DEFAULT_BET
        let store = MemoryKv::new();
        store
            .set(
                KEY_CANDIDATES,
                r#"[{"id":"c1","name":"Console","imageUrl":"img:c","votes":4}]"#,
            )
            .unwrap();

        let loaded = CandidateLedger::load(&store, 50_000).unwrap();
        let c = loaded.get("c1").unwrap();
        assert_eq!(c.vote_count, 4);
        assert_eq!(c.total_amount, 200_000);
    }

    #[test]
    fn test_legacy_shape_without_votes_defaults_zero() {
        let store = MemoryKv::new();
        store
            .set(
                KEY_CANDIDATES,
                r#"[{"id":"c1","name":"Console","imageUrl":"img:c"}]"#,
            )
            .unwrap();

        let loaded = CandidateLedger::load(&store, 50_000).unwrap();
        let c = loaded.get("c1").unwrap();
        assert_eq!(c.vote_count, 0);
        assert_eq!(c.total_amount, 0);
    }

    #[test]
    fn test_corrupt_data_recovers_empty() {
        let store = MemoryKv::new();
        store.set(KEY_CANDIDATES, "{{not json").unwrap();

        let loaded = CandidateLedger::load(&store, 50_000).unwrap();
        assert!(loaded.is_empty());
    }
}
