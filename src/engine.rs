//! Bet Reconciliation Engine
//! Mission: Translate one bet action into the correct ledger delta, log
//! entry, and session update, as one logical unit
//!
//! A user is either Unbet or Bet(candidate, amount). `place_bet` drives the
//! three transitions (new, raise, switch); candidate deletion clears any
//! session pointing at the dead id without touching the log. Validation
//! happens before any mutation, so a failed call leaves no partial state.

use crate::betlog::BetLog;
use crate::identity;
use crate::ledger::CandidateLedger;
use crate::models::{BetError, BetLogEntry, BoardConfig, Candidate, UserSession};
use crate::store::KvStore;
use anyhow::Result;
use chrono::Utc;
use std::collections::HashMap;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Which transition a `place_bet` call performed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BetKind {
    New,
    Raise,
    Switch { from: String },
}

/// Result of a successful `place_bet`.
#[derive(Debug, Clone)]
pub struct BetReceipt {
    pub kind: BetKind,
    pub entry: BetLogEntry,
    pub candidate: Candidate,
}

/// Owns the ledger, the log, and the single live session. All mutation goes
/// through its methods; construction loads everything from the store.
pub struct BetEngine<S: KvStore> {
    store: S,
    config: BoardConfig,
    ledger: CandidateLedger,
    log: BetLog,
    session: UserSession,
}

impl<S: KvStore> BetEngine<S> {
    pub fn new(store: S, config: BoardConfig) -> Result<Self> {
        let mut ledger = CandidateLedger::load(&store, config.default_bet)?;
        let log = BetLog::load(&store)?;
        let mut session = identity::load_or_create_session(&store)?;

        // Every id the log has ever referenced is retired, so a candidate
        // added after this load cannot alias a previously deleted one.
        ledger.retire_ids(log.iter().map(|e| e.candidate_id.as_str()));

        // A vote pointer at a candidate that no longer exists is stale
        // (deleted while this session was not loaded).
        if let Some(voted) = &session.has_voted_for {
            if !ledger.contains(voted) {
                debug!("Stale vote pointer {} cleared on load", voted);
                session.clear_active_bet();
                identity::persist_active_bet(&store, &session)?;
            }
        }

        Ok(Self {
            store,
            config,
            ledger,
            log,
            session,
        })
    }

    pub fn config(&self) -> &BoardConfig {
        &self.config
    }

    pub fn ledger(&self) -> &CandidateLedger {
        &self.ledger
    }

    pub fn log(&self) -> &BetLog {
        &self.log
    }

    pub fn session(&self) -> &UserSession {
        &self.session
    }

    /// Place, raise, or switch this session's single active bet.
    ///
    /// Validates before touching anything; then applies the ledger delta,
    /// appends the log entry, and updates the session as one unit. The
    /// persistence commit afterwards is best-effort and never fails the call.
    pub fn place_bet(&mut self, candidate_id: &str, amount: i64) -> Result<BetReceipt, BetError> {
        if amount < self.config.min_bet {
            return Err(BetError::InvalidAmount {
                amount,
                min: self.config.min_bet,
            });
        }
        let candidate_name = match self.ledger.get(candidate_id) {
            Some(c) => c.name.clone(),
            None => return Err(BetError::CandidateNotFound(candidate_id.to_string())),
        };

        let kind = match self.session.has_voted_for.clone() {
            None => {
                self.ledger.apply_delta(candidate_id, 1, amount);
                BetKind::New
            }
            Some(prev) if prev == candidate_id => {
                // Raise (or lower): vote count unchanged, pool moves by the
                // difference between the new and previous amount.
                self.ledger
                    .apply_delta(candidate_id, 0, amount - self.session.last_bet_amount);
                BetKind::Raise
            }
            Some(prev) => {
                self.ledger
                    .apply_delta(&prev, -1, -self.session.last_bet_amount);
                self.ledger.apply_delta(candidate_id, 1, amount);
                BetKind::Switch { from: prev }
            }
        };

        // One entry per action, for the target candidate only. The logged
        // amount is the raw amount entered, not the delta.
        let entry = BetLogEntry {
            id: format!("bet_{}", Uuid::new_v4().simple()),
            user_id: self.session.user_id.clone(),
            username: self.session.username.clone(),
            user_ip: self.session.ip.clone(),
            candidate_id: candidate_id.to_string(),
            candidate_name,
            amount,
            timestamp: Utc::now(),
        };
        self.log.append(entry.clone());

        self.session.has_voted_for = Some(candidate_id.to_string());
        self.session.last_bet_amount = amount;

        info!(
            "💰 {:?} bet of {} on {} by {}",
            kind, amount, entry.candidate_name, self.session.username
        );
        self.commit();

        let candidate = self
            .ledger
            .get(candidate_id)
            .cloned()
            .expect("target candidate verified above");
        Ok(BetReceipt {
            kind,
            entry,
            candidate,
        })
    }

    /// Admin: add a candidate. The admin gate is the caller's concern.
    pub fn add_candidate(&mut self, name: &str, image_url: &str) -> Candidate {
        let candidate = self.ledger.add(name, image_url);
        self.commit();
        candidate
    }

    /// Admin: remove a candidate. Silent if absent. If the removed candidate
    /// was this session's active bet, the pointer is cleared atomically; no
    /// log entry is written and no amounts are rebalanced — the money leaves
    /// the pool with the candidate. Historical log entries stay untouched.
    pub fn remove_candidate(&mut self, candidate_id: &str) {
        if self.ledger.remove(candidate_id).is_none() {
            return;
        }
        if self.session.has_voted_for.as_deref() == Some(candidate_id) {
            self.session.clear_active_bet();
        }
        self.commit();
    }

    /// Rename this session's user. Historical entries keep the old name.
    pub fn rename(&mut self, username: &str) -> Result<()> {
        identity::set_username(&self.store, &mut self.session, username)
    }

    /// Pick this session's avatar icon.
    pub fn set_avatar(&mut self, icon: &str) -> Result<()> {
        identity::set_avatar(&self.store, &mut self.session, icon)
    }

    /// Re-derive a ledger from the log using the same transition rules.
    ///
    /// Candidate identity comes from the live ledger (totals zeroed), so the
    /// surviving candidate set encodes every delete event; deltas addressed
    /// to deleted ids are dropped. The result must equal the live ledger —
    /// that equality is the engine's core correctness property.
    pub fn rebuild_from_log(&self) -> CandidateLedger {
        let mut rebuilt = self.ledger.clone();
        rebuilt.reset_totals();

        // user -> (active candidate, active amount)
        let mut active: HashMap<&str, (&str, i64)> = HashMap::new();
        for e in self.log.iter() {
            match active.get(e.user_id.as_str()) {
                None => {
                    rebuilt.apply_delta(&e.candidate_id, 1, e.amount);
                }
                Some((prev, prev_amount)) if *prev == e.candidate_id => {
                    rebuilt.apply_delta(&e.candidate_id, 0, e.amount - prev_amount);
                }
                Some((prev, prev_amount)) => {
                    rebuilt.apply_delta(prev, -1, -prev_amount);
                    rebuilt.apply_delta(&e.candidate_id, 1, e.amount);
                }
            }
            active.insert(&e.user_id, (&e.candidate_id, e.amount));
        }
        rebuilt
    }

    /// Check the replay-determinism property against the live ledger.
    pub fn verify_against_log(&self) -> bool {
        let rebuilt = self.rebuild_from_log();
        self.ledger.iter().eq(rebuilt.iter())
    }

    /// Candidates in leaderboard order.
    pub fn leaderboard(&self, mode: crate::models::SortMode) -> Vec<Candidate> {
        crate::views::leaderboard(&self.ledger, mode)
    }

    /// The candidate currently winning the pool, if any money is in it.
    pub fn leading(&self) -> Option<Candidate> {
        crate::views::leading(&self.ledger)
    }

    /// Contribution stats for this session's user.
    pub fn profile(&self) -> crate::views::UserRollup {
        crate::views::user_rollup(&self.log, &self.ledger, &self.session)
    }

    /// Admin directory of every user seen in the log.
    pub fn user_directory(&self) -> Vec<crate::views::UserSummary> {
        crate::views::unique_users(&self.log)
    }

    /// Admin bet history, filtered and newest-first.
    pub fn search_bets(&self, term: &str) -> Vec<&BetLogEntry> {
        self.log.search(term)
    }

    /// Best-effort durable commit of ledger, log, and session. Failures are
    /// logged and not surfaced; the in-memory model stays authoritative.
    fn commit(&self) {
        if let Err(e) = self.ledger.save(&self.store) {
            warn!("⚠️ Failed to persist candidates: {:#}", e);
        }
        if let Err(e) = self.log.save(&self.store) {
            warn!("⚠️ Failed to persist bet history: {:#}", e);
        }
        if let Err(e) = identity::persist_active_bet(&self.store, &self.session) {
            warn!("⚠️ Failed to persist session: {:#}", e);
        }
    }
}
