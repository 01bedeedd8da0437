//! Identity Store
//! Mission: Resolve a stable per-installation identity across sessions

use crate::models::UserSession;
use crate::store::KvStore;
use anyhow::Result;
use rand::Rng;
use tracing::{info, warn};
use uuid::Uuid;

pub const KEY_USER_ID: &str = "giftbet_user_id";
pub const KEY_USERNAME: &str = "giftbet_username";
pub const KEY_USER_IP: &str = "giftbet_user_ip";
pub const KEY_USER_AVATAR: &str = "giftbet_user_avatar";
pub const KEY_USER_VOTE: &str = "giftbet_user_vote";
pub const KEY_USER_BET_AMOUNT: &str = "giftbet_user_bet_amount";

const UNIX_NAMES: &[&str] = &[
    "root",
    "daemon",
    "bin",
    "sys",
    "sync",
    "games",
    "man",
    "mail",
    "news",
    "uucp",
    "proxy",
    "www-data",
    "backup",
    "list",
    "irc",
    "gnats",
    "nobody",
    "systemd-network",
    "neon_ghost",
    "cyber_punk",
    "obsidian_rat",
    "glitch_user",
];

pub const AVATARS: &[&str] = &[
    "smile", "zap", "crown", "ghost", "terminal", "users", "shield",
];

fn generate_simulated_ip() -> String {
    let mut rng = rand::thread_rng();
    format!(
        "192.168.{}.{}",
        rng.gen_range(0..255),
        rng.gen_range(0..255)
    )
}

fn generate_username() -> String {
    let mut rng = rand::thread_rng();
    UNIX_NAMES[rng.gen_range(0..UNIX_NAMES.len())].to_string()
}

fn generate_user_id() -> String {
    format!("user_{}", Uuid::new_v4().simple())
}

/// Load the session from the store, generating and persisting any missing
/// identity fields. User id and ip are generated once and never regenerated.
pub fn load_or_create_session<S: KvStore>(store: &S) -> Result<UserSession> {
    let user_id = match store.get(KEY_USER_ID)? {
        Some(id) => id,
        None => {
            let id = generate_user_id();
            store.set(KEY_USER_ID, &id)?;
            info!("👤 New identity created: {}", id);
            id
        }
    };

    let username = match store.get(KEY_USERNAME)? {
        Some(name) => name,
        None => {
            let name = generate_username();
            store.set(KEY_USERNAME, &name)?;
            name
        }
    };

    let ip = match store.get(KEY_USER_IP)? {
        Some(ip) => ip,
        None => {
            let ip = generate_simulated_ip();
            store.set(KEY_USER_IP, &ip)?;
            ip
        }
    };

    let avatar_icon = store
        .get(KEY_USER_AVATAR)?
        .unwrap_or_else(|| "smile".to_string());

    let has_voted_for = store.get(KEY_USER_VOTE)?;
    let last_bet_amount = match store.get(KEY_USER_BET_AMOUNT)? {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("⚠️ Malformed stored bet amount '{}', resetting to 0", raw);
            0
        }),
        None => 0,
    };

    Ok(UserSession {
        user_id,
        username,
        ip,
        avatar_icon,
        has_voted_for,
        last_bet_amount,
    })
}

/// Persist the active-bet pointer.
pub fn persist_active_bet<S: KvStore>(store: &S, session: &UserSession) -> Result<()> {
    match &session.has_voted_for {
        Some(candidate_id) => {
            store.set(KEY_USER_VOTE, candidate_id)?;
            store.set(KEY_USER_BET_AMOUNT, &session.last_bet_amount.to_string())?;
        }
        None => {
            store.remove(KEY_USER_VOTE)?;
            store.remove(KEY_USER_BET_AMOUNT)?;
        }
    }
    Ok(())
}

/// Rename the user. Historical log entries keep the old name.
pub fn set_username<S: KvStore>(
    store: &S,
    session: &mut UserSession,
    username: &str,
) -> Result<()> {
    let trimmed = username.trim();
    if trimmed.is_empty() {
        return Ok(());
    }
    session.username = trimmed.to_string();
    store.set(KEY_USERNAME, trimmed)?;
    info!("✏️ Username changed to {}", trimmed);
    Ok(())
}

/// Pick an avatar icon. Unknown icons are rejected silently.
pub fn set_avatar<S: KvStore>(store: &S, session: &mut UserSession, icon: &str) -> Result<()> {
    if !AVATARS.contains(&icon) {
        return Ok(());
    }
    session.avatar_icon = icon.to_string();
    store.set(KEY_USER_AVATAR, icon)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryKv;

    #[test]
    fn test_identity_stable_across_loads() {
        let store = MemoryKv::new();

        let first = load_or_create_session(&store).unwrap();
        assert!(first.user_id.starts_with("user_"));
        assert!(first.ip.starts_with("192.168."));
        assert!(first.has_voted_for.is_none());
        assert_eq!(first.last_bet_amount, 0);

        let second = load_or_create_session(&store).unwrap();
        assert_eq!(second.user_id, first.user_id);
        assert_eq!(second.username, first.username);
        assert_eq!(second.ip, first.ip);
    }

    #[test]
    fn test_rename_persists_and_trims() {
        let store = MemoryKv::new();
        let mut session = load_or_create_session(&store).unwrap();

        set_username(&store, &mut session, "  grault  ").unwrap();
        assert_eq!(session.username, "grault");

        let reloaded = load_or_create_session(&store).unwrap();
        assert_eq!(reloaded.username, "grault");

        // Blank rename is a no-op
        set_username(&store, &mut session, "   ").unwrap();
        assert_eq!(session.username, "grault");
    }

    #[test]
    fn test_avatar_selection() {
        let store = MemoryKv::new();
        let mut session = load_or_create_session(&store).unwrap();

        set_avatar(&store, &mut session, "crown").unwrap();
        assert_eq!(session.avatar_icon, "crown");

        // Unknown icon ignored
        set_avatar(&store, &mut session, "dragon").unwrap();
        assert_eq!(session.avatar_icon, "crown");
    }

    #[test]
    fn test_active_bet_roundtrip() {
        let store = MemoryKv::new();
        let mut session = load_or_create_session(&store).unwrap();

        session.has_voted_for = Some("c1".to_string());
        session.last_bet_amount = 50_000;
        persist_active_bet(&store, &session).unwrap();

        let reloaded = load_or_create_session(&store).unwrap();
        assert_eq!(reloaded.has_voted_for.as_deref(), Some("c1"));
        assert_eq!(reloaded.last_bet_amount, 50_000);

        session.clear_active_bet();
        persist_active_bet(&store, &session).unwrap();

        let reloaded = load_or_create_session(&store).unwrap();
        assert!(reloaded.has_voted_for.is_none());
        assert_eq!(reloaded.last_bet_amount, 0);
    }

    #[test]
    fn test_malformed_bet_amount_resets() {
        let store = MemoryKv::new();
        store.set(KEY_USER_BET_AMOUNT, "not-a-number").unwrap();

        let session = load_or_create_session(&store).unwrap();
        assert_eq!(session.last_bet_amount, 0);
    }
}
