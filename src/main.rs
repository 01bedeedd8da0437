//! GiftBet Board CLI
//!
//! Terminal front end for the gift-betting engine. All core logic lives in
//! the library; this binary is presentation plumbing over the SQLite store.
//!
//! Usage:
//!   cargo run -- board
//!   cargo run -- bet <CANDIDATE_ID> --amount 50000
//!   cargo run -- add "Mechanical Keyboard" --image img/keyboard.png --password <pw>
//!   cargo run -- bets --search ghost --password <pw>

use anyhow::Result;
use clap::{Parser, Subcommand};
use giftbet_engine::{BetEngine, BetError, BoardConfig, SortMode, SqliteKv};
use tracing::error;

const ADMIN_PASSWORD_VAR: &str = "ADMIN_PASSWORD";

#[derive(Parser, Debug)]
#[command(name = "giftbet")]
#[command(about = "Gift-betting board: stake on the best gift")]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show the board
    Board {
        /// Sort order: value | name
        #[arg(long, default_value = "value")]
        sort: String,
    },

    /// Place, raise, or switch your bet
    Bet {
        candidate_id: String,

        /// Stake in IDR; defaults to the configured default bet
        #[arg(long)]
        amount: Option<i64>,
    },

    /// Admin: add a gift candidate
    Add {
        name: String,

        #[arg(long)]
        image: String,

        #[arg(long)]
        password: String,
    },

    /// Admin: remove a gift candidate
    Remove {
        candidate_id: String,

        #[arg(long)]
        password: String,
    },

    /// Admin: inspect the bet history
    Bets {
        #[arg(long, default_value = "")]
        search: String,

        #[arg(long)]
        password: String,
    },

    /// Admin: user directory with contribution totals
    Users {
        #[arg(long)]
        password: String,
    },

    /// Show your profile and betting history
    Profile,

    /// Change your display name
    Rename { username: String },

    /// Pick an avatar icon
    Avatar { icon: String },

    /// Verify the ledger against a replay of the bet log
    Verify,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("giftbet_engine=info".parse().unwrap()),
        )
        .init();

    let args = Args::parse();
    let config = BoardConfig::from_env()?;
    let store = SqliteKv::open(&config.database_path)?;
    let mut engine = BetEngine::new(store, config)?;

    match args.command {
        Commands::Board { sort } => {
            let mode = SortMode::from_str(&sort).unwrap_or(SortMode::Value);
            show_board(&engine, mode);
        }
        Commands::Bet {
            candidate_id,
            amount,
        } => {
            let amount = amount.unwrap_or(engine.config().default_bet);
            match engine.place_bet(&candidate_id, amount) {
                Ok(receipt) => {
                    println!(
                        "✅ {} on \"{}\" — now {} with {} vote(s)",
                        describe_kind(&receipt.kind),
                        receipt.candidate.name,
                        format_idr(receipt.candidate.total_amount),
                        receipt.candidate.vote_count
                    );
                }
                Err(e @ BetError::InvalidAmount { .. }) => {
                    error!("❌ {}", e);
                    std::process::exit(2);
                }
                Err(e @ BetError::CandidateNotFound(_)) => {
                    error!("❌ {}", e);
                    std::process::exit(2);
                }
            }
        }
        Commands::Add {
            name,
            image,
            password,
        } => {
            require_admin(&password);
            let candidate = engine.add_candidate(&name, &image);
            println!("🎁 Added \"{}\" (id {})", candidate.name, candidate.id);
        }
        Commands::Remove {
            candidate_id,
            password,
        } => {
            require_admin(&password);
            engine.remove_candidate(&candidate_id);
            println!("🗑️ Removed {}", candidate_id);
        }
        Commands::Bets { search, password } => {
            require_admin(&password);
            println!(
                "{:<25} {:<14} {:<16} {:<20} {:>12}",
                "TIME", "USER", "IP", "GIFT", "AMOUNT"
            );
            for bet in engine.search_bets(&search) {
                println!(
                    "{:<25} {:<14} {:<16} {:<20} {:>12}",
                    bet.timestamp.format("%d %b %H:%M"),
                    bet.username,
                    bet.user_ip,
                    bet.candidate_name,
                    format_idr(bet.amount)
                );
            }
        }
        Commands::Users { password } => {
            require_admin(&password);
            println!("USER                 IP               LAST ACTIVE        TOTAL");
            for user in engine.user_directory() {
                println!(
                    "{:<20} {:<16} {:<18} {:>12}",
                    user.username,
                    user.ip,
                    user.last_active.format("%d %b %H:%M"),
                    format_idr(user.total_bet)
                );
            }
        }
        Commands::Profile => {
            let session = engine.session().clone();
            let rollup = engine.profile();
            println!("👤 {} [{}] @{}", session.username, session.avatar_icon, session.ip);
            println!("   Total bet:    {}", format_idr(rollup.total_bet));
            println!("   Total votes:  {}", rollup.bet_count);
            println!(
                "   Current pick: {}",
                rollup.current_pick.as_deref().unwrap_or("None")
            );
            println!();
            for bet in engine.log().for_user(&session.user_id) {
                println!(
                    "   {} {:<20} +{}",
                    bet.timestamp.format("%d %b %H:%M"),
                    bet.candidate_name,
                    format_idr(bet.amount)
                );
            }
        }
        Commands::Rename { username } => {
            engine.rename(&username)?;
            println!("✏️ You are now \"{}\"", engine.session().username);
        }
        Commands::Avatar { icon } => {
            engine.set_avatar(&icon)?;
            println!("🙂 Avatar: {}", engine.session().avatar_icon);
        }
        Commands::Verify => {
            if engine.verify_against_log() {
                println!("✅ Ledger matches bet-log replay");
            } else {
                println!("❌ Ledger diverges from bet-log replay");
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

fn show_board<S: giftbet_engine::KvStore>(engine: &BetEngine<S>, mode: SortMode) {
    let leading = engine.leading();
    let session = engine.session();

    println!("🎂 BIRTHDAY BET — place your stakes on the best gift");
    println!(
        "   Pool: {}   Voters: {}   Transactions: {}",
        format_idr(engine.ledger().total_pool()),
        engine.ledger().total_voters(),
        engine.log().len()
    );
    println!();

    if engine.ledger().is_empty() {
        println!("   No gift options added yet. Be the first to suggest a gift!");
        return;
    }

    for candidate in engine.leaderboard(mode) {
        let lead_badge = match &leading {
            Some(l) if l.id == candidate.id => " ✨ LEADING",
            _ => "",
        };
        let vote_badge = if session.has_voted_for.as_deref() == Some(candidate.id.as_str()) {
            " ← your pick"
        } else {
            ""
        };
        println!(
            "   [{}] {:<24} {:>14}  {} vote(s){}{}",
            candidate.id,
            candidate.name,
            format_idr(candidate.total_amount),
            candidate.vote_count,
            lead_badge,
            vote_badge
        );
    }
}

fn describe_kind(kind: &giftbet_engine::BetKind) -> String {
    match kind {
        giftbet_engine::BetKind::New => "Bet placed".to_string(),
        giftbet_engine::BetKind::Raise => "Bet raised".to_string(),
        giftbet_engine::BetKind::Switch { from } => format!("Switched from {}", from),
    }
}

/// Shared static credential, compared in constant time. Purely a CLI gate;
/// the engine itself only needs the caller to have passed it.
fn require_admin(password: &str) {
    let expected = std::env::var(ADMIN_PASSWORD_VAR).unwrap_or_else(|_| "admin123".to_string());
    let a = password.as_bytes();
    let b = expected.as_bytes();
    let mut diff = a.len() ^ b.len();
    for i in 0..a.len().min(b.len()) {
        diff |= (a[i] ^ b[i]) as usize;
    }
    if diff != 0 {
        error!("🔒 Access denied: incorrect password");
        std::process::exit(2);
    }
}

/// IDR with thousands separators, no decimals: 50000 -> "Rp 50.000".
fn format_idr(amount: i64) -> String {
    let digits = amount.abs().to_string();
    let mut out = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push('.');
        }
        out.push(c);
    }
    if amount < 0 {
        format!("-Rp {}", out)
    } else {
        format!("Rp {}", out)
    }
}
