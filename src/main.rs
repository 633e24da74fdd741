//! Command line client for the Thunderproof review network. Looks up
//! profiles, fetches and validates review events, and signs and publishes
//! new reviews across the configured relays.

mod aggregate;
mod config;
mod credential;
mod error;
mod event;
mod keys;
mod profile;
mod publish;
mod relay;
mod review;
mod signer;

use std::{fs, path::Path};

use anyhow::bail;
use clap::{Parser, Subcommand};

use config::Settings;
use keys::Identity;
use review::ReviewSort;

/// Maximum review comment length enforced at submission.
const MAX_COMMENT_CHARS: usize = 500;

/// Command line interface entry point.
#[derive(Parser)]
#[command(
    name = "thunderproof",
    author,
    version,
    about = "Nostr review client"
)]
struct Cli {
    /// Path to the `.env` configuration file.
    #[arg(long, default_value = ".env")]
    env: String,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Fetch a profile record from the configured relays.
    Profile {
        /// Identity to look up (npub or hex).
        identity: String,
    },
    /// Fetch reviews about an identity.
    Reviews {
        /// Identity to look up (npub or hex).
        identity: String,
        /// Ordering applied to the fetched set.
        #[arg(long, value_enum, default_value = "newest")]
        sort: ReviewSort,
    },
    /// Sign and publish a review about an identity.
    Submit {
        /// Reviewed identity (npub or hex).
        identity: String,
        /// Rating from 1 to 5.
        #[arg(long)]
        rating: u8,
        /// Review text, up to 500 characters.
        #[arg(long)]
        comment: String,
        /// Sign with this key instead of the stored credential.
        #[arg(long)]
        nsec: Option<String>,
    },
    /// Store a login credential for signing.
    Login {
        /// Private key, nsec or hex.
        #[arg(long)]
        nsec: String,
    },
    /// Delete the stored credential.
    Logout,
    /// Show the logged-in identity.
    Whoami,
}

/// Execute the selected CLI subcommand.
async fn run(cli: Cli) -> anyhow::Result<()> {
    ensure_env_file(&cli.env)?;
    let cfg = Settings::from_env(&cli.env)?;
    match cli.command {
        Commands::Profile { identity } => {
            let id = Identity::parse(&identity)?;
            let record = aggregate::fetch_profile(&cfg, &id).await;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        Commands::Reviews { identity, sort } => {
            let id = Identity::parse(&identity)?;
            let mut reviews = aggregate::fetch_reviews(&cfg, &id).await;
            review::sort(&mut reviews, sort);
            println!("{}", serde_json::to_string_pretty(&reviews)?);
            match review::average_rating(&reviews) {
                Some(avg) => eprintln!("{} reviews, average {avg:.1}/5", reviews.len()),
                None => eprintln!("no reviews found"),
            }
        }
        Commands::Submit {
            identity,
            rating,
            comment,
            nsec,
        } => {
            let id = Identity::parse(&identity)?;
            let comment = comment.trim().to_string();
            if comment.chars().count() > MAX_COMMENT_CHARS {
                bail!("comment exceeds {MAX_COMMENT_CHARS} characters");
            }
            let cred = match nsec {
                Some(key) => credential::Credential::from_secret(&key)?,
                None => credential::load(&cfg.state_dir)?.ok_or_else(|| {
                    anyhow::anyhow!(
                        "not logged in; run `thunderproof login --nsec <key>` or pass --nsec"
                    )
                })?,
            };
            let report = publish::submit_review(&cfg, &cred, &id, rating, &comment).await?;
            for (relay, outcome) in &report.results {
                println!("{relay}: {outcome}");
            }
            println!(
                "published {} to {}/{} relays",
                report.event_id,
                report.accepted_count(),
                report.results.len()
            );
        }
        Commands::Login { nsec } => {
            let cred = credential::Credential::from_secret(&nsec)?;
            credential::save(&cfg.state_dir, &cred)?;
            println!("logged in as {}", cred.npub);
        }
        Commands::Logout => {
            if credential::delete(&cfg.state_dir)? {
                println!("logged out");
            } else {
                println!("no stored credential");
            }
        }
        Commands::Whoami => match credential::load(&cfg.state_dir)? {
            Some(cred) => println!("{}", cred.npub),
            None => bail!("not logged in"),
        },
    }
    Ok(())
}

/// Create a default `.env` file if one is not already present at `path`.
fn ensure_env_file(path: &str) -> anyhow::Result<()> {
    let env_path = Path::new(path);
    if env_path.exists() {
        return Ok(());
    }
    if let Some(parent) = env_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let base_dir = match env_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir()?,
    };
    let state_dir = base_dir.join("thunderproof-data");
    let mut content = String::new();
    content.push_str(&format!("RELAYS={}\n", config::DEFAULT_RELAYS));
    content.push_str(&format!("STATE_DIR={}\n", state_dir.to_string_lossy()));
    content.push_str("VERIFY_SIG=1\n");
    content.push_str("TIMEOUT_PROFILE_SECS=10\n");
    content.push_str("TIMEOUT_REVIEWS_SECS=15\n");
    content.push_str("TIMEOUT_PUBLISH_SECS=10\n");
    content.push_str("TOR_SOCKS=\n");
    fs::write(env_path, content)?;
    Ok(())
}

#[cfg(not(test))]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    let cli = Cli::parse();
    run(cli).await
}
