//! Listen for budget alerts for one user.
//!
//! Demonstrates:
//! - Building a `HubConfig` and `HubClient`
//! - Binding the user's group with `NotificationSession`
//! - Presenting alerts one at a time through an `AlertFeed`
//! - Watching state changes and side-channel errors
//!
//! Press Enter to acknowledge the alert on screen, Ctrl+C to exit.
//!
//! Usage:
//!   cargo run --example listen -- https://api.example.com 42
//!   cargo run --example listen -- https://api.example.com 42 --debug

// ============================================================================
// Imports
// ============================================================================

use budget_notify::identifiers::UserId;
use budget_notify::{
    AlertFeed, AlertStyle, ChannelPresenter, HubClient, HubConfig, NotificationSession, Result,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

// ============================================================================
// Args
// ============================================================================

/// Command-line arguments.
#[derive(Debug, Clone)]
struct Args {
    base_url: String,
    user: Option<UserId>,
    debug: bool,
}

impl Args {
    /// Parse command-line arguments.
    fn parse() -> Self {
        let args: Vec<String> = std::env::args().skip(1).collect();
        let mut positional = args.iter().filter(|a| !a.starts_with("--"));

        Self {
            base_url: positional
                .next()
                .cloned()
                .unwrap_or_else(|| "http://localhost:5000".to_string()),
            user: positional.next().and_then(|id| id.parse().ok()).map(UserId::new),
            debug: args.iter().any(|a| a == "--debug"),
        }
    }
}

/// Initialize tracing/logging.
fn init_logging(debug: bool) {
    let filter = if debug {
        "budget_notify=debug"
    } else {
        "budget_notify=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(args.debug);

    if let Err(e) = run(args).await {
        eprintln!("\n[ERROR] {e}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    println!("=== Budget alerts ===\n");
    println!("    Hub:  {}", args.base_url);

    let config = HubConfig::builder().base_url(&args.base_url).build()?;
    println!("    Endpoint: {}\n", config.endpoint());

    let client = HubClient::new(config);

    let (presenter, mut alerts) = ChannelPresenter::channel();
    let feed = AlertFeed::attach(&client, presenter);

    // Side channel
    let mut errors = client.errors();
    tokio::spawn(async move {
        while let Ok(error) = errors.recv().await {
            println!("    ! {error}");
        }
    });

    // State changes
    let mut states = client.watch_state();
    tokio::spawn(async move {
        while states.changed().await.is_ok() {
            let state = *states.borrow_and_update();
            println!("    ~ {state}");
        }
    });

    let session = NotificationSession::new(client);
    match session.start(&args.user).await? {
        Some(group) => println!("    ✓ Listening on group {group}\n"),
        None => println!("    ✓ Connected (no user, no group)\n"),
    }

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            Some(alert) = alerts.recv() => {
                let marker = match alert.style {
                    AlertStyle::Critical => "!!",
                    AlertStyle::Warning => "! ",
                    AlertStyle::Info => "  ",
                };
                println!("[{marker}] {alert}");
                println!("     (Enter to dismiss, {} waiting)", feed.pending_len());
            }

            line = stdin.next_line() => {
                match line {
                    Ok(Some(_)) => {
                        if !feed.acknowledge() {
                            println!("     nothing to dismiss");
                        }
                    }
                    _ => break,
                }
            }

            _ = tokio::signal::ctrl_c() => break,
        }
    }

    let discarded = feed.detach();
    session.end().await;
    session.client().dispose().await;

    println!("\n    ✓ Done ({discarded} alerts discarded)");
    Ok(())
}
