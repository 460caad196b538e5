//! Snipe Feed Demo
//!
//! Drives the store the way a chat client's handlers do: deleted messages are
//! pushed onto a per-channel feed, a toggle is set with a TTL, and a command
//! is rate limited per user. Run with `RUST_LOG=expiring_store=debug` to see
//! timers being armed and fired.

use std::time::Duration;

use anyhow::Result;
use expiring_store::{spawn_sweeper, Config, JsonStore, Position};
use serde_json::json;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "snipe_feed=info,expiring_store=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    info!(
        "Configuration loaded: default_ttl={}s, sweep_interval={}s",
        config.default_ttl, config.sweep_interval
    );

    let store = JsonStore::with_config(&config);
    let sweeper = spawn_sweeper(store.clone(), config.sweep_interval());

    // Deleted messages, newest first, forgotten after two seconds
    let feed = "snipe:8c1d2f00";
    for (author, content) in [("ana", "first"), ("bo", "oops"), ("ana", "never mind")] {
        store.list_append(
            feed,
            [json!({"author": author, "content": content})],
            Position::Front,
            Some(Duration::from_secs(2)),
        )?;
    }
    if let Some(latest) = store.get_list(feed).and_then(|snipes| snipes.into_iter().next()) {
        info!("Latest snipe: {}", latest);
    }

    // Auto-reply toggle with the configured default TTL
    store.put("auto_reply:5e1f0a2b", json!("I'm busy right now."));

    // Per-user command limit: 3 uses per 10 seconds
    for attempt in 1..=4 {
        let limited = store.check_rate_limit("ratelimit:5e1f0a2b", 3, Duration::from_secs(10));
        info!(
            attempt,
            limited,
            retry_in = ?store.time_remaining("ratelimit:5e1f0a2b"),
            "Command invoked"
        );
    }

    tokio::time::sleep(Duration::from_millis(2_100)).await;
    info!(keys = ?store.keys(), "Feed expired");
    info!("Stats: {}", serde_json::to_string(&store.stats())?);

    sweeper.abort();
    Ok(())
}
