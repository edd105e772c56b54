use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;

use notify_sync::api::ApiClient;
use notify_sync::config;
use notify_sync::surface::{self, NotificationHub, SurfaceKind, SurfaceView};
use notify_sync::SessionStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "notify_sync=info".into()),
    );
    let json_logs = std::env::var("NOTIFY_LOG_JSON").map(|v| v == "1").unwrap_or(false);
    if json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    let cfg = config::load()?;
    let args = cli::Cli::parse();

    let user_id = args
        .user_id
        .or(cfg.user_id)
        .context("no user id: pass --user-id or set NOTIFY_USER_ID")?;
    let token = args
        .token
        .clone()
        .or_else(|| cfg.token.clone())
        .context("no token: pass --token or set NOTIFY_TOKEN")?;

    let session = SessionStore::new();
    session.sign_in(user_id, token);

    let source = Arc::new(ApiClient::from_config(&cfg, session.clone())?);
    let hub = NotificationHub::from_config(&cfg, source, session);

    let result = run(args.command, &hub, &cfg, args.json).await;
    if let Err(ref e) = result {
        eprintln!("Error: {:?}", e);
    }
    result
}

async fn run(
    command: Option<cli::Commands>,
    hub: &NotificationHub,
    cfg: &config::Config,
    json: bool,
) -> anyhow::Result<()> {
    let store = hub.store();

    match command.unwrap_or(cli::Commands::Watch { full_page: false }) {
        cli::Commands::Watch { full_page } => {
            let kind = if full_page {
                SurfaceKind::FullPage
            } else {
                SurfaceKind::Dropdown
            };
            let mut surface = hub.mount(kind);
            tracing::info!(?kind, poll_secs = cfg.poll_interval.as_secs(), "watching notifications");

            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => break,
                    _ = surface.changed() => print_view(&surface.view(), json)?,
                }
            }
            hub.sign_out();
        }
        cli::Commands::List { dropdown } => {
            store.refresh().await.context("failed to fetch notifications")?;
            let kind = if dropdown {
                SurfaceKind::Dropdown
            } else {
                SurfaceKind::FullPage
            };
            let view = surface::render(kind, cfg.dropdown_limit, &store.snapshot(), chrono::Utc::now());
            print_view(&view, json)?;
        }
        cli::Commands::Unread => {
            let count = store
                .load_unread_count()
                .await
                .context("failed to fetch unread count")?;
            println!("{}", count);
        }
        cli::Commands::Read { id } => {
            store
                .mark_one_read(id)
                .await
                .with_context(|| format!("failed to mark notification {} read", id))?;
            println!("Notification {} marked read.", id);
        }
        cli::Commands::ReadAll => {
            store
                .mark_all_read()
                .await
                .context("failed to mark all notifications read")?;
            println!("All notifications marked read.");
        }
        cli::Commands::Delete { id } => {
            store
                .delete_one(id)
                .await
                .with_context(|| format!("failed to delete notification {}", id))?;
            println!("Notification {} deleted.", id);
        }
    }
    Ok(())
}

fn print_view(view: &SurfaceView, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(view)?);
        return Ok(());
    }

    println!("Unread: {} (showing {} of {})", view.unread, view.items.len(), view.total);
    if view.items.is_empty() {
        println!("No notifications.");
        return Ok(());
    }
    println!("{:<8} {:<2} {:<8} {:<16} {}", "ID", "", "TYPE", "AGE", "TITLE");
    for row in &view.items {
        let n = &row.notification;
        println!(
            "{:<8} {:<2} {:<8} {:<16} {}",
            n.id,
            if n.is_read { "" } else { "*" },
            n.kind,
            row.age,
            n.title
        );
    }
    Ok(())
}
