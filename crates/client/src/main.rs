use std::sync::Arc;

use anyhow::Context;
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mentorlink_channel::{ChannelClient, ChannelEndpoint};
use mentorlink_client::{ClientConfig, ClientContext, HttpPlatformApi, SessionView};
use mentorlink_core::types::DbId;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    init_tracing();

    // --- Configuration ---
    let config = ClientConfig::from_env()?;
    let actor = config.actor()?;
    let session_id: DbId = std::env::args()
        .nth(1)
        .context("usage: mentorlink <session-id>")?
        .parse()
        .context("session id must be an integer")?;
    tracing::info!(
        api = %config.api_base_url,
        channel = %config.channel_ws_url,
        user_id = actor.user_id,
        "Loaded client configuration",
    );

    // --- Collaborators ---
    let api = Arc::new(HttpPlatformApi::new(
        config.api_base_url.clone(),
        config.auth_token.clone(),
        config.request_timeout(),
    )?);
    let channel = ChannelClient::new(
        ChannelEndpoint::new(config.channel_ws_url.clone(), config.auth_token.clone()),
        config.reconnect(),
    );
    let ctx = ClientContext::new(actor, api, channel, config.draft_ttl());
    let mut client_events = ctx.bus.subscribe();
    ctx.start();

    // --- Session view ---
    let view = SessionView::open(Arc::clone(&ctx), session_id).await?;
    let progress = view.progress().await;
    tracing::info!(
        session_id,
        completed = progress.completed,
        total = progress.total,
        "Session view open",
    );
    for line in view.render().await {
        tracing::info!("{line}");
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received Ctrl-C, closing session view");
                break;
            }
            received = client_events.recv() => match received {
                Ok(envelope) => {
                    tracing::info!(event = ?envelope.event, "Client event");
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Client event log lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    view.close();
    ctx.shutdown().await;
    Ok(())
}

/// `LOG_FORMAT=json` switches to JSON output; `RUST_LOG` overrides the filter.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "mentorlink_client=info,mentorlink_channel=info".into());
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
