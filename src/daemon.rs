//! Daemon wiring: health endpoint, supervised gateway socket, and the event
//! dispatch loop.

use crate::config::Config;
use crate::delivery::DeliveryResolver;
use crate::events::{App, Event};
use crate::gateway::{ws, Gateway, RestGateway};
use crate::intake::Intake;
use crate::panel::PanelManager;
use crate::relay::{Anchors, RelayRouter};
use anyhow::Result;
use std::sync::Arc;
use tokio::time::Duration;
use tracing::{error, info, warn};

const INITIAL_BACKOFF_SECS: u64 = 2;
const MAX_BACKOFF_SECS: u64 = 60;

pub fn build_app(gateway: Arc<dyn Gateway>, config: Config) -> Arc<App> {
    let anchors = Arc::new(Anchors::default());
    let delivery = Arc::new(DeliveryResolver::new(
        gateway.clone(),
        anchors,
        config.operator_id.clone(),
        config.support_channel_id.clone(),
    ));
    let relay = Arc::new(RelayRouter::new(
        gateway.clone(),
        delivery.clone(),
        config.operator_id.clone(),
        config.support_channel_id.clone(),
    ));
    let intake = Arc::new(Intake::new(
        gateway.clone(),
        delivery,
        config.report_forum_id.clone(),
        config.support_channel_id.clone(),
    ));
    let panel = Arc::new(PanelManager::new(
        gateway.clone(),
        config.panel_channel_id.clone(),
    ));

    Arc::new(App::new(gateway, config, panel, relay, intake))
}

pub async fn run(config: Config) -> Result<()> {
    let rest = Arc::new(RestGateway::new(config.token.clone()));

    // Resolve the acting identity up front; it doubles as a credential check.
    let me = rest.current_user().await?;
    rest.set_application_id(&me.id);
    info!(bot_user_id = %me.id, "authenticated");

    let gateway: Arc<dyn Gateway> = rest.clone();
    let app = build_app(gateway, config.clone());

    let health_port = config.health_port;
    tokio::spawn(async move {
        if let Err(e) = crate::health::run(health_port).await {
            error!("health endpoint failed: {e}");
        }
    });

    let (tx, mut rx) = tokio::sync::mpsc::channel::<Event>(64);

    // Socket supervisor: reconnect with doubling backoff, reset on a clean run.
    let token = config.token.clone();
    let client = rest.http_client();
    tokio::spawn(async move {
        let mut backoff = INITIAL_BACKOFF_SECS;
        loop {
            match ws::run(&token, &client, tx.clone()).await {
                Ok(()) => {
                    warn!("gateway socket closed, reconnecting");
                    backoff = INITIAL_BACKOFF_SECS;
                }
                Err(e) => {
                    error!("gateway socket failed: {e}");
                }
            }
            tokio::time::sleep(Duration::from_secs(backoff)).await;
            backoff = backoff.saturating_mul(2).min(MAX_BACKOFF_SECS);
        }
    });

    info!("deskrelay daemon started; ctrl-c to stop");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown requested");
                break;
            }
            event = rx.recv() => {
                let Some(event) = event else { break };
                let app = app.clone();
                // Handlers run to completion as independent tasks; state maps
                // are only read-then-written within one handler invocation.
                tokio::spawn(async move { app.handle_event(event).await });
            }
        }
    }

    Ok(())
}
