use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use deskrelay::config::Config;
use deskrelay::gateway::{Gateway, RestGateway};
use deskrelay::panel::PanelManager;
use deskrelay::promo::{self, PromoOptions};
use deskrelay::store::ClaimStore;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

/// Support-desk relay bot for Discord.
#[derive(Parser, Debug)]
#[command(name = "deskrelay")]
#[command(version)]
#[command(about = "Pinned request panel, forum reports, operator relay.", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the daemon (gateway listener, relay, health endpoint)
    Run,
    /// Post (or re-ensure) the panel once and exit
    Panel,
    /// Send a promo broadcast once and exit
    Promo {
        #[arg(long)]
        title: String,
        #[arg(long)]
        subtitle: Option<String>,
        #[arg(long)]
        min_games: Option<u32>,
        #[arg(long, default_value_t = false)]
        deposit_required: bool,
        /// Destination channel id; defaults to the support channel
        #[arg(long)]
        channel: Option<String>,
        #[arg(long)]
        banner_url: Option<String>,
        #[arg(long, default_value_t = false)]
        ping_everyone: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Install default crypto provider for Rustls TLS.
    if let Err(e) = rustls::crypto::ring::default_provider().install_default() {
        eprintln!("Warning: Failed to install default crypto provider: {e:?}");
    }

    let cli = Cli::parse();

    // Initialize logging - respects RUST_LOG env var, defaults to INFO
    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    // Missing or malformed environment fails the process before any
    // connection is opened.
    let config = Config::from_env().map_err(|e| anyhow::anyhow!("configuration: {e}"))?;

    match cli.command {
        Commands::Run => deskrelay::daemon::run(config).await,
        Commands::Panel => ensure_panel_once(config).await,
        Commands::Promo {
            title,
            subtitle,
            min_games,
            deposit_required,
            channel,
            banner_url,
            ping_everyone,
        } => {
            let options = PromoOptions {
                title,
                subtitle,
                min_games,
                deposit_required,
                channel,
                banner_url,
                ping_everyone,
            };
            promo_once(config, options).await
        }
    }
}

async fn ensure_panel_once(config: Config) -> Result<()> {
    let Some(guild_id) = config.guild_id.clone() else {
        bail!("GUILD_ID must be set for one-shot panel posting");
    };

    let rest = Arc::new(RestGateway::new(config.token.clone()));
    let me = rest.current_user().await?;

    let panel = PanelManager::new(rest, config.panel_channel_id.clone());
    panel.set_bot_user(&me.id);

    match panel.ensure(&guild_id).await? {
        Some(message_id) => {
            info!(%message_id, "panel ensured");
            println!("panel message: {message_id}");
        }
        None => println!("skipped: no access to the panel channel"),
    }
    Ok(())
}

async fn promo_once(config: Config, options: PromoOptions) -> Result<()> {
    let rest = Arc::new(RestGateway::new(config.token.clone()));
    let message_id = promo::broadcast(rest.as_ref(), &config.support_channel_id, &options).await?;
    println!("promo message: {message_id}");

    // Record the broadcast so later claim lookups can see it.
    if let Some(path) = &config.claim_db_path {
        let store = ClaimStore::open(path)?;
        let payload = serde_json::json!({ "title": options.title }).to_string();
        store.upsert(&format!("promo:{message_id}"), "sent", &payload)?;
    }
    Ok(())
}
