//! Periodic promo broadcast. Deliberately thin: an external trigger (cron or
//! the CLI) supplies resolved option values and this module only composes and
//! sends the embed.

use crate::gateway::{EmbedSpec, Gateway, OutboundMessage};
use tracing::info;

#[derive(Debug, Clone, Default)]
pub struct PromoOptions {
    pub title: String,
    pub subtitle: Option<String>,
    pub min_games: Option<u32>,
    pub deposit_required: bool,
    /// Destination channel; falls back to the configured support channel.
    pub channel: Option<String>,
    pub banner_url: Option<String>,
    pub ping_everyone: bool,
}

pub fn compose(options: &PromoOptions) -> OutboundMessage {
    let mut fields = Vec::new();
    if let Some(min_games) = options.min_games {
        fields.push(("Minimum games".to_string(), min_games.to_string()));
    }
    fields.push((
        "Deposit".to_string(),
        if options.deposit_required {
            "required".to_string()
        } else {
            "not required".to_string()
        },
    ));

    OutboundMessage {
        content: if options.ping_everyone {
            "@everyone".to_string()
        } else {
            String::new()
        },
        embed: Some(EmbedSpec {
            title: Some(options.title.clone()),
            description: options.subtitle.clone(),
            image_url: options.banner_url.clone(),
            fields,
        }),
        mention_everyone: options.ping_everyone,
        ..OutboundMessage::default()
    }
}

/// Send the promo embed, returning the delivered message id.
pub async fn broadcast(
    gateway: &dyn Gateway,
    default_channel_id: &str,
    options: &PromoOptions,
) -> anyhow::Result<String> {
    let channel_id = options.channel.as_deref().unwrap_or(default_channel_id);
    let message = gateway.send_message(channel_id, &compose(options)).await?;
    info!(channel_id, message_id = %message.id, "promo broadcast sent");
    Ok(message.id)
}
