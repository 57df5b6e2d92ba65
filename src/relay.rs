//! Two-way relay between requesters and the operator.
//!
//! The process keeps no durable session table. Routing a reply from the
//! operator back to the right requester works by embedding the requester's id
//! in every operator-facing message (a delimited token on the final line) and
//! recovering it from the reply chain: the operator replies to a delivered
//! envelope, the referenced message is fetched, and the token names the
//! forward target. Anchors only remember the latest delivered message per
//! participant; everything is memory-resident and lost on restart.

use crate::delivery::{DeliveryOutcome, DeliveryResolver};
use crate::gateway::{Gateway, MessageInfo, OutboundMessage, UserInfo};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Opening delimiter of the routing token. The white corner brackets cannot
/// be produced by ordinary chat input, which keeps user-authored text from
/// colliding with the token.
const REF_OPEN: &str = "\u{27e6}ref:";
const REF_CLOSE: char = '\u{27e7}';

/// Payload forwarded between requester and operator.
#[derive(Debug, Clone)]
pub struct RelayEnvelope {
    pub sender_display: String,
    pub sender_id: String,
    pub origin_space_name: Option<String>,
    pub body: String,
    pub attachment_urls: Vec<String>,
}

impl RelayEnvelope {
    pub fn from_message(author: &UserInfo, message: &MessageInfo, origin: Option<String>) -> Self {
        Self {
            sender_display: author.display_name.clone(),
            sender_id: author.id.clone(),
            origin_space_name: origin,
            body: message.content.clone(),
            attachment_urls: message.attachment_urls.clone(),
        }
    }

    /// Render the operator-facing message. The routing token is always the
    /// final line; omitting it would make the conversation unroutable.
    pub fn render(&self) -> String {
        let origin = self
            .origin_space_name
            .as_deref()
            .unwrap_or("direct message");
        let mut out = format!("**{}** ({origin}):\n{}", self.sender_display, self.body);
        for url in &self.attachment_urls {
            out.push('\n');
            out.push_str(url);
        }
        out.push_str(&format!("\n{REF_OPEN}{}{REF_CLOSE}", self.sender_id));
        out
    }
}

/// Extract the participant id from a delivered envelope's routing token.
///
/// Returns `None` for messages without a well-formed token (wrong delimiters,
/// empty, or non-digit payload) — those are not relay-eligible.
pub fn extract_participant_id(content: &str) -> Option<&str> {
    let start = content.rfind(REF_OPEN)? + REF_OPEN.len();
    let rest = &content[start..];
    let end = rest.find(REF_CLOSE)?;
    let id = &rest[..end];
    if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(id)
}

/// Last-known anchor message per participant. Overwrite-only: the most recent
/// delivered envelope is the only valid reply target.
#[derive(Default)]
pub struct Anchors {
    inner: Mutex<HashMap<String, String>>,
}

impl Anchors {
    pub fn record(&self, participant_id: &str, message_id: &str) {
        self.inner
            .lock()
            .insert(participant_id.to_string(), message_id.to_string());
    }

    pub fn get(&self, participant_id: &str) -> Option<String> {
        self.inner.lock().get(participant_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

pub struct RelayRouter {
    gateway: Arc<dyn Gateway>,
    delivery: Arc<DeliveryResolver>,
    operator_id: String,
    support_channel_id: String,
}

impl RelayRouter {
    pub fn new(
        gateway: Arc<dyn Gateway>,
        delivery: Arc<DeliveryResolver>,
        operator_id: String,
        support_channel_id: String,
    ) -> Self {
        Self {
            gateway,
            delivery,
            operator_id,
            support_channel_id,
        }
    }

    /// Requester → operator: wrap the message and deliver it, updating the
    /// requester's anchor on success. Total failure produces a best-effort
    /// moderation notice; it never propagates.
    pub async fn forward_to_operator(
        &self,
        author: &UserInfo,
        message: &MessageInfo,
        origin_space_name: Option<String>,
    ) -> anyhow::Result<()> {
        let envelope = RelayEnvelope::from_message(author, message, origin_space_name);
        match self.delivery.deliver(None, author, &envelope).await {
            DeliveryOutcome::Delivered { via, .. } => {
                debug!(requester = %author.id, ?via, "relayed message to operator");
                Ok(())
            }
            DeliveryOutcome::Failed {
                classification,
                raw_code,
            } => {
                warn!(
                    requester = %author.id,
                    ?classification,
                    ?raw_code,
                    "relay to operator failed on all strategies"
                );
                let notice = OutboundMessage::text(format!(
                    "Could not relay a message from **{}** (`{}`) to the operator: {}.",
                    author.display_name,
                    author.id,
                    classification.user_explanation()
                ));
                if let Err(e) = self
                    .gateway
                    .send_message(&self.support_channel_id, &notice)
                    .await
                {
                    warn!("moderation notice failed: {e}");
                }
                Ok(())
            }
        }
    }

    /// Operator → requester: only explicit replies to bot-authored messages
    /// carrying a routing token are relays; everything else is silently
    /// ignored.
    pub async fn handle_operator_message(
        &self,
        bot_user_id: &str,
        operator: &UserInfo,
        message: &MessageInfo,
    ) -> anyhow::Result<()> {
        if operator.id != self.operator_id {
            return Ok(());
        }

        let Some(reference) = &message.reference else {
            debug!("operator message without reply reference, ignoring");
            return Ok(());
        };

        let channel_id = if reference.channel_id.is_empty() {
            message.channel_id.clone()
        } else {
            reference.channel_id.clone()
        };
        let referenced = self
            .gateway
            .fetch_message(&channel_id, &reference.message_id)
            .await?;

        if referenced.author_id != bot_user_id {
            debug!("reply target not authored by the bot, ignoring");
            return Ok(());
        }

        let Some(participant_id) = extract_participant_id(&referenced.content) else {
            debug!("reply target carries no routing token, ignoring");
            return Ok(());
        };

        let requester = crate::resolver::resolve_user(self.gateway.as_ref(), participant_id).await?;

        let mut content = format!(
            "**{}** (operator):\n{}",
            operator.display_name, message.content
        );
        for url in &message.attachment_urls {
            content.push('\n');
            content.push_str(url);
        }

        let send = async {
            let dm = self.gateway.create_dm_channel(&requester.id).await?;
            self.gateway
                .send_message(&dm.id, &OutboundMessage::text(content))
                .await
        };

        match send.await {
            Ok(_) => {
                info!(requester = %requester.id, "forwarded operator reply");
            }
            Err(e) => {
                // No retry, no queueing: tell the operator and move on.
                warn!(requester = %requester.id, "operator reply undeliverable: {e}");
                // Threaded under the reply that failed, so the operator can
                // tell which of several outstanding conversations broke.
                let diagnostic = OutboundMessage {
                    content: format!(
                        "Could not deliver your reply to **{}**: {}.",
                        requester.display_name,
                        crate::delivery::classify(&e).user_explanation()
                    ),
                    reply_to: Some(message.id.clone()),
                    ..OutboundMessage::default()
                };
                if let Err(e) = self.gateway.send_message(&message.channel_id, &diagnostic).await {
                    warn!("operator diagnostic failed: {e}");
                }
            }
        }

        Ok(())
    }
}
