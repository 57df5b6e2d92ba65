//! Panel lifecycle: exactly one interactive entry-point message per guild.
//!
//! `ensure` is idempotent across restarts: instead of trusting local state it
//! scans recent channel history for a bot-authored message that still carries
//! both controls, and only posts a fresh panel when none survives. Deleting
//! the tracked message triggers exactly one recreation.

use crate::gateway::{ButtonSpec, ButtonStyle, Gateway, OutboundMessage};
use crate::resolver::{self, ResolveError};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Control id for the "file a report" button.
pub const CONTROL_REPORT: &str = "deskrelay:report";
/// Control id for the "contact the operator" button.
pub const CONTROL_CONTACT: &str = "deskrelay:contact";

/// How many recent messages to scan for a surviving panel.
const SCAN_WINDOW: u8 = 50;

const PANEL_TEXT: &str = "**Support desk**\n\
    Something broken? File a report and we will open a public thread for it.\n\
    Need a person? Contact the operator privately.";

fn panel_message() -> OutboundMessage {
    OutboundMessage {
        content: PANEL_TEXT.to_string(),
        buttons: vec![
            ButtonSpec {
                custom_id: CONTROL_REPORT.to_string(),
                label: "File a report".to_string(),
                style: ButtonStyle::Primary,
            },
            ButtonSpec {
                custom_id: CONTROL_CONTACT.to_string(),
                label: "Contact operator".to_string(),
                style: ButtonStyle::Secondary,
            },
        ],
        ..OutboundMessage::default()
    }
}

pub struct PanelManager {
    gateway: Arc<dyn Gateway>,
    channel_id: String,
    bot_user_id: RwLock<Option<String>>,
    tracked: Mutex<HashMap<String, String>>,
}

impl PanelManager {
    pub fn new(gateway: Arc<dyn Gateway>, channel_id: String) -> Self {
        Self {
            gateway,
            channel_id,
            bot_user_id: RwLock::new(None),
            tracked: Mutex::new(HashMap::new()),
        }
    }

    /// Record the acting identity once the gateway session is ready.
    pub fn set_bot_user(&self, user_id: &str) {
        *self.bot_user_id.write() = Some(user_id.to_string());
    }

    pub fn tracked_message(&self, guild_id: &str) -> Option<String> {
        self.tracked.lock().get(guild_id).cloned()
    }

    /// Make sure the panel exists in the designated channel.
    ///
    /// Returns the tracked message id, or `None` when the bot lacks access to
    /// the channel — permission absence is an expected operator-configuration
    /// state and a silent skip, not an error. Configuration errors (missing
    /// or wrong-kind channel) fail the call for this guild only.
    pub async fn ensure(&self, guild_id: &str) -> Result<Option<String>, ResolveError> {
        resolver::resolve_text_channel(self.gateway.as_ref(), &self.channel_id).await?;

        let bot_user_id = self.bot_user_id.read().clone().unwrap_or_default();

        // History scan doubles as the access probe: a permission-shaped error
        // means we cannot self-heal in this channel, so skip quietly.
        let history = match self.gateway.recent_messages(&self.channel_id, SCAN_WINDOW).await {
            Ok(history) => history,
            Err(e) if e.is_permission_denied() => {
                debug!(guild_id, "no channel access, skipping panel ensure");
                return Ok(None);
            }
            Err(e) => {
                return Err(ResolveError::Gateway {
                    id: self.channel_id.clone(),
                    source: e,
                })
            }
        };

        let surviving = history.iter().find(|m| {
            m.author_id == bot_user_id
                && m.component_ids.iter().any(|id| id == CONTROL_REPORT)
                && m.component_ids.iter().any(|id| id == CONTROL_CONTACT)
        });

        if let Some(found) = surviving {
            if !found.pinned {
                self.pin_if_permitted(&found.id).await;
            }
            self.tracked
                .lock()
                .insert(guild_id.to_string(), found.id.clone());
            debug!(guild_id, message_id = %found.id, "reusing surviving panel");
            return Ok(Some(found.id.clone()));
        }

        let sent = match self
            .gateway
            .send_message(&self.channel_id, &panel_message())
            .await
        {
            Ok(message) => message,
            Err(e) if e.is_permission_denied() => {
                debug!(guild_id, "cannot post in panel channel, skipping");
                return Ok(None);
            }
            Err(e) => {
                return Err(ResolveError::Gateway {
                    id: self.channel_id.clone(),
                    source: e,
                })
            }
        };

        self.pin_if_permitted(&sent.id).await;
        self.tracked
            .lock()
            .insert(guild_id.to_string(), sent.id.clone());
        info!(guild_id, message_id = %sent.id, "posted panel");
        Ok(Some(sent.id))
    }

    /// Deletion notification. Recreates the panel only when the deleted
    /// message is the one we track; anything else is not ours or already
    /// superseded.
    pub async fn on_deleted(
        &self,
        guild_id: &str,
        message_id: &str,
    ) -> Result<Option<String>, ResolveError> {
        let is_ours = self
            .tracked
            .lock()
            .get(guild_id)
            .is_some_and(|tracked| tracked.as_str() == message_id);
        if !is_ours {
            return Ok(None);
        }

        info!(guild_id, message_id, "tracked panel deleted, recreating");
        self.ensure(guild_id).await
    }

    async fn pin_if_permitted(&self, message_id: &str) {
        match self.gateway.pin_message(&self.channel_id, message_id).await {
            Ok(()) => {}
            Err(e) if e.is_permission_denied() => {
                debug!("no pin permission, leaving panel unpinned");
            }
            Err(e) => warn!("pin failed: {e}"),
        }
    }
}
