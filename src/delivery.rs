//! Multi-strategy delivery of an envelope to the operator.
//!
//! Strategies form an ordered list with a uniform result shape, iterated
//! until the first success. Each failure is classified from the remote error
//! code; an `InvalidRecipient` classification is fatal and stops the chain,
//! anything else falls through to the next strategy.

use crate::error::Classification;
use crate::gateway::{
    ApiError, Gateway, OutboundMessage, UserInfo, CODE_CANNOT_MESSAGE_USER, CODE_INVALID_RECIPIENT,
};
use crate::relay::{Anchors, RelayEnvelope};
use std::sync::Arc;
use tracing::{debug, warn};

/// Which strategy ultimately delivered the envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryVia {
    DirectSend,
    ExplicitChannelSend,
    FallbackThread,
}

#[derive(Debug, Clone)]
pub enum DeliveryOutcome {
    Delivered {
        via: DeliveryVia,
        channel_id: String,
        message_id: String,
    },
    Failed {
        classification: Classification,
        raw_code: Option<u32>,
    },
}

/// Map a remote error to a delivery classification.
pub fn classify(err: &ApiError) -> Classification {
    match err.code {
        Some(CODE_CANNOT_MESSAGE_USER) => Classification::RecipientUnreachable,
        Some(CODE_INVALID_RECIPIENT) => Classification::InvalidRecipient,
        _ => Classification::Unknown,
    }
}

/// Per-attempt result: delivered, not applicable in this context, or failed
/// with a classification.
enum Attempt {
    Delivered {
        via: DeliveryVia,
        channel_id: String,
        message_id: String,
    },
    Skipped,
    Failed {
        classification: Classification,
        raw_code: Option<u32>,
    },
}

impl Attempt {
    fn from_error(err: &ApiError) -> Self {
        Self::Failed {
            classification: classify(err),
            raw_code: err.code,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Strategy {
    Direct,
    ExplicitChannel,
    FallbackThread,
}

const STRATEGY_ORDER: [Strategy; 3] = [
    Strategy::Direct,
    Strategy::ExplicitChannel,
    Strategy::FallbackThread,
];

pub struct DeliveryResolver {
    gateway: Arc<dyn Gateway>,
    anchors: Arc<Anchors>,
    operator_id: String,
    support_channel_id: String,
}

impl DeliveryResolver {
    pub fn new(
        gateway: Arc<dyn Gateway>,
        anchors: Arc<Anchors>,
        operator_id: String,
        support_channel_id: String,
    ) -> Self {
        Self {
            gateway,
            anchors,
            operator_id,
            support_channel_id,
        }
    }

    /// Try each strategy in order until one delivers. On success the
    /// requester's conversation anchor is overwritten with the delivered
    /// message id; on total failure the last classification is returned and
    /// surfacing a moderation notice is the caller's responsibility.
    pub async fn deliver(
        &self,
        origin_guild: Option<&str>,
        requester: &UserInfo,
        envelope: &RelayEnvelope,
    ) -> DeliveryOutcome {
        let mut last = (Classification::Unknown, None);

        for strategy in STRATEGY_ORDER {
            let attempt = match strategy {
                Strategy::Direct => self.direct_send(origin_guild, envelope).await,
                Strategy::ExplicitChannel => self.explicit_channel_send(envelope).await,
                Strategy::FallbackThread => self.fallback_thread(requester, envelope).await,
            };

            match attempt {
                Attempt::Delivered {
                    via,
                    channel_id,
                    message_id,
                } => {
                    self.anchors.record(&requester.id, &message_id);
                    debug!(requester = %requester.id, ?via, "envelope delivered");
                    return DeliveryOutcome::Delivered {
                        via,
                        channel_id,
                        message_id,
                    };
                }
                Attempt::Skipped => {
                    debug!(?strategy, "strategy not applicable, trying next");
                }
                Attempt::Failed {
                    classification,
                    raw_code,
                } => {
                    warn!(?strategy, ?classification, ?raw_code, "strategy failed");
                    if classification == Classification::InvalidRecipient {
                        // Non-human recipient: no strategy can ever succeed.
                        return DeliveryOutcome::Failed {
                            classification,
                            raw_code,
                        };
                    }
                    last = (classification, raw_code);
                }
            }
        }

        DeliveryOutcome::Failed {
            classification: last.0,
            raw_code: last.1,
        }
    }

    /// Strategy 1: member-scoped direct send. Applies only when the operator
    /// is addressable as a member of the originating guild.
    async fn direct_send(&self, origin_guild: Option<&str>, envelope: &RelayEnvelope) -> Attempt {
        let Some(guild_id) = origin_guild else {
            return Attempt::Skipped;
        };

        match self.gateway.fetch_member(guild_id, &self.operator_id).await {
            Ok(_) => {}
            Err(e) if e.is_not_found() => return Attempt::Skipped,
            Err(e) => return Attempt::from_error(&e),
        }

        self.dm_send(DeliveryVia::DirectSend, envelope).await
    }

    /// Strategy 2: force-resolve the operator platform-wide and open the DM
    /// channel explicitly. Attempted even when strategy 1 never applied.
    async fn explicit_channel_send(&self, envelope: &RelayEnvelope) -> Attempt {
        let operator = match self.gateway.fetch_user(&self.operator_id).await {
            Ok(user) => user,
            Err(e) => return Attempt::from_error(&e),
        };

        if operator.bot {
            // A non-human account can never receive the envelope.
            return Attempt::Failed {
                classification: Classification::InvalidRecipient,
                raw_code: None,
            };
        }

        self.dm_send(DeliveryVia::ExplicitChannelSend, envelope).await
    }

    /// Strategy 3: private thread in the support channel, with the requester
    /// (and operator, best-effort) added as members.
    async fn fallback_thread(&self, requester: &UserInfo, envelope: &RelayEnvelope) -> Attempt {
        let name = thread_name(&requester.display_name);
        let thread = match self
            .gateway
            .create_private_thread(&self.support_channel_id, &name)
            .await
        {
            Ok(thread) => thread,
            Err(e) => return Attempt::from_error(&e),
        };

        if let Err(e) = self.gateway.add_thread_member(&thread.id, &requester.id).await {
            warn!("could not add requester to fallback thread: {e}");
        }
        if let Err(e) = self
            .gateway
            .add_thread_member(&thread.id, &self.operator_id)
            .await
        {
            warn!("could not add operator to fallback thread: {e}");
        }

        match self
            .gateway
            .send_message(&thread.id, &OutboundMessage::text(envelope.render()))
            .await
        {
            Ok(message) => Attempt::Delivered {
                via: DeliveryVia::FallbackThread,
                channel_id: thread.id,
                message_id: message.id,
            },
            Err(e) => Attempt::from_error(&e),
        }
    }

    async fn dm_send(&self, via: DeliveryVia, envelope: &RelayEnvelope) -> Attempt {
        let dm = match self.gateway.create_dm_channel(&self.operator_id).await {
            Ok(channel) => channel,
            Err(e) => return Attempt::from_error(&e),
        };

        match self
            .gateway
            .send_message(&dm.id, &OutboundMessage::text(envelope.render()))
            .await
        {
            Ok(message) => Attempt::Delivered {
                via,
                channel_id: dm.id,
                message_id: message.id,
            },
            Err(e) => Attempt::from_error(&e),
        }
    }
}

fn thread_name(requester_display: &str) -> String {
    let mut name = format!("support: {requester_display}");
    // Thread names cap at 100 characters.
    if name.chars().count() > 100 {
        name = name.chars().take(97).collect::<String>() + "...";
    }
    name
}
