//! Closed event model and the dispatcher.
//!
//! Every inbound gateway payload is translated (in [`crate::gateway::ws`])
//! into one variant of [`Event`]; dispatch is an exhaustive match, never
//! ad-hoc property probing. Interaction handlers run inside a catch-all
//! boundary that guarantees exactly one response reaches the initiating
//! request: reply if nothing was sent yet, edit of the deferred
//! acknowledgement otherwise, and a final silent drop only when both paths
//! are exhausted.

use crate::config::Config;
use crate::cooldown::CooldownGate;
use crate::gateway::{
    Gateway, InteractionResponse, MessageInfo, ModalInput, ModalSpec, UserInfo,
};
use crate::intake::{
    Intake, IntakeError, Submission, DETAILS_MAX, MESSAGE_MAX, MODAL_CONTACT, MODAL_REPORT,
    TITLE_MAX,
};
use crate::panel::{PanelManager, CONTROL_CONTACT, CONTROL_REPORT};
use crate::relay::RelayRouter;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

const COOLDOWN_REPLY: &str = "Easy there - please wait a moment and try again.";
const GENERIC_FAILURE: &str =
    "Something went wrong handling your request. Please contact an administrator.";

/// Identifies an in-flight interaction for response purposes.
#[derive(Debug, Clone)]
pub struct InteractionHandle {
    pub id: String,
    pub token: String,
}

/// All inbound events, as a closed tagged type.
#[derive(Debug, Clone)]
pub enum Event {
    Ready {
        bot_user_id: String,
    },
    GuildAvailable {
        guild_id: String,
    },
    ControlActivation {
        interaction: InteractionHandle,
        guild_id: Option<String>,
        user: UserInfo,
        control_id: String,
    },
    FormSubmission {
        interaction: InteractionHandle,
        guild_id: Option<String>,
        user: UserInfo,
        submission: Submission,
    },
    MessageReceived {
        guild_id: Option<String>,
        author: UserInfo,
        message: MessageInfo,
    },
    MessageDeleted {
        guild_id: Option<String>,
        channel_id: String,
        message_id: String,
    },
}

fn report_modal() -> ModalSpec {
    ModalSpec {
        custom_id: MODAL_REPORT.to_string(),
        title: "File a report".to_string(),
        inputs: vec![
            ModalInput {
                custom_id: crate::intake::FIELD_TITLE.to_string(),
                label: "Title".to_string(),
                paragraph: false,
                max_length: TITLE_MAX as u16,
            },
            ModalInput {
                custom_id: crate::intake::FIELD_DETAILS.to_string(),
                label: "What happened?".to_string(),
                paragraph: true,
                max_length: DETAILS_MAX as u16,
            },
        ],
    }
}

fn contact_modal() -> ModalSpec {
    ModalSpec {
        custom_id: MODAL_CONTACT.to_string(),
        title: "Contact the operator".to_string(),
        inputs: vec![ModalInput {
            custom_id: crate::intake::FIELD_MESSAGE.to_string(),
            label: "Your message".to_string(),
            paragraph: true,
            max_length: MESSAGE_MAX as u16,
        }],
    }
}

/// Tracks what has already been sent for an interaction so the boundary can
/// guarantee exactly one response.
struct Responder<'a> {
    gateway: &'a dyn Gateway,
    interaction: &'a InteractionHandle,
    deferred: bool,
    responded: bool,
}

impl<'a> Responder<'a> {
    fn new(gateway: &'a dyn Gateway, interaction: &'a InteractionHandle) -> Self {
        Self {
            gateway,
            interaction,
            deferred: false,
            responded: false,
        }
    }

    async fn reply(&mut self, content: &str) -> anyhow::Result<()> {
        self.gateway
            .respond_interaction(
                &self.interaction.id,
                &self.interaction.token,
                &InteractionResponse::Reply {
                    content: content.to_string(),
                    ephemeral: true,
                },
            )
            .await?;
        self.responded = true;
        Ok(())
    }

    async fn defer(&mut self) -> anyhow::Result<()> {
        self.gateway
            .respond_interaction(
                &self.interaction.id,
                &self.interaction.token,
                &InteractionResponse::Defer { ephemeral: true },
            )
            .await?;
        self.deferred = true;
        Ok(())
    }

    async fn modal(&mut self, spec: ModalSpec) -> anyhow::Result<()> {
        self.gateway
            .respond_interaction(
                &self.interaction.id,
                &self.interaction.token,
                &InteractionResponse::Modal(spec),
            )
            .await?;
        self.responded = true;
        Ok(())
    }

    /// Deliver the final user-visible text through whichever path is still
    /// open. Both paths failing ends in a silent drop, by design.
    async fn finish(&mut self, content: &str) {
        if self.deferred {
            if let Err(e) = self
                .gateway
                .edit_interaction_response(&self.interaction.token, content)
                .await
            {
                warn!("deferred response edit failed: {e}");
            }
            return;
        }
        if !self.responded {
            if let Err(e) = self.reply(content).await {
                warn!("interaction reply failed, dropping response: {e}");
            }
        }
    }
}

/// Process-scoped application state; owns the managers and dispatches events.
pub struct App {
    pub gateway: Arc<dyn Gateway>,
    pub config: Config,
    pub panel: Arc<PanelManager>,
    pub relay: Arc<RelayRouter>,
    pub intake: Arc<Intake>,
    pub cooldown: CooldownGate,
    bot_user_id: RwLock<Option<String>>,
}

impl App {
    pub fn new(
        gateway: Arc<dyn Gateway>,
        config: Config,
        panel: Arc<PanelManager>,
        relay: Arc<RelayRouter>,
        intake: Arc<Intake>,
    ) -> Self {
        let cooldown = CooldownGate::new(Duration::from_secs(config.cooldown_secs));
        Self {
            gateway,
            config,
            panel,
            relay,
            intake,
            cooldown,
            bot_user_id: RwLock::new(None),
        }
    }

    pub fn bot_user_id(&self) -> Option<String> {
        self.bot_user_id.read().clone()
    }

    /// Exhaustive dispatch. Never panics and never lets a handler error
    /// escape the event loop.
    pub async fn handle_event(&self, event: Event) {
        match event {
            Event::Ready { bot_user_id } => {
                *self.bot_user_id.write() = Some(bot_user_id.clone());
                self.panel.set_bot_user(&bot_user_id);
                if let Some(guild_id) = self.config.guild_id.clone() {
                    self.ensure_panel(&guild_id).await;
                }
            }
            Event::GuildAvailable { guild_id } => {
                let in_scope = self
                    .config
                    .guild_id
                    .as_ref()
                    .map_or(true, |configured| *configured == guild_id);
                if in_scope {
                    self.ensure_panel(&guild_id).await;
                }
            }
            Event::ControlActivation {
                interaction,
                guild_id,
                user,
                control_id,
            } => {
                let mut responder = Responder::new(self.gateway.as_ref(), &interaction);
                if let Err(e) = self
                    .handle_control(&mut responder, guild_id.as_deref(), &user, &control_id)
                    .await
                {
                    error!(user = %user.id, control_id, "control handler failed: {e:#}");
                    responder.finish(GENERIC_FAILURE).await;
                }
            }
            Event::FormSubmission {
                interaction,
                guild_id,
                user,
                submission,
            } => {
                let mut responder = Responder::new(self.gateway.as_ref(), &interaction);
                if let Err(e) = self
                    .handle_submission(&mut responder, guild_id.as_deref(), &user, submission)
                    .await
                {
                    error!(user = %user.id, "submission handler failed: {e:#}");
                    responder.finish(GENERIC_FAILURE).await;
                }
            }
            Event::MessageReceived {
                guild_id,
                author,
                message,
            } => {
                if let Err(e) = self.handle_message(guild_id.as_deref(), &author, &message).await
                {
                    // Relay failures are logged, never crash the loop.
                    error!(author = %author.id, "message handler failed: {e:#}");
                }
            }
            Event::MessageDeleted {
                guild_id,
                channel_id: _,
                message_id,
            } => {
                let Some(guild_id) = guild_id else {
                    return;
                };
                match self.panel.on_deleted(&guild_id, &message_id).await {
                    Ok(Some(new_id)) => debug!(%guild_id, %new_id, "panel recreated"),
                    Ok(None) => {}
                    Err(e) => error!(%guild_id, "panel recreation failed: {e}"),
                }
            }
        }
    }

    async fn ensure_panel(&self, guild_id: &str) {
        match self.panel.ensure(guild_id).await {
            Ok(Some(message_id)) => debug!(guild_id, %message_id, "panel ensured"),
            Ok(None) => debug!(guild_id, "panel ensure skipped"),
            // Scoped-fatal: this guild's panel is broken, others unaffected.
            Err(e) => error!(guild_id, "panel ensure failed: {e}"),
        }
    }

    async fn handle_control(
        &self,
        responder: &mut Responder<'_>,
        guild_id: Option<&str>,
        user: &UserInfo,
        control_id: &str,
    ) -> anyhow::Result<()> {
        if control_id != CONTROL_REPORT && control_id != CONTROL_CONTACT {
            // A panel from an older deployment can carry control ids this
            // build no longer knows; the activation still gets its one
            // response instead of a dangling spinner.
            debug!(control_id, "unrecognized control");
            responder.reply(GENERIC_FAILURE).await?;
            return Ok(());
        }

        let space = guild_id.unwrap_or("dm");
        if !self.cooldown.check(space, &user.id, control_id) {
            responder.reply(COOLDOWN_REPLY).await?;
            return Ok(());
        }

        let spec = if control_id == CONTROL_REPORT {
            report_modal()
        } else {
            contact_modal()
        };
        responder.modal(spec).await?;
        Ok(())
    }

    async fn handle_submission(
        &self,
        responder: &mut Responder<'_>,
        guild_id: Option<&str>,
        user: &UserInfo,
        submission: Submission,
    ) -> anyhow::Result<()> {
        // Thread creation and delivery involve several remote calls; defer so
        // the interaction does not time out.
        responder.defer().await?;

        let guild_name = match guild_id {
            Some(id) => self.gateway.fetch_guild_name(id).await.ok(),
            None => None,
        };

        let outcome = self
            .intake
            .handle(user, guild_id, guild_name, submission)
            .await;

        match outcome {
            Ok(confirmation) => responder.finish(&confirmation).await,
            Err(IntakeError::Validation(v)) => responder.finish(&v.user_message()).await,
            Err(e) => {
                // Specific in the log, generic to the end user.
                error!(user = %user.id, "submission dispatch failed: {e}");
                responder.finish(GENERIC_FAILURE).await;
            }
        }
        Ok(())
    }

    async fn handle_message(
        &self,
        guild_id: Option<&str>,
        author: &UserInfo,
        message: &MessageInfo,
    ) -> anyhow::Result<()> {
        if author.bot {
            return Ok(());
        }
        let bot_user_id = self.bot_user_id().unwrap_or_default();
        if author.id == bot_user_id {
            return Ok(());
        }
        // Guild traffic is handled through interactions, not free text.
        if guild_id.is_some() {
            return Ok(());
        }

        if author.id == self.config.operator_id {
            self.relay
                .handle_operator_message(&bot_user_id, author, message)
                .await
        } else {
            self.relay.forward_to_operator(author, message, None).await
        }
    }
}
