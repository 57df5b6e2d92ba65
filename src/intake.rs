//! Structured form submissions: validation and dispatch.
//!
//! Two submission kinds exist. Reports become public forum threads; contact
//! requests go through the delivery resolver. Field limits are re-checked
//! here even though the platform's input widgets nominally enforce them.

use crate::delivery::{DeliveryOutcome, DeliveryResolver, DeliveryVia};
use crate::error::ValidationError;
use crate::gateway::{ApiError, Gateway, OutboundMessage, UserInfo};
use crate::relay::RelayEnvelope;
use crate::resolver::{self, ResolveError};
use std::sync::Arc;
use tracing::{info, warn};

/// Modal id for the report form.
pub const MODAL_REPORT: &str = "deskrelay:modal:report";
/// Modal id for the contact-operator form.
pub const MODAL_CONTACT: &str = "deskrelay:modal:contact";

pub const FIELD_TITLE: &str = "report_title";
pub const FIELD_DETAILS: &str = "report_details";
pub const FIELD_MESSAGE: &str = "contact_message";

pub const TITLE_MAX: usize = 90;
pub const DETAILS_MAX: usize = 1500;
pub const MESSAGE_MAX: usize = 1500;

/// The closed set of submission kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    Report { title: String, details: String },
    ContactOperator { message: String },
}

#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Gateway(#[from] ApiError),
}

fn validate_field(
    field: &'static str,
    value: &str,
    max: usize,
) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }
    if trimmed.chars().count() > max {
        return Err(ValidationError::new(
            field,
            format!("must be at most {max} characters"),
        ));
    }
    Ok(trimmed.to_string())
}

pub struct Intake {
    gateway: Arc<dyn Gateway>,
    delivery: Arc<DeliveryResolver>,
    report_forum_id: String,
    support_channel_id: String,
}

impl Intake {
    pub fn new(
        gateway: Arc<dyn Gateway>,
        delivery: Arc<DeliveryResolver>,
        report_forum_id: String,
        support_channel_id: String,
    ) -> Self {
        Self {
            gateway,
            delivery,
            report_forum_id,
            support_channel_id,
        }
    }

    /// Dispatch a validated submission, returning the requester-visible
    /// confirmation text.
    pub async fn handle(
        &self,
        user: &UserInfo,
        origin_guild: Option<&str>,
        origin_guild_name: Option<String>,
        submission: Submission,
    ) -> Result<String, IntakeError> {
        match submission {
            Submission::Report { title, details } => {
                self.handle_report(user, &title, &details).await
            }
            Submission::ContactOperator { message } => {
                self.handle_contact(user, origin_guild, origin_guild_name, &message)
                    .await
            }
        }
    }

    async fn handle_report(
        &self,
        user: &UserInfo,
        title: &str,
        details: &str,
    ) -> Result<String, IntakeError> {
        let title = validate_field("title", title, TITLE_MAX)?;
        let details = validate_field("details", details, DETAILS_MAX)?;

        let forum = resolver::resolve_forum(self.gateway.as_ref(), &self.report_forum_id).await?;

        let name = clip(&format!("{title} - {}", user.display_name), 100);
        let body = format!(
            "Report from **{}** (`{}`):\n\n**{title}**\n{details}",
            user.display_name, user.id
        );

        let thread = self
            .gateway
            .create_forum_thread(&forum.id, &name, &body)
            .await?;

        info!(thread_id = %thread.id, requester = %user.id, "report thread created");
        Ok(format!("Your report has been filed: <#{}>", thread.id))
    }

    async fn handle_contact(
        &self,
        user: &UserInfo,
        origin_guild: Option<&str>,
        origin_guild_name: Option<String>,
        message: &str,
    ) -> Result<String, IntakeError> {
        let message = validate_field("message", message, MESSAGE_MAX)?;

        let envelope = RelayEnvelope {
            sender_display: user.display_name.clone(),
            sender_id: user.id.clone(),
            origin_space_name: origin_guild_name,
            body: message,
            attachment_urls: Vec::new(),
        };

        match self.delivery.deliver(origin_guild, user, &envelope).await {
            DeliveryOutcome::Delivered {
                via: DeliveryVia::FallbackThread,
                channel_id,
                ..
            } => Ok(format!(
                "The operator could not be reached directly, so a private support thread \
                 was opened for you: <#{channel_id}>"
            )),
            DeliveryOutcome::Delivered { .. } => {
                Ok("Your message was sent to the operator. You will get a reply here.".to_string())
            }
            DeliveryOutcome::Failed {
                classification,
                raw_code,
            } => {
                warn!(requester = %user.id, ?classification, ?raw_code, "contact delivery failed");
                // Best-effort moderation notice; its failure never masks the
                // requester-visible outcome.
                let notice = OutboundMessage::text(format!(
                    "A contact request from **{}** (`{}`) could not be delivered: {}.",
                    user.display_name,
                    user.id,
                    classification.user_explanation()
                ));
                if let Err(e) = self
                    .gateway
                    .send_message(&self.support_channel_id, &notice)
                    .await
                {
                    warn!("moderation notice failed: {e}");
                }
                Ok(format!(
                    "Sorry, your message could not be delivered: {}. \
                     Please try again later or post in the support channel.",
                    classification.user_explanation()
                ))
            }
        }
    }
}

fn clip(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    s.chars().take(max_chars.saturating_sub(3)).collect::<String>() + "..."
}
