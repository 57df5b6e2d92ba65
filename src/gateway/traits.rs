//! Gateway abstraction over the Discord REST surface.
//!
//! The rest of the crate talks to Discord exclusively through the [`Gateway`]
//! trait so the panel, delivery, and relay logic can be exercised against an
//! in-memory fake. The real implementation lives in [`super::rest`].

use async_trait::async_trait;

/// Remote API failure with the platform's numeric error code attached.
///
/// Codes are load-bearing: callers classify failures by inspecting them, so
/// the REST layer must surface the JSON `code` field whenever one is present.
#[derive(Debug, Clone, thiserror::Error)]
#[error("discord api error (http {status}, code {code:?}): {message}")]
pub struct ApiError {
    pub status: u16,
    pub code: Option<u32>,
    pub message: String,
}

/// Cannot send messages to this user (blocked, or DMs closed).
pub const CODE_CANNOT_MESSAGE_USER: u32 = 50007;
/// Invalid recipient — the target is not a messageable account.
pub const CODE_INVALID_RECIPIENT: u32 = 50033;
/// Missing access to the channel or guild.
pub const CODE_MISSING_ACCESS: u32 = 50001;
/// Missing permissions for the attempted action.
pub const CODE_MISSING_PERMISSIONS: u32 = 50013;
/// Unknown channel.
pub const CODE_UNKNOWN_CHANNEL: u32 = 10003;
/// Unknown user.
pub const CODE_UNKNOWN_USER: u32 = 10013;
/// Unknown member.
pub const CODE_UNKNOWN_MEMBER: u32 = 10007;
/// Unknown message.
pub const CODE_UNKNOWN_MESSAGE: u32 = 10008;

impl ApiError {
    /// True when the entity simply does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self.code,
            Some(CODE_UNKNOWN_CHANNEL | CODE_UNKNOWN_USER | CODE_UNKNOWN_MEMBER | CODE_UNKNOWN_MESSAGE)
        ) || self.status == 404
    }

    /// True when the acting identity lacks access or permission.
    pub fn is_permission_denied(&self) -> bool {
        matches!(self.code, Some(CODE_MISSING_ACCESS | CODE_MISSING_PERMISSIONS))
    }
}

/// Channel kinds the bot distinguishes. Discord's numeric channel types
/// collapse into the few shapes the routing logic cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Text,
    Dm,
    Forum,
    PublicThread,
    PrivateThread,
    Other,
}

impl ChannelKind {
    pub fn from_discord_type(t: u64) -> Self {
        match t {
            0 | 5 => Self::Text,
            1 => Self::Dm,
            15 => Self::Forum,
            11 => Self::PublicThread,
            12 => Self::PrivateThread,
            _ => Self::Other,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChannelInfo {
    pub id: String,
    pub kind: ChannelKind,
    pub name: String,
    pub guild_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UserInfo {
    pub id: String,
    pub display_name: String,
    pub bot: bool,
}

#[derive(Debug, Clone)]
pub struct MemberInfo {
    pub user: UserInfo,
    pub guild_id: String,
}

/// Reply-chain reference carried by a message.
#[derive(Debug, Clone)]
pub struct MessageRef {
    pub channel_id: String,
    pub message_id: String,
}

#[derive(Debug, Clone)]
pub struct MessageInfo {
    pub id: String,
    pub channel_id: String,
    pub author_id: String,
    pub author_bot: bool,
    pub content: String,
    /// Custom ids of interactive components attached to the message.
    pub component_ids: Vec<String>,
    pub reference: Option<MessageRef>,
    /// Attachment URLs; relayed as links, never re-uploaded.
    pub attachment_urls: Vec<String>,
    pub pinned: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonStyle {
    Primary,
    Secondary,
    Danger,
}

#[derive(Debug, Clone)]
pub struct ButtonSpec {
    pub custom_id: String,
    pub label: String,
    pub style: ButtonStyle,
}

#[derive(Debug, Clone, Default)]
pub struct EmbedSpec {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub fields: Vec<(String, String)>,
}

/// Outbound message payload.
#[derive(Debug, Clone, Default)]
pub struct OutboundMessage {
    pub content: String,
    pub buttons: Vec<ButtonSpec>,
    pub embed: Option<EmbedSpec>,
    /// Message id to reply to, within the destination channel.
    pub reply_to: Option<String>,
    pub mention_everyone: bool,
}

impl OutboundMessage {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }
}

/// Interaction reply sent through the interaction-callback endpoint.
#[derive(Debug, Clone)]
pub enum InteractionResponse {
    /// Immediate visible (or ephemeral) reply.
    Reply { content: String, ephemeral: bool },
    /// Acknowledge now, edit the response later.
    Defer { ephemeral: bool },
    /// Open a modal form.
    Modal(ModalSpec),
}

#[derive(Debug, Clone)]
pub struct ModalSpec {
    pub custom_id: String,
    pub title: String,
    pub inputs: Vec<ModalInput>,
}

#[derive(Debug, Clone)]
pub struct ModalInput {
    pub custom_id: String,
    pub label: String,
    pub paragraph: bool,
    pub max_length: u16,
}

/// The Discord REST surface the bot consumes.
///
/// Every call is a fallible remote operation; `ApiError` carries the numeric
/// platform code so callers can tell "not found" from "wrong kind" from
/// "unreachable recipient".
#[async_trait]
pub trait Gateway: Send + Sync {
    async fn current_user(&self) -> Result<UserInfo, ApiError>;
    async fn fetch_channel(&self, channel_id: &str) -> Result<ChannelInfo, ApiError>;
    async fn fetch_user(&self, user_id: &str) -> Result<UserInfo, ApiError>;
    async fn fetch_member(&self, guild_id: &str, user_id: &str) -> Result<MemberInfo, ApiError>;
    async fn fetch_guild_name(&self, guild_id: &str) -> Result<String, ApiError>;
    async fn fetch_message(
        &self,
        channel_id: &str,
        message_id: &str,
    ) -> Result<MessageInfo, ApiError>;

    /// Most-recent-first message history, bounded by `limit`.
    async fn recent_messages(
        &self,
        channel_id: &str,
        limit: u8,
    ) -> Result<Vec<MessageInfo>, ApiError>;

    async fn send_message(
        &self,
        channel_id: &str,
        message: &OutboundMessage,
    ) -> Result<MessageInfo, ApiError>;

    /// Create a thread inside a forum channel, returning the thread channel.
    async fn create_forum_thread(
        &self,
        forum_id: &str,
        name: &str,
        body: &str,
    ) -> Result<ChannelInfo, ApiError>;

    async fn create_private_thread(
        &self,
        channel_id: &str,
        name: &str,
    ) -> Result<ChannelInfo, ApiError>;

    /// Open (or reuse) the DM channel with a user.
    async fn create_dm_channel(&self, user_id: &str) -> Result<ChannelInfo, ApiError>;

    async fn add_thread_member(&self, thread_id: &str, user_id: &str) -> Result<(), ApiError>;

    async fn pin_message(&self, channel_id: &str, message_id: &str) -> Result<(), ApiError>;

    async fn respond_interaction(
        &self,
        interaction_id: &str,
        token: &str,
        response: &InteractionResponse,
    ) -> Result<(), ApiError>;

    /// Edit the deferred original response for an interaction.
    async fn edit_interaction_response(&self, token: &str, content: &str)
        -> Result<(), ApiError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_codes() {
        let err = ApiError {
            status: 404,
            code: Some(CODE_UNKNOWN_CHANNEL),
            message: "Unknown Channel".into(),
        };
        assert!(err.is_not_found());
        assert!(!err.is_permission_denied());
    }

    #[test]
    fn permission_codes() {
        let err = ApiError {
            status: 403,
            code: Some(CODE_MISSING_PERMISSIONS),
            message: "Missing Permissions".into(),
        };
        assert!(err.is_permission_denied());
        assert!(!err.is_not_found());
    }

    #[test]
    fn channel_kind_mapping() {
        assert_eq!(ChannelKind::from_discord_type(0), ChannelKind::Text);
        assert_eq!(ChannelKind::from_discord_type(1), ChannelKind::Dm);
        assert_eq!(ChannelKind::from_discord_type(15), ChannelKind::Forum);
        assert_eq!(ChannelKind::from_discord_type(12), ChannelKind::PrivateThread);
        assert_eq!(ChannelKind::from_discord_type(99), ChannelKind::Other);
    }
}
