//! Discord REST v10 client.

use super::traits::{
    ApiError, ButtonStyle, ChannelInfo, ChannelKind, Gateway, InteractionResponse, MemberInfo,
    MessageInfo, MessageRef, OutboundMessage, UserInfo,
};
use async_trait::async_trait;
use serde_json::{json, Value};

const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";

/// Discord's maximum message length for bot-sent messages.
const MAX_MESSAGE_LENGTH: usize = 2000;

/// Split a message into chunks that respect the platform length limit.
/// Prefers newline breaks, then spaces, then a hard split.
pub fn split_message(message: &str) -> Vec<String> {
    if message.len() <= MAX_MESSAGE_LENGTH {
        return vec![message.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = message;

    while !remaining.is_empty() {
        let chunk_end = if remaining.len() <= MAX_MESSAGE_LENGTH {
            remaining.len()
        } else {
            let boundary = floor_char_boundary(remaining, MAX_MESSAGE_LENGTH);
            let search_area = &remaining[..boundary];

            if let Some(pos) = search_area.rfind('\n') {
                if pos >= boundary / 2 {
                    pos + 1
                } else {
                    search_area.rfind(' ').map_or(boundary, |p| p + 1)
                }
            } else if let Some(pos) = search_area.rfind(' ') {
                pos + 1
            } else {
                boundary
            }
        };

        chunks.push(remaining[..chunk_end].to_string());
        remaining = &remaining[chunk_end..];
    }

    chunks
}

fn floor_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut i = index;
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

pub struct RestGateway {
    bot_token: String,
    base_url: String,
    /// For bots the application id equals the bot user id; set once the
    /// session identity is known. Needed for interaction-response edits.
    application_id: parking_lot::RwLock<Option<String>>,
    client: reqwest::Client,
}

impl RestGateway {
    pub fn new(bot_token: String) -> Self {
        Self::with_base_url(bot_token, DEFAULT_API_BASE.to_string())
    }

    /// Point the client at a different API root (used by tests).
    pub fn with_base_url(bot_token: String, base_url: String) -> Self {
        Self {
            bot_token,
            base_url,
            application_id: parking_lot::RwLock::new(None),
            client: reqwest::Client::new(),
        }
    }

    pub fn set_application_id(&self, id: &str) {
        *self.application_id.write() = Some(id.to_string());
    }

    pub fn http_client(&self) -> reqwest::Client {
        self.client.clone()
    }

    fn auth(&self) -> String {
        format!("Bot {}", self.bot_token)
    }

    async fn get(&self, path: &str) -> Result<Value, ApiError> {
        let url = format!("{}{path}", self.base_url);
        let resp = self
            .client
            .get(&url)
            .header("Authorization", self.auth())
            .send()
            .await
            .map_err(transport_error)?;
        Self::check(resp).await
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value, ApiError> {
        let url = format!("{}{path}", self.base_url);
        let resp = self
            .client
            .post(&url)
            .header("Authorization", self.auth())
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;
        Self::check(resp).await
    }

    async fn put_empty(&self, path: &str) -> Result<Value, ApiError> {
        let url = format!("{}{path}", self.base_url);
        let resp = self
            .client
            .put(&url)
            .header("Authorization", self.auth())
            .header("Content-Length", "0")
            .send()
            .await
            .map_err(transport_error)?;
        Self::check(resp).await
    }

    async fn patch(&self, path: &str, body: &Value) -> Result<Value, ApiError> {
        let url = format!("{}{path}", self.base_url);
        let resp = self
            .client
            .patch(&url)
            .header("Authorization", self.auth())
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;
        Self::check(resp).await
    }

    /// Convert a non-2xx response into an [`ApiError`] with the JSON `code`
    /// field extracted when present.
    async fn check(resp: reqwest::Response) -> Result<Value, ApiError> {
        let status = resp.status();
        if status.is_success() {
            if status == reqwest::StatusCode::NO_CONTENT {
                return Ok(Value::Null);
            }
            return resp.json::<Value>().await.map_err(transport_error);
        }

        let body = resp.text().await.unwrap_or_default();
        let parsed: Option<Value> = serde_json::from_str(&body).ok();
        let code = parsed
            .as_ref()
            .and_then(|v| v.get("code"))
            .and_then(Value::as_u64)
            .and_then(|c| u32::try_from(c).ok());
        let message = parsed
            .as_ref()
            .and_then(|v| v.get("message"))
            .and_then(Value::as_str)
            .map_or(body, ToString::to_string);

        Err(ApiError {
            status: status.as_u16(),
            code,
            message,
        })
    }

    fn message_body(message: &OutboundMessage) -> Value {
        let mut body = json!({ "content": message.content });

        if !message.buttons.is_empty() {
            let buttons: Vec<Value> = message
                .buttons
                .iter()
                .map(|b| {
                    json!({
                        "type": 2,
                        "style": match b.style {
                            ButtonStyle::Primary => 1,
                            ButtonStyle::Secondary => 2,
                            ButtonStyle::Danger => 4,
                        },
                        "label": b.label,
                        "custom_id": b.custom_id,
                    })
                })
                .collect();
            body["components"] = json!([{ "type": 1, "components": buttons }]);
        }

        if let Some(embed) = &message.embed {
            let mut e = json!({});
            if let Some(title) = &embed.title {
                e["title"] = json!(title);
            }
            if let Some(description) = &embed.description {
                e["description"] = json!(description);
            }
            if let Some(url) = &embed.image_url {
                e["image"] = json!({ "url": url });
            }
            if !embed.fields.is_empty() {
                let fields: Vec<Value> = embed
                    .fields
                    .iter()
                    .map(|(name, value)| json!({ "name": name, "value": value, "inline": true }))
                    .collect();
                e["fields"] = json!(fields);
            }
            body["embeds"] = json!([e]);
        }

        if let Some(reply_to) = &message.reply_to {
            // A deleted reply target degrades to a plain send instead of
            // failing the request.
            body["message_reference"] = json!({
                "message_id": reply_to,
                "fail_if_not_exists": false,
            });
        }

        if message.mention_everyone {
            body["allowed_mentions"] = json!({ "parse": ["everyone"] });
        }

        body
    }
}

fn transport_error(e: reqwest::Error) -> ApiError {
    ApiError {
        status: 0,
        code: None,
        message: format!("transport: {e}"),
    }
}

fn parse_user(v: &Value) -> UserInfo {
    let username = v
        .get("username")
        .and_then(Value::as_str)
        .unwrap_or("unknown");
    UserInfo {
        id: str_field(v, "id"),
        display_name: v
            .get("global_name")
            .and_then(Value::as_str)
            .unwrap_or(username)
            .to_string(),
        bot: v.get("bot").and_then(Value::as_bool).unwrap_or(false),
    }
}

fn parse_channel(v: &Value) -> ChannelInfo {
    ChannelInfo {
        id: str_field(v, "id"),
        kind: ChannelKind::from_discord_type(
            v.get("type").and_then(Value::as_u64).unwrap_or(u64::MAX),
        ),
        name: v
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        guild_id: v
            .get("guild_id")
            .and_then(Value::as_str)
            .map(ToString::to_string),
    }
}

/// Parse a message object, collecting interactive component custom ids and
/// attachment URLs.
pub(crate) fn parse_message(v: &Value) -> MessageInfo {
    let mut component_ids = Vec::new();
    if let Some(rows) = v.get("components").and_then(Value::as_array) {
        for row in rows {
            if let Some(children) = row.get("components").and_then(Value::as_array) {
                for child in children {
                    if let Some(id) = child.get("custom_id").and_then(Value::as_str) {
                        component_ids.push(id.to_string());
                    }
                }
            }
        }
    }

    let attachment_urls = v
        .get("attachments")
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .filter_map(|a| a.get("url").and_then(Value::as_str))
                .map(ToString::to_string)
                .collect()
        })
        .unwrap_or_default();

    let reference = v.get("message_reference").and_then(|r| {
        let message_id = r.get("message_id").and_then(Value::as_str)?;
        Some(MessageRef {
            channel_id: r
                .get("channel_id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            message_id: message_id.to_string(),
        })
    });

    MessageInfo {
        id: str_field(v, "id"),
        channel_id: str_field(v, "channel_id"),
        author_id: v
            .get("author")
            .map(|a| str_field(a, "id"))
            .unwrap_or_default(),
        author_bot: v
            .get("author")
            .and_then(|a| a.get("bot"))
            .and_then(Value::as_bool)
            .unwrap_or(false),
        content: v
            .get("content")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        component_ids,
        reference,
        attachment_urls,
        pinned: v.get("pinned").and_then(Value::as_bool).unwrap_or(false),
    }
}

fn str_field(v: &Value, key: &str) -> String {
    v.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

#[async_trait]
impl Gateway for RestGateway {
    async fn current_user(&self) -> Result<UserInfo, ApiError> {
        let v = self.get("/users/@me").await?;
        Ok(parse_user(&v))
    }

    async fn fetch_channel(&self, channel_id: &str) -> Result<ChannelInfo, ApiError> {
        let v = self.get(&format!("/channels/{channel_id}")).await?;
        Ok(parse_channel(&v))
    }

    async fn fetch_user(&self, user_id: &str) -> Result<UserInfo, ApiError> {
        let v = self.get(&format!("/users/{user_id}")).await?;
        Ok(parse_user(&v))
    }

    async fn fetch_member(&self, guild_id: &str, user_id: &str) -> Result<MemberInfo, ApiError> {
        let v = self
            .get(&format!("/guilds/{guild_id}/members/{user_id}"))
            .await?;
        let user = v.get("user").map(parse_user).ok_or_else(|| ApiError {
            status: 0,
            code: None,
            message: "member object missing user".into(),
        })?;
        Ok(MemberInfo {
            user,
            guild_id: guild_id.to_string(),
        })
    }

    async fn fetch_guild_name(&self, guild_id: &str) -> Result<String, ApiError> {
        let v = self.get(&format!("/guilds/{guild_id}")).await?;
        Ok(str_field(&v, "name"))
    }

    async fn fetch_message(
        &self,
        channel_id: &str,
        message_id: &str,
    ) -> Result<MessageInfo, ApiError> {
        let v = self
            .get(&format!("/channels/{channel_id}/messages/{message_id}"))
            .await?;
        Ok(parse_message(&v))
    }

    async fn recent_messages(
        &self,
        channel_id: &str,
        limit: u8,
    ) -> Result<Vec<MessageInfo>, ApiError> {
        let v = self
            .get(&format!("/channels/{channel_id}/messages?limit={limit}"))
            .await?;
        Ok(v.as_array()
            .map(|list| list.iter().map(parse_message).collect())
            .unwrap_or_default())
    }

    async fn send_message(
        &self,
        channel_id: &str,
        message: &OutboundMessage,
    ) -> Result<MessageInfo, ApiError> {
        let chunks = split_message(&message.content);
        let last_index = chunks.len() - 1;
        let mut delivered = None;

        for (i, chunk) in chunks.into_iter().enumerate() {
            // Components, embed, and reply reference ride on the final chunk
            // so the returned message (the reply anchor) carries them.
            let body = if i == last_index {
                let mut m = message.clone();
                m.content = chunk;
                Self::message_body(&m)
            } else {
                json!({ "content": chunk })
            };

            let v = self
                .post(&format!("/channels/{channel_id}/messages"), &body)
                .await?;
            delivered = Some(parse_message(&v));

            if i < last_index {
                tokio::time::sleep(std::time::Duration::from_millis(500)).await;
            }
        }

        delivered.ok_or_else(|| ApiError {
            status: 0,
            code: None,
            message: "empty message".into(),
        })
    }

    async fn create_forum_thread(
        &self,
        forum_id: &str,
        name: &str,
        body: &str,
    ) -> Result<ChannelInfo, ApiError> {
        let payload = json!({
            "name": name,
            "message": { "content": body },
        });
        let v = self
            .post(&format!("/channels/{forum_id}/threads"), &payload)
            .await?;
        Ok(parse_channel(&v))
    }

    async fn create_private_thread(
        &self,
        channel_id: &str,
        name: &str,
    ) -> Result<ChannelInfo, ApiError> {
        let payload = json!({
            "name": name,
            "type": 12,
            "invitable": false,
        });
        let v = self
            .post(&format!("/channels/{channel_id}/threads"), &payload)
            .await?;
        Ok(parse_channel(&v))
    }

    async fn create_dm_channel(&self, user_id: &str) -> Result<ChannelInfo, ApiError> {
        let payload = json!({ "recipient_id": user_id });
        let v = self.post("/users/@me/channels", &payload).await?;
        Ok(parse_channel(&v))
    }

    async fn add_thread_member(&self, thread_id: &str, user_id: &str) -> Result<(), ApiError> {
        self.put_empty(&format!("/channels/{thread_id}/thread-members/{user_id}"))
            .await?;
        Ok(())
    }

    async fn pin_message(&self, channel_id: &str, message_id: &str) -> Result<(), ApiError> {
        self.put_empty(&format!("/channels/{channel_id}/pins/{message_id}"))
            .await?;
        Ok(())
    }

    async fn respond_interaction(
        &self,
        interaction_id: &str,
        token: &str,
        response: &InteractionResponse,
    ) -> Result<(), ApiError> {
        let body = match response {
            InteractionResponse::Reply { content, ephemeral } => json!({
                "type": 4,
                "data": {
                    "content": content,
                    "flags": if *ephemeral { 64 } else { 0 },
                },
            }),
            InteractionResponse::Defer { ephemeral } => json!({
                "type": 5,
                "data": { "flags": if *ephemeral { 64 } else { 0 } },
            }),
            InteractionResponse::Modal(modal) => {
                let rows: Vec<Value> = modal
                    .inputs
                    .iter()
                    .map(|input| {
                        json!({
                            "type": 1,
                            "components": [{
                                "type": 4,
                                "custom_id": input.custom_id,
                                "label": input.label,
                                "style": if input.paragraph { 2 } else { 1 },
                                "max_length": input.max_length,
                                "required": true,
                            }],
                        })
                    })
                    .collect();
                json!({
                    "type": 9,
                    "data": {
                        "custom_id": modal.custom_id,
                        "title": modal.title,
                        "components": rows,
                    },
                })
            }
        };

        self.post(
            &format!("/interactions/{interaction_id}/{token}/callback"),
            &body,
        )
        .await?;
        Ok(())
    }

    async fn edit_interaction_response(
        &self,
        token: &str,
        content: &str,
    ) -> Result<(), ApiError> {
        let application_id = self.application_id.read().clone().ok_or_else(|| ApiError {
            status: 0,
            code: None,
            message: "application id not yet known".into(),
        })?;
        let body = json!({ "content": content });
        self.patch(
            &format!("/webhooks/{application_id}/{token}/messages/@original"),
            &body,
        )
        .await?;
        Ok(())
    }
}
