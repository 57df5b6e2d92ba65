//! In-memory gateway fake shared by the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use deskrelay::gateway::{
    ApiError, ChannelInfo, ChannelKind, Gateway, InteractionResponse, MemberInfo, MessageInfo,
    OutboundMessage, UserInfo,
};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

pub const BOT_ID: &str = "900";

pub fn not_found(code: u32) -> ApiError {
    ApiError {
        status: 404,
        code: Some(code),
        message: "not found".into(),
    }
}

pub fn api_error(status: u16, code: u32, message: &str) -> ApiError {
    ApiError {
        status,
        code: Some(code),
        message: message.into(),
    }
}

pub fn unreachable_error() -> ApiError {
    api_error(403, 50007, "Cannot send messages to this user")
}

pub fn user(id: &str, name: &str) -> UserInfo {
    UserInfo {
        id: id.into(),
        display_name: name.into(),
        bot: false,
    }
}

#[derive(Default)]
pub struct MockGateway {
    pub users: Mutex<HashMap<String, UserInfo>>,
    pub channels: Mutex<HashMap<String, ChannelInfo>>,
    /// (guild_id, user_id) pairs that resolve as members.
    pub members: Mutex<HashSet<(String, String)>>,
    pub guild_names: Mutex<HashMap<String, String>>,

    /// Per-channel history, most recent first.
    pub history: Mutex<HashMap<String, Vec<MessageInfo>>>,
    pub history_error: Mutex<Option<ApiError>>,
    pub message_index: Mutex<HashMap<(String, String), MessageInfo>>,

    /// Everything sent, in order.
    pub sent: Mutex<Vec<(String, OutboundMessage)>>,
    /// Errors popped one per send into a DM channel.
    pub dm_send_failures: Mutex<Vec<ApiError>>,
    pub thread_create_error: Mutex<Option<ApiError>>,
    pub thread_members: Mutex<Vec<(String, String)>>,
    pub forum_threads: Mutex<Vec<(String, String, String)>>,
    pub pinned: Mutex<Vec<String>>,
    pub pin_error: Mutex<Option<ApiError>>,

    pub responses: Mutex<Vec<(String, InteractionResponse)>>,
    pub edits: Mutex<Vec<(String, String)>>,

    next_id: AtomicU64,
    thread_count: AtomicU64,
}

impl MockGateway {
    pub fn new() -> Self {
        let mock = Self::default();
        mock.users.lock().insert(
            BOT_ID.to_string(),
            UserInfo {
                id: BOT_ID.into(),
                display_name: "deskrelay".into(),
                bot: true,
            },
        );
        mock
    }

    pub fn add_user(&self, info: UserInfo) {
        self.users.lock().insert(info.id.clone(), info);
    }

    pub fn add_channel(&self, id: &str, kind: ChannelKind, name: &str) {
        self.channels.lock().insert(
            id.to_string(),
            ChannelInfo {
                id: id.to_string(),
                kind,
                name: name.to_string(),
                guild_id: None,
            },
        );
    }

    pub fn add_member(&self, guild_id: &str, user_id: &str) {
        self.members
            .lock()
            .insert((guild_id.to_string(), user_id.to_string()));
    }

    pub fn index_message(&self, message: MessageInfo) {
        self.message_index
            .lock()
            .insert((message.channel_id.clone(), message.id.clone()), message);
    }

    pub fn sent_to(&self, channel_id: &str) -> Vec<OutboundMessage> {
        self.sent
            .lock()
            .iter()
            .filter(|(c, _)| c == channel_id)
            .map(|(_, m)| m.clone())
            .collect()
    }

    pub fn queue_dm_failure(&self, err: ApiError) {
        self.dm_send_failures.lock().push(err);
    }

    /// Drop a message from channel history, as an external deletion would.
    pub fn delete_from_history(&self, channel_id: &str, message_id: &str) {
        if let Some(list) = self.history.lock().get_mut(channel_id) {
            list.retain(|m| m.id != message_id);
        }
    }

    fn next_message_id(&self) -> String {
        format!("m{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

#[async_trait]
impl Gateway for MockGateway {
    async fn current_user(&self) -> Result<UserInfo, ApiError> {
        Ok(self.users.lock().get(BOT_ID).cloned().unwrap())
    }

    async fn fetch_channel(&self, channel_id: &str) -> Result<ChannelInfo, ApiError> {
        self.channels
            .lock()
            .get(channel_id)
            .cloned()
            .ok_or_else(|| not_found(10003))
    }

    async fn fetch_user(&self, user_id: &str) -> Result<UserInfo, ApiError> {
        self.users
            .lock()
            .get(user_id)
            .cloned()
            .ok_or_else(|| not_found(10013))
    }

    async fn fetch_member(&self, guild_id: &str, user_id: &str) -> Result<MemberInfo, ApiError> {
        if !self
            .members
            .lock()
            .contains(&(guild_id.to_string(), user_id.to_string()))
        {
            return Err(not_found(10007));
        }
        let user = self.fetch_user(user_id).await?;
        Ok(MemberInfo {
            user,
            guild_id: guild_id.to_string(),
        })
    }

    async fn fetch_guild_name(&self, guild_id: &str) -> Result<String, ApiError> {
        self.guild_names
            .lock()
            .get(guild_id)
            .cloned()
            .ok_or_else(|| not_found(10003))
    }

    async fn fetch_message(
        &self,
        channel_id: &str,
        message_id: &str,
    ) -> Result<MessageInfo, ApiError> {
        self.message_index
            .lock()
            .get(&(channel_id.to_string(), message_id.to_string()))
            .cloned()
            .ok_or_else(|| not_found(10008))
    }

    async fn recent_messages(
        &self,
        channel_id: &str,
        limit: u8,
    ) -> Result<Vec<MessageInfo>, ApiError> {
        if let Some(err) = self.history_error.lock().clone() {
            return Err(err);
        }
        Ok(self
            .history
            .lock()
            .get(channel_id)
            .map(|list| list.iter().take(limit as usize).cloned().collect())
            .unwrap_or_default())
    }

    async fn send_message(
        &self,
        channel_id: &str,
        message: &OutboundMessage,
    ) -> Result<MessageInfo, ApiError> {
        let is_dm = channel_id.starts_with("dm-")
            || self
                .channels
                .lock()
                .get(channel_id)
                .is_some_and(|c| c.kind == ChannelKind::Dm);
        if is_dm {
            let queued = { self.dm_send_failures.lock().pop() };
            if let Some(err) = queued {
                return Err(err);
            }
        }

        let info = MessageInfo {
            id: self.next_message_id(),
            channel_id: channel_id.to_string(),
            author_id: BOT_ID.to_string(),
            author_bot: true,
            content: message.content.clone(),
            component_ids: message.buttons.iter().map(|b| b.custom_id.clone()).collect(),
            reference: None,
            attachment_urls: Vec::new(),
            pinned: false,
        };

        self.sent
            .lock()
            .push((channel_id.to_string(), message.clone()));
        self.history
            .lock()
            .entry(channel_id.to_string())
            .or_default()
            .insert(0, info.clone());
        self.index_message(info.clone());
        Ok(info)
    }

    async fn create_forum_thread(
        &self,
        forum_id: &str,
        name: &str,
        body: &str,
    ) -> Result<ChannelInfo, ApiError> {
        let id = format!("ft{}", self.thread_count.fetch_add(1, Ordering::SeqCst) + 1);
        self.forum_threads
            .lock()
            .push((forum_id.to_string(), name.to_string(), body.to_string()));
        Ok(ChannelInfo {
            id,
            kind: ChannelKind::PublicThread,
            name: name.to_string(),
            guild_id: None,
        })
    }

    async fn create_private_thread(
        &self,
        channel_id: &str,
        name: &str,
    ) -> Result<ChannelInfo, ApiError> {
        if let Some(err) = self.thread_create_error.lock().clone() {
            return Err(err);
        }
        let id = format!("pt{}", self.thread_count.fetch_add(1, Ordering::SeqCst) + 1);
        let info = ChannelInfo {
            id: id.clone(),
            kind: ChannelKind::PrivateThread,
            name: name.to_string(),
            guild_id: None,
        };
        self.channels.lock().insert(id, info.clone());
        let _ = channel_id;
        Ok(info)
    }

    async fn create_dm_channel(&self, user_id: &str) -> Result<ChannelInfo, ApiError> {
        Ok(ChannelInfo {
            id: format!("dm-{user_id}"),
            kind: ChannelKind::Dm,
            name: String::new(),
            guild_id: None,
        })
    }

    async fn add_thread_member(&self, thread_id: &str, user_id: &str) -> Result<(), ApiError> {
        self.thread_members
            .lock()
            .push((thread_id.to_string(), user_id.to_string()));
        Ok(())
    }

    async fn pin_message(&self, channel_id: &str, message_id: &str) -> Result<(), ApiError> {
        if let Some(err) = self.pin_error.lock().clone() {
            return Err(err);
        }
        let _ = channel_id;
        self.pinned.lock().push(message_id.to_string());
        Ok(())
    }

    async fn respond_interaction(
        &self,
        interaction_id: &str,
        _token: &str,
        response: &InteractionResponse,
    ) -> Result<(), ApiError> {
        self.responses
            .lock()
            .push((interaction_id.to_string(), response.clone()));
        Ok(())
    }

    async fn edit_interaction_response(
        &self,
        token: &str,
        content: &str,
    ) -> Result<(), ApiError> {
        self.edits
            .lock()
            .push((token.to_string(), content.to_string()));
        Ok(())
    }
}
