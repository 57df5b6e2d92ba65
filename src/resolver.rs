//! Typed entity resolution over the gateway.
//!
//! Translates "does not exist" and "exists but is the wrong kind" into
//! distinct failures so callers can produce actionable diagnostics instead of
//! a bare not-found.

use crate::gateway::{ApiError, ChannelInfo, ChannelKind, Gateway, MemberInfo, UserInfo};

#[derive(Debug, Clone, thiserror::Error)]
pub enum ResolveError {
    #[error("{kind} {id} does not exist")]
    NotFound { kind: &'static str, id: String },
    #[error("{id} exists but is not configured as a {expected}")]
    WrongKind { expected: &'static str, id: String },
    #[error("gateway error resolving {id}: {source}")]
    Gateway {
        id: String,
        #[source]
        source: ApiError,
    },
}

fn map_fetch(kind: &'static str, id: &str, err: ApiError) -> ResolveError {
    if err.is_not_found() {
        ResolveError::NotFound {
            kind,
            id: id.to_string(),
        }
    } else {
        ResolveError::Gateway {
            id: id.to_string(),
            source: err,
        }
    }
}

pub async fn resolve_forum(
    gateway: &dyn Gateway,
    channel_id: &str,
) -> Result<ChannelInfo, ResolveError> {
    let channel = gateway
        .fetch_channel(channel_id)
        .await
        .map_err(|e| map_fetch("forum category", channel_id, e))?;
    if channel.kind != ChannelKind::Forum {
        return Err(ResolveError::WrongKind {
            expected: "forum category",
            id: channel_id.to_string(),
        });
    }
    Ok(channel)
}

pub async fn resolve_text_channel(
    gateway: &dyn Gateway,
    channel_id: &str,
) -> Result<ChannelInfo, ResolveError> {
    let channel = gateway
        .fetch_channel(channel_id)
        .await
        .map_err(|e| map_fetch("text channel", channel_id, e))?;
    if channel.kind != ChannelKind::Text {
        return Err(ResolveError::WrongKind {
            expected: "text channel",
            id: channel_id.to_string(),
        });
    }
    Ok(channel)
}

pub async fn resolve_user(gateway: &dyn Gateway, user_id: &str) -> Result<UserInfo, ResolveError> {
    gateway
        .fetch_user(user_id)
        .await
        .map_err(|e| map_fetch("user", user_id, e))
}

pub async fn resolve_member(
    gateway: &dyn Gateway,
    guild_id: &str,
    user_id: &str,
) -> Result<MemberInfo, ResolveError> {
    gateway
        .fetch_member(guild_id, user_id)
        .await
        .map_err(|e| map_fetch("member", user_id, e))
}
