//! Discord Gateway WebSocket listener.
//!
//! Connects, identifies, heartbeats, and translates dispatch payloads into
//! the crate's closed [`Event`] type. Reconnection is the supervisor's job:
//! on any close or reconnect request this function returns and the daemon
//! restarts it with backoff.

use crate::events::{Event, InteractionHandle};
use crate::gateway::rest::parse_message;
use crate::gateway::traits::UserInfo;
use crate::intake::{Submission, FIELD_DETAILS, FIELD_MESSAGE, FIELD_TITLE, MODAL_CONTACT, MODAL_REPORT};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio_tungstenite::tungstenite::Message;

/// GUILDS | GUILD_MESSAGES | DIRECT_MESSAGES | MESSAGE_CONTENT
const INTENTS: u64 = 1 | 512 | 4096 | 32768;

/// Component interaction.
const INTERACTION_COMPONENT: u64 = 3;
/// Modal submit interaction.
const INTERACTION_MODAL_SUBMIT: u64 = 5;

pub async fn run(
    token: &str,
    client: &reqwest::Client,
    tx: tokio::sync::mpsc::Sender<Event>,
) -> anyhow::Result<()> {
    // Get Gateway URL
    let gw_resp: Value = client
        .get("https://discord.com/api/v10/gateway/bot")
        .header("Authorization", format!("Bot {token}"))
        .send()
        .await?
        .json()
        .await?;

    let gw_url = gw_resp
        .get("url")
        .and_then(|u| u.as_str())
        .unwrap_or("wss://gateway.discord.gg");

    let ws_url = format!("{gw_url}/?v=10&encoding=json");
    tracing::info!("connecting to gateway...");

    let (ws_stream, _) = tokio_tungstenite::connect_async(&ws_url).await?;
    let (mut write, mut read) = ws_stream.split();

    // Read Hello (opcode 10)
    let hello = read
        .next()
        .await
        .ok_or_else(|| anyhow::anyhow!("no hello frame"))??;
    let hello_data: Value = serde_json::from_str(&hello.to_string())?;
    let heartbeat_interval = hello_data
        .get("d")
        .and_then(|d| d.get("heartbeat_interval"))
        .and_then(Value::as_u64)
        .unwrap_or(41250);

    // Send Identify (opcode 2)
    let identify = json!({
        "op": 2,
        "d": {
            "token": token,
            "intents": INTENTS,
            "properties": {
                "os": "linux",
                "browser": "deskrelay",
                "device": "deskrelay"
            }
        }
    });
    write.send(Message::Text(identify.to_string().into())).await?;

    tracing::info!("connected and identified");

    // Last sequence number, needed for heartbeats. Only touched inside the
    // select! loop, so a plain i64 suffices.
    let mut sequence: i64 = -1;

    // Heartbeat timer sends a tick; the frame itself is assembled in the
    // select! loop where `sequence` lives.
    let (hb_tx, mut hb_rx) = tokio::sync::mpsc::channel::<()>(1);
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(std::time::Duration::from_millis(heartbeat_interval));
        loop {
            interval.tick().await;
            if hb_tx.send(()).await.is_err() {
                break;
            }
        }
    });

    loop {
        tokio::select! {
            _ = hb_rx.recv() => {
                let d = if sequence >= 0 { json!(sequence) } else { json!(null) };
                let hb = json!({"op": 1, "d": d});
                if write.send(Message::Text(hb.to_string().into())).await.is_err() {
                    break;
                }
            }
            msg = read.next() => {
                let msg = match msg {
                    Some(Ok(Message::Text(t))) => t,
                    Some(Ok(Message::Close(_))) | None => break,
                    _ => continue,
                };

                let frame: Value = match serde_json::from_str(&msg) {
                    Ok(e) => e,
                    Err(_) => continue,
                };

                if let Some(s) = frame.get("s").and_then(Value::as_i64) {
                    sequence = s;
                }

                let op = frame.get("op").and_then(Value::as_u64).unwrap_or(0);
                match op {
                    // Op 1: server requests an immediate heartbeat
                    1 => {
                        let d = if sequence >= 0 { json!(sequence) } else { json!(null) };
                        let hb = json!({"op": 1, "d": d});
                        if write.send(Message::Text(hb.to_string().into())).await.is_err() {
                            break;
                        }
                        continue;
                    }
                    // Op 7: Reconnect
                    7 => {
                        tracing::warn!("received Reconnect (op 7), closing for restart");
                        break;
                    }
                    // Op 9: Invalid Session
                    9 => {
                        tracing::warn!("received Invalid Session (op 9), closing for restart");
                        break;
                    }
                    _ => {}
                }

                let event_type = frame.get("t").and_then(Value::as_str).unwrap_or("");
                let Some(d) = frame.get("d") else { continue };

                if let Some(event) = parse_dispatch(event_type, d) {
                    if tx.send(event).await.is_err() {
                        break;
                    }
                }
            }
        }
    }

    Ok(())
}

/// Translate a dispatch payload into a typed event. Unrecognized or
/// malformed payloads yield `None` and are dropped.
pub fn parse_dispatch(event_type: &str, d: &Value) -> Option<Event> {
    match event_type {
        "READY" => {
            let bot_user_id = d.get("user")?.get("id")?.as_str()?.to_string();
            Some(Event::Ready { bot_user_id })
        }
        "GUILD_CREATE" => {
            let guild_id = d.get("id")?.as_str()?.to_string();
            Some(Event::GuildAvailable { guild_id })
        }
        "MESSAGE_CREATE" => {
            let author = parse_author(d)?;
            Some(Event::MessageReceived {
                guild_id: opt_str(d, "guild_id"),
                author,
                message: parse_message(d),
            })
        }
        "MESSAGE_DELETE" => Some(Event::MessageDeleted {
            guild_id: opt_str(d, "guild_id"),
            channel_id: d.get("channel_id")?.as_str()?.to_string(),
            message_id: d.get("id")?.as_str()?.to_string(),
        }),
        "INTERACTION_CREATE" => parse_interaction(d),
        _ => None,
    }
}

fn parse_interaction(d: &Value) -> Option<Event> {
    let interaction = InteractionHandle {
        id: d.get("id")?.as_str()?.to_string(),
        token: d.get("token")?.as_str()?.to_string(),
    };
    let guild_id = opt_str(d, "guild_id");
    // Guild interactions nest the user inside `member`; DMs carry it directly.
    let user_value = d
        .get("member")
        .and_then(|m| m.get("user"))
        .or_else(|| d.get("user"))?;
    let user = parse_user_value(user_value)?;
    let data = d.get("data")?;
    let custom_id = data.get("custom_id")?.as_str()?;

    match d.get("type").and_then(Value::as_u64)? {
        INTERACTION_COMPONENT => Some(Event::ControlActivation {
            interaction,
            guild_id,
            user,
            control_id: custom_id.to_string(),
        }),
        INTERACTION_MODAL_SUBMIT => {
            let fields = collect_modal_fields(data);
            let submission = match custom_id {
                MODAL_REPORT => Submission::Report {
                    title: fields
                        .iter()
                        .find(|(id, _)| id == FIELD_TITLE)
                        .map(|(_, v)| v.clone())
                        .unwrap_or_default(),
                    details: fields
                        .iter()
                        .find(|(id, _)| id == FIELD_DETAILS)
                        .map(|(_, v)| v.clone())
                        .unwrap_or_default(),
                },
                MODAL_CONTACT => Submission::ContactOperator {
                    message: fields
                        .iter()
                        .find(|(id, _)| id == FIELD_MESSAGE)
                        .map(|(_, v)| v.clone())
                        .unwrap_or_default(),
                },
                _ => return None,
            };
            Some(Event::FormSubmission {
                interaction,
                guild_id,
                user,
                submission,
            })
        }
        _ => None,
    }
}

fn collect_modal_fields(data: &Value) -> Vec<(String, String)> {
    let mut fields = Vec::new();
    if let Some(rows) = data.get("components").and_then(Value::as_array) {
        for row in rows {
            if let Some(children) = row.get("components").and_then(Value::as_array) {
                for child in children {
                    if let (Some(id), Some(value)) = (
                        child.get("custom_id").and_then(Value::as_str),
                        child.get("value").and_then(Value::as_str),
                    ) {
                        fields.push((id.to_string(), value.to_string()));
                    }
                }
            }
        }
    }
    fields
}

fn parse_author(d: &Value) -> Option<UserInfo> {
    parse_user_value(d.get("author")?)
}

fn parse_user_value(v: &Value) -> Option<UserInfo> {
    let id = v.get("id")?.as_str()?.to_string();
    let username = v.get("username").and_then(Value::as_str).unwrap_or("unknown");
    Some(UserInfo {
        id,
        display_name: v
            .get("global_name")
            .and_then(Value::as_str)
            .unwrap_or(username)
            .to_string(),
        bot: v.get("bot").and_then(Value::as_bool).unwrap_or(false),
    })
}

fn opt_str(v: &Value, key: &str) -> Option<String> {
    v.get(key).and_then(Value::as_str).map(ToString::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ready_dispatch() {
        let d = json!({ "user": { "id": "42" } });
        match parse_dispatch("READY", &d) {
            Some(Event::Ready { bot_user_id }) => assert_eq!(bot_user_id, "42"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn message_create_dispatch() {
        let d = json!({
            "id": "9",
            "channel_id": "7",
            "guild_id": "3",
            "author": { "id": "1", "username": "ann", "global_name": "Ann" },
            "content": "hi"
        });
        match parse_dispatch("MESSAGE_CREATE", &d) {
            Some(Event::MessageReceived { guild_id, author, message }) => {
                assert_eq!(guild_id.as_deref(), Some("3"));
                assert_eq!(author.display_name, "Ann");
                assert_eq!(message.content, "hi");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn component_interaction_dispatch() {
        let d = json!({
            "id": "i1",
            "token": "tok",
            "type": 3,
            "guild_id": "3",
            "member": { "user": { "id": "1", "username": "ann" } },
            "data": { "custom_id": "deskrelay:report" }
        });
        match parse_dispatch("INTERACTION_CREATE", &d) {
            Some(Event::ControlActivation { control_id, user, .. }) => {
                assert_eq!(control_id, "deskrelay:report");
                assert_eq!(user.id, "1");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn modal_submit_dispatch() {
        let d = json!({
            "id": "i1",
            "token": "tok",
            "type": 5,
            "user": { "id": "1", "username": "ann" },
            "data": {
                "custom_id": MODAL_REPORT,
                "components": [
                    { "components": [{ "custom_id": FIELD_TITLE, "value": "Cannot join" }] },
                    { "components": [{ "custom_id": FIELD_DETAILS, "value": "Error 1006 on connect" }] }
                ]
            }
        });
        match parse_dispatch("INTERACTION_CREATE", &d) {
            Some(Event::FormSubmission { submission, .. }) => {
                assert_eq!(
                    submission,
                    Submission::Report {
                        title: "Cannot join".into(),
                        details: "Error 1006 on connect".into(),
                    }
                );
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn unknown_dispatch_is_dropped() {
        assert!(parse_dispatch("TYPING_START", &json!({})).is_none());
        assert!(parse_dispatch("INTERACTION_CREATE", &json!({ "id": "x" })).is_none());
    }
}
