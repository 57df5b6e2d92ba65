mod common;

use common::{api_error, unreachable_error, user, MockGateway};
use deskrelay::delivery::{DeliveryOutcome, DeliveryResolver, DeliveryVia};
use deskrelay::error::Classification;
use deskrelay::relay::{Anchors, RelayEnvelope};
use std::sync::Arc;

const OPERATOR: &str = "500";
const SUPPORT_CHANNEL: &str = "c-support";
const GUILD: &str = "g1";

fn envelope(sender_id: &str) -> RelayEnvelope {
    RelayEnvelope {
        sender_display: "Ann".into(),
        sender_id: sender_id.into(),
        origin_space_name: Some("Gamehall".into()),
        body: "Need help with payment".into(),
        attachment_urls: Vec::new(),
    }
}

fn resolver(mock: &Arc<MockGateway>, anchors: &Arc<Anchors>) -> DeliveryResolver {
    DeliveryResolver::new(
        mock.clone(),
        anchors.clone(),
        OPERATOR.to_string(),
        SUPPORT_CHANNEL.to_string(),
    )
}

#[tokio::test]
async fn member_scoped_send_is_the_fast_path() {
    let mock = Arc::new(MockGateway::new());
    mock.add_user(user(OPERATOR, "Op"));
    mock.add_member(GUILD, OPERATOR);
    let anchors = Arc::new(Anchors::default());

    let outcome = resolver(&mock, &anchors)
        .deliver(Some(GUILD), &user("u1", "Ann"), &envelope("u1"))
        .await;

    match outcome {
        DeliveryOutcome::Delivered { via, .. } => assert_eq!(via, DeliveryVia::DirectSend),
        other => panic!("expected delivery, got {other:?}"),
    }
}

#[tokio::test]
async fn explicit_channel_send_after_unreachable_direct() {
    let mock = Arc::new(MockGateway::new());
    mock.add_user(user(OPERATOR, "Op"));
    mock.add_member(GUILD, OPERATOR);
    // First DM send (strategy 1) fails unreachable; the second succeeds.
    mock.queue_dm_failure(unreachable_error());
    let anchors = Arc::new(Anchors::default());

    let outcome = resolver(&mock, &anchors)
        .deliver(Some(GUILD), &user("u1", "Ann"), &envelope("u1"))
        .await;

    match outcome {
        DeliveryOutcome::Delivered { via, .. } => {
            assert_eq!(via, DeliveryVia::ExplicitChannelSend);
        }
        other => panic!("expected delivery, got {other:?}"),
    }
}

#[tokio::test]
async fn explicit_channel_applies_when_operator_not_a_member() {
    let mock = Arc::new(MockGateway::new());
    mock.add_user(user(OPERATOR, "Op"));
    // No member entry: strategy 1 is skipped, not failed.
    let anchors = Arc::new(Anchors::default());

    let outcome = resolver(&mock, &anchors)
        .deliver(Some(GUILD), &user("u1", "Ann"), &envelope("u1"))
        .await;

    match outcome {
        DeliveryOutcome::Delivered { via, .. } => {
            assert_eq!(via, DeliveryVia::ExplicitChannelSend);
        }
        other => panic!("expected delivery, got {other:?}"),
    }
}

#[tokio::test]
async fn fallback_thread_after_both_direct_paths_unreachable() {
    let mock = Arc::new(MockGateway::new());
    mock.add_user(user(OPERATOR, "Op"));
    mock.add_member(GUILD, OPERATOR);
    mock.queue_dm_failure(unreachable_error());
    mock.queue_dm_failure(unreachable_error());
    let anchors = Arc::new(Anchors::default());
    let requester = user("u1", "Ann");

    let outcome = resolver(&mock, &anchors)
        .deliver(Some(GUILD), &requester, &envelope("u1"))
        .await;

    let DeliveryOutcome::Delivered {
        via, channel_id, ..
    } = outcome
    else {
        panic!("expected delivery via fallback thread");
    };
    assert_eq!(via, DeliveryVia::FallbackThread);

    // Exactly one thread; requester added, operator best-effort.
    let members = mock.thread_members.lock().clone();
    assert!(members.contains(&(channel_id.clone(), "u1".to_string())));
    assert!(members.contains(&(channel_id, OPERATOR.to_string())));
}

#[tokio::test]
async fn invalid_recipient_is_fatal_and_skips_fallback() {
    let mock = Arc::new(MockGateway::new());
    mock.add_user(deskrelay::gateway::UserInfo {
        id: OPERATOR.into(),
        display_name: "AutomatedOp".into(),
        bot: true,
    });
    let anchors = Arc::new(Anchors::default());

    let outcome = resolver(&mock, &anchors)
        .deliver(None, &user("u1", "Ann"), &envelope("u1"))
        .await;

    match outcome {
        DeliveryOutcome::Failed { classification, .. } => {
            assert_eq!(classification, Classification::InvalidRecipient);
        }
        other => panic!("expected failure, got {other:?}"),
    }
    // The fallback thread must never be attempted for a non-human recipient.
    assert!(mock.thread_members.lock().is_empty());
}

#[tokio::test]
async fn exhausted_strategies_return_last_classification() {
    let mock = Arc::new(MockGateway::new());
    mock.add_user(user(OPERATOR, "Op"));
    mock.add_member(GUILD, OPERATOR);
    mock.queue_dm_failure(unreachable_error());
    mock.queue_dm_failure(unreachable_error());
    *mock.thread_create_error.lock() = Some(api_error(500, 0, "server error"));
    let anchors = Arc::new(Anchors::default());

    let outcome = resolver(&mock, &anchors)
        .deliver(Some(GUILD), &user("u1", "Ann"), &envelope("u1"))
        .await;

    match outcome {
        DeliveryOutcome::Failed { classification, .. } => {
            // Strategy 3 failed last, with an unknown classification.
            assert_eq!(classification, Classification::Unknown);
        }
        other => panic!("expected failure, got {other:?}"),
    }
}

#[tokio::test]
async fn successful_delivery_overwrites_the_anchor() {
    let mock = Arc::new(MockGateway::new());
    mock.add_user(user(OPERATOR, "Op"));
    let anchors = Arc::new(Anchors::default());
    let requester = user("u1", "Ann");
    let delivery = resolver(&mock, &anchors);

    let DeliveryOutcome::Delivered { message_id: first, .. } =
        delivery.deliver(None, &requester, &envelope("u1")).await
    else {
        panic!("first delivery failed");
    };
    assert_eq!(anchors.get("u1"), Some(first.clone()));

    let DeliveryOutcome::Delivered { message_id: second, .. } =
        delivery.deliver(None, &requester, &envelope("u1")).await
    else {
        panic!("second delivery failed");
    };

    assert_ne!(first, second);
    assert_eq!(anchors.len(), 1);
    assert_eq!(anchors.get("u1"), Some(second));
}
