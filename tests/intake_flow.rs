mod common;

use common::{unreachable_error, user, MockGateway};
use deskrelay::delivery::DeliveryResolver;
use deskrelay::gateway::ChannelKind;
use deskrelay::intake::{Intake, IntakeError, Submission};
use deskrelay::relay::Anchors;
use std::sync::Arc;

const OPERATOR: &str = "500";
const FORUM: &str = "c-forum";
const SUPPORT_CHANNEL: &str = "c-support";

fn intake(mock: &Arc<MockGateway>) -> Intake {
    let delivery = Arc::new(DeliveryResolver::new(
        mock.clone(),
        Arc::new(Anchors::default()),
        OPERATOR.to_string(),
        SUPPORT_CHANNEL.to_string(),
    ));
    Intake::new(
        mock.clone(),
        delivery,
        FORUM.to_string(),
        SUPPORT_CHANNEL.to_string(),
    )
}

#[tokio::test]
async fn report_creates_a_named_thread_and_confirms() {
    let mock = Arc::new(MockGateway::new());
    mock.add_channel(FORUM, ChannelKind::Forum, "reports");
    let requester = user("u1", "Ann");

    let confirmation = intake(&mock)
        .handle(
            &requester,
            None,
            None,
            Submission::Report {
                title: "Cannot join".into(),
                details: "Error 1006 on connect".into(),
            },
        )
        .await
        .unwrap();

    let threads = mock.forum_threads.lock().clone();
    assert_eq!(threads.len(), 1);
    let (forum_id, name, body) = &threads[0];
    assert_eq!(forum_id, FORUM);
    assert!(name.contains("Cannot join"));
    assert!(name.contains("Ann"));
    assert!(body.contains("Error 1006 on connect"));

    // The confirmation references the created thread.
    assert!(confirmation.contains("<#ft1>"));
}

#[tokio::test]
async fn report_with_blank_title_names_the_field() {
    let mock = Arc::new(MockGateway::new());
    mock.add_channel(FORUM, ChannelKind::Forum, "reports");

    let err = intake(&mock)
        .handle(
            &user("u1", "Ann"),
            None,
            None,
            Submission::Report {
                title: "   ".into(),
                details: "something".into(),
            },
        )
        .await
        .unwrap_err();

    match err {
        IntakeError::Validation(v) => assert_eq!(v.field, "title"),
        other => panic!("expected validation error, got {other:?}"),
    }
    assert!(mock.forum_threads.lock().is_empty());
}

#[tokio::test]
async fn report_against_misconfigured_forum_fails_scoped() {
    let mock = Arc::new(MockGateway::new());
    mock.add_channel(FORUM, ChannelKind::Text, "not-a-forum");

    let err = intake(&mock)
        .handle(
            &user("u1", "Ann"),
            None,
            None,
            Submission::Report {
                title: "t".into(),
                details: "d".into(),
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, IntakeError::Resolve(_)));
}

#[tokio::test]
async fn contact_delivered_directly_confirms_plainly() {
    let mock = Arc::new(MockGateway::new());
    mock.add_user(user(OPERATOR, "Op"));

    let confirmation = intake(&mock)
        .handle(
            &user("u1", "Ann"),
            None,
            None,
            Submission::ContactOperator {
                message: "Need help with payment".into(),
            },
        )
        .await
        .unwrap();

    assert!(confirmation.contains("sent to the operator"));
    let delivered = mock.sent_to("dm-500");
    assert_eq!(delivered.len(), 1);
    assert!(delivered[0].content.contains("Need help with payment"));
}

#[tokio::test]
async fn contact_via_fallback_thread_mentions_the_thread() {
    let mock = Arc::new(MockGateway::new());
    mock.add_user(user(OPERATOR, "Op"));
    mock.queue_dm_failure(unreachable_error());

    let confirmation = intake(&mock)
        .handle(
            &user("u1", "Ann"),
            None,
            None,
            Submission::ContactOperator {
                message: "Need help".into(),
            },
        )
        .await
        .unwrap();

    assert!(confirmation.contains("private support thread"));
    assert!(confirmation.contains("<#pt1>"));
}

#[tokio::test]
async fn undeliverable_contact_apologizes_and_notifies_moderation() {
    let mock = Arc::new(MockGateway::new());
    mock.add_user(user(OPERATOR, "Op"));
    mock.queue_dm_failure(unreachable_error());
    *mock.thread_create_error.lock() = Some(unreachable_error());

    let confirmation = intake(&mock)
        .handle(
            &user("u1", "Ann"),
            None,
            None,
            Submission::ContactOperator {
                message: "Need help".into(),
            },
        )
        .await
        .unwrap();

    assert!(confirmation.contains("could not be delivered"));
    assert!(confirmation.contains("direct messages are closed"));

    let notices = mock.sent_to(SUPPORT_CHANNEL);
    assert_eq!(notices.len(), 1);
    assert!(notices[0].content.contains("Ann"));
}
