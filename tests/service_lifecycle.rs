//! End-to-end scenarios against an isolated service instance.
//!
//! These tests drive the same `PresenceService` surface the application
//! consumes, without a network: connections are registered directly with
//! their outbound channels standing in for sockets.

#![allow(clippy::panic)]

use std::sync::Arc;

use agora_presence::config::PresenceConfig;
use agora_presence::domain::connection::DeviceMeta;
use agora_presence::domain::{
    Connection, ConnectionId, NotificationEnvelope, NotificationKind, OutboundFrame, UserId,
};
use agora_presence::service::{InMemoryNotificationStore, PresenceService};
use agora_presence::ws::events::EventRouter;
use chrono::{Duration, Utc};
use tokio::sync::mpsc::{self, UnboundedReceiver};

fn service() -> Arc<PresenceService> {
    let store = Arc::new(InMemoryNotificationStore::new());
    let Ok(service) = PresenceService::new(PresenceConfig::for_tests(), store) else {
        panic!("test config must build a service");
    };
    Arc::new(service)
}

async fn connect(
    service: &PresenceService,
    user: UserId,
) -> (ConnectionId, UnboundedReceiver<OutboundFrame>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let conn = Connection::new(user, DeviceMeta::default());
    let id = conn.id;
    let Ok(()) = service.register_connection(conn, tx).await else {
        panic!("registration under cap must succeed");
    };
    (id, rx)
}

fn message_envelope(recipients: Vec<UserId>) -> NotificationEnvelope {
    NotificationEnvelope::new(
        NotificationKind::NewMessage,
        recipients,
        serde_json::json!({"preview": "is the bike still available?"}),
    )
}

#[tokio::test]
async fn two_tabs_presence_lifecycle() {
    let service = service();
    let alice = UserId::new();

    let (tab1, _rx1) = connect(&service, alice).await;
    let (tab2, _rx2) = connect(&service, alice).await;
    assert!(service.is_user_online(alice).await);
    assert_eq!(service.user_connection_count(alice).await, 2);

    service.handle_disconnect(tab1).await;
    assert!(service.is_user_online(alice).await);
    assert_eq!(service.user_connection_count(alice).await, 1);
    assert!(service.user_last_seen(alice).await.is_none());

    service.handle_disconnect(tab2).await;
    assert!(!service.is_user_online(alice).await);
    assert!(service.user_last_seen(alice).await.is_some());
}

#[tokio::test]
async fn suppressed_notification_is_not_fanned_out() {
    let service = service();
    let alice = UserId::new();
    let bob = UserId::new();
    let (_, mut bob_rx) = connect(&service, bob).await;

    // Bob is looking at his conversation with Alice.
    service.tracker().set_active(bob, alice, None).await;

    // The message-send trigger consults the suppression rule before
    // fanning out, exactly as the messaging collaborator does.
    assert!(!service.should_send_message_notification(bob, alice).await);
    let delivered = if service.should_send_message_notification(bob, alice).await {
        service
            .send_notification(bob, &message_envelope(vec![bob]))
            .await
    } else {
        0
    };
    assert_eq!(delivered, 0);
    assert!(bob_rx.try_recv().is_err());

    // Bob closes the window; the next message notifies him on his socket.
    service.tracker().remove_active(bob, alice).await;
    assert!(service.should_send_message_notification(bob, alice).await);
    let delivered = service
        .send_notification(bob, &message_envelope(vec![bob]))
        .await;
    assert_eq!(delivered, 1);
    let Some(OutboundFrame::Event { event, .. }) = bob_rx.recv().await else {
        panic!("expected notification frame");
    };
    assert_eq!(event, "notification:new_message");
}

#[tokio::test]
async fn mixed_online_offline_fanout() {
    let service = service();
    let online_a = UserId::new();
    let online_b = UserId::new();
    let offline = UserId::new();
    let (_, mut rx_a) = connect(&service, online_a).await;
    let (_, mut rx_b) = connect(&service, online_b).await;

    let recipients = vec![online_a, offline, online_b];
    let delivered = service
        .send_notification_to_many(&recipients, &message_envelope(recipients.clone()))
        .await;
    assert_eq!(delivered, 2);
    assert!(rx_a.recv().await.is_some());
    assert!(rx_b.recv().await.is_some());
}

#[tokio::test]
async fn broadcast_to_empty_gateway_is_a_noop() {
    let service = service();
    let delivered = service
        .send_notification_to_all(&message_envelope(vec![]))
        .await;
    assert_eq!(delivered, 0);
}

#[tokio::test]
async fn heartbeat_eviction_takes_sole_connection_offline() {
    let service = service();
    let alice = UserId::new();
    let (_, mut rx) = connect(&service, alice).await;
    service.tracker().set_active(alice, UserId::new(), None).await;

    // 90 s idle timeout; sweep two minutes into the future.
    let evicted = service
        .heartbeat()
        .sweep(Utc::now() + Duration::seconds(120))
        .await;
    assert_eq!(evicted, 1);
    assert!(!service.is_user_online(alice).await);
    assert!(service.user_last_seen(alice).await.is_some());
    assert_eq!(service.tracker().entry_count().await, 0);

    let Some(OutboundFrame::Close) = rx.recv().await else {
        panic!("evicted connection must be told to close");
    };
}

#[tokio::test]
async fn duplicate_mark_read_through_the_router() {
    let service = service();
    let alice = UserId::new();
    let (conn_id, mut rx) = connect(&service, alice).await;
    let notification_id = uuid::Uuid::new_v4();
    let Ok(()) = service.store().create(alice, notification_id).await else {
        panic!("create failed");
    };
    assert_eq!(service.store().unread_count(alice).await.ok(), Some(1));

    let router = EventRouter::new(Arc::clone(&service));
    let text = serde_json::json!({
        "event": "mark_notification_read",
        "data": {"notification_id": notification_id.to_string()},
    })
    .to_string();
    router.handle(conn_id, alice, &text).await;
    router.handle(conn_id, alice, &text).await;

    // Unread count decreased by exactly 1, not 2.
    assert_eq!(service.store().unread_count(alice).await.ok(), Some(0));
    assert!(rx.recv().await.is_some());
    assert!(rx.recv().await.is_some());
}

#[tokio::test]
async fn shutdown_tears_everything_down_in_order() {
    let service = service();
    let alice = UserId::new();
    let bob = UserId::new();
    let (_, mut rx_a) = connect(&service, alice).await;
    let (_, _rx_b) = connect(&service, bob).await;
    service.tracker().set_active(alice, bob, None).await;
    service.start().await;

    service.shutdown().await;

    let stats = service.connection_stats().await;
    assert_eq!(stats.total_connections, 0);
    assert_eq!(stats.online_users, 0);
    assert_eq!(stats.active_conversations, 0);
    assert!(service.user_last_seen(alice).await.is_some());

    let Some(OutboundFrame::Close) = rx_a.recv().await else {
        panic!("shutdown must push close frames");
    };

    // Post-shutdown sends are explicit no-ops.
    let delivered = service
        .send_notification(alice, &message_envelope(vec![alice]))
        .await;
    assert_eq!(delivered, 0);
}

#[tokio::test]
async fn connection_cap_refuses_extra_tabs() {
    let service = service();
    let alice = UserId::new();
    for _ in 0..8 {
        let _ = connect(&service, alice).await;
    }

    let (tx, _rx) = mpsc::unbounded_channel();
    let conn = Connection::new(alice, DeviceMeta::default());
    assert!(service.register_connection(conn, tx).await.is_err());
    assert_eq!(service.user_connection_count(alice).await, 8);
}
