//! Broadcast hub integration tests

use std::sync::Arc;

use chrono::Utc;
use phonix_gateway::events::{EventBus, run_dispatcher};
use phonix_gateway::timeline::PhonemeCategory;
use phonix_gateway::{BroadcastHub, Event, Role, Target};

mod common;
use common::{DeliveryLog, RecordingSink};

#[tokio::test]
async fn failing_viewer_is_pruned_after_the_others_receive() {
    let hub = BroadcastHub::new();
    let log = Arc::new(DeliveryLog::default());

    let first = Arc::new(RecordingSink::new("first", Arc::clone(&log)));
    let broken = Arc::new(RecordingSink::failing("broken", Arc::clone(&log)));
    let third = Arc::new(RecordingSink::new("third", Arc::clone(&log)));

    hub.connect(Role::Viewer, first.clone(), None).await.unwrap();
    hub.connect(Role::Viewer, broken.clone(), None).await.unwrap();
    hub.connect(Role::Viewer, third.clone(), None).await.unwrap();

    let delivered = hub.broadcast(Role::Viewer, &Event::energy(0.1, Utc::now())).await;

    assert_eq!(delivered, 2);
    assert_eq!(hub.count(Role::Viewer).await, 2);
    assert_eq!(log.entries(), vec!["first", "broken", "third"]);
    assert_eq!(first.kinds(), vec!["speech_haptic_energy"]);
    assert_eq!(third.kinds(), vec!["speech_haptic_energy"]);

    // The pruned sink is never tried again
    hub.broadcast(Role::Viewer, &Event::energy(0.2, Utc::now())).await;
    assert_eq!(log.entries(), vec!["first", "broken", "third", "first", "third"]);
}

#[tokio::test]
async fn roles_are_independent() {
    let hub = BroadcastHub::new();
    let log = Arc::new(DeliveryLog::default());
    let phone = Arc::new(RecordingSink::new("phone", Arc::clone(&log)));
    let dashboard = Arc::new(RecordingSink::new("dashboard", Arc::clone(&log)));

    hub.connect(Role::Source, phone.clone(), None).await.unwrap();
    let dashboard_id = hub
        .connect(
            Role::Viewer,
            dashboard.clone(),
            Some(serde_json::json!({"name": "laptop"})),
        )
        .await
        .unwrap();

    hub.broadcast(Role::Source, &Event::Vibrate { pattern: vec![80, 40, 80] })
        .await;
    assert_eq!(phone.kinds(), vec!["vibrate"]);
    assert!(dashboard.kinds().is_empty());

    let viewers = hub.list(Role::Viewer).await;
    assert_eq!(viewers.len(), 1);
    assert_eq!(viewers[0].id, dashboard_id.to_string());

    assert!(hub.disconnect(dashboard_id).await);
    assert!(!hub.disconnect(dashboard_id).await);
    assert_eq!(hub.count(Role::Viewer).await, 0);
    assert_eq!(hub.count(Role::Source).await, 1);
}

#[tokio::test]
async fn broadcast_to_empty_role_is_a_noop() {
    let hub = BroadcastHub::new();
    assert_eq!(hub.broadcast(Role::Viewer, &Event::energy(0.0, Utc::now())).await, 0);
}

#[tokio::test]
async fn low_confidence_trigger_halves_pattern_for_everyone() {
    let hub = BroadcastHub::new();
    let log = Arc::new(DeliveryLog::default());
    let phone = Arc::new(RecordingSink::new("phone", Arc::clone(&log)));
    let dashboard = Arc::new(RecordingSink::new("dashboard", Arc::clone(&log)));
    hub.connect(Role::Source, phone.clone(), None).await.unwrap();
    hub.connect(Role::Viewer, dashboard.clone(), None).await.unwrap();

    let event = hub.trigger_haptic(PhonemeCategory::Consonant, 0.5).await;

    let Event::HapticFeedback(feedback) = &event else {
        panic!("expected haptic feedback");
    };
    assert_eq!(feedback.pattern, vec![25, 15, 25]);
    assert_eq!(phone.kinds(), vec!["haptic_feedback"]);
    assert_eq!(dashboard.kinds(), vec!["haptic_feedback"]);
}

#[tokio::test]
async fn dispatcher_routes_by_target() {
    let hub = Arc::new(BroadcastHub::new());
    let log = Arc::new(DeliveryLog::default());
    let phone = Arc::new(RecordingSink::new("phone", Arc::clone(&log)));
    let dashboard = Arc::new(RecordingSink::new("dashboard", Arc::clone(&log)));
    hub.connect(Role::Source, phone.clone(), None).await.unwrap();
    hub.connect(Role::Viewer, dashboard.clone(), None).await.unwrap();

    let (bus, rx) = EventBus::new(16);
    let dispatcher = tokio::spawn(run_dispatcher(rx, Arc::clone(&hub)));

    bus.publish(Target::Sources, Event::Vibrate { pattern: vec![80] })
        .await
        .unwrap();
    bus.publish(Target::All, Event::energy(0.05, Utc::now())).await.unwrap();
    drop(bus);
    dispatcher.await.unwrap();

    assert_eq!(phone.kinds(), vec!["vibrate", "speech_haptic_energy"]);
    assert_eq!(dashboard.kinds(), vec!["speech_haptic_energy"]);
}
