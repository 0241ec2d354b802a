// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::controller::ControllerState;

#[tokio::test]
async fn subscriber_receives_published_events() {
    let bus = EventBus::new(8);
    let mut sub = bus.subscribe();

    bus.publish(Event::controller_state_changed("s1", ControllerState::Idle, ControllerState::Watching));

    let event = sub.recv().await.expect("event delivered");
    assert_eq!(event.session_id(), Some("s1"));
}

#[tokio::test]
async fn dropping_subscription_unsubscribes() {
    let bus = EventBus::new(8);
    let sub = bus.subscribe();
    assert_eq!(bus.subscriber_count(), 1);
    drop(sub);
    // Give the rcu a beat; it's synchronous so this should already be visible.
    assert_eq!(bus.subscriber_count(), 0);
}

#[tokio::test]
async fn other_subscribers_unaffected_by_one_lagging() {
    let bus = EventBus::new(1);
    let mut slow = bus.subscribe();
    let mut fast = bus.subscribe();

    // Overflow the slow subscriber's queue (depth 1) without it ever calling recv().
    bus.publish(Event::controller_state_changed("s1", ControllerState::Idle, ControllerState::Watching));
    bus.publish(Event::controller_state_changed("s1", ControllerState::Watching, ControllerState::PromptPending));

    // The fast subscriber still received events fine.
    let _ = fast.recv().await.expect("fast subscriber unaffected");

    // The slow subscriber was dropped from the bus.
    assert_eq!(bus.subscriber_count(), 1);
    drop(slow);
}

#[tokio::test]
async fn independent_subscribers_each_get_every_event() {
    let bus = EventBus::new(8);
    let mut a = bus.subscribe();
    let mut b = bus.subscribe();

    bus.publish(Event::response_sent("s1", "fp1", "y"));

    assert!(a.recv().await.is_some());
    assert!(b.recv().await.is_some());
}
