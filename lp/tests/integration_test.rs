//! Integration tests for LinkedPanels
//!
//! These tests drive the public API end to end: layout loading, the
//! resource facade, lifecycle rules and persistence.

use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use linkedpanels::{
    CoordinationStore, Lifecycle, LayoutConfig, ManualClock, MemoryStorageAdapter, MessageContent, PanelConfig,
    PanelNavigation, PersistenceConfig, PersistenceManager, PersistenceOptions, Resource, StoreEvent,
};
use proptest::prelude::*;
use serde_json::json;
use tempfile::NamedTempFile;

fn two_resource_layout() -> LayoutConfig {
    LayoutConfig::new()
        .with_resource(Resource::new("A"))
        .with_resource(Resource::new("B"))
        .with_panel("P", PanelConfig::new(["A", "B"]))
}

fn store_with_clock(config: LayoutConfig) -> (Arc<ManualClock>, CoordinationStore) {
    let clock = Arc::new(ManualClock::new(1_700_000_000_000));
    let mut store = CoordinationStore::with_clock(clock.clone());
    store.set_config(config);
    (clock, store)
}

// =============================================================================
// Messaging Scenarios
// =============================================================================

#[test]
fn test_state_supersession_keeps_only_latest() {
    let (_, mut store) = store_with_clock(two_resource_layout());

    {
        let mut a = store.resource_api("A");
        for value in ["x", "y"] {
            a.messaging()
                .send("B", MessageContent::state("hl", "highlight").with("value", value))
                .expect("send should succeed");
        }
    }

    let mut b = store.resource_api("B");
    let messaging = b.messaging();
    let current = messaging.get_current_state("highlight").expect("state should be retained");
    assert_eq!(current.content.get("value"), Some(&json!("y")));

    let retained: Vec<_> = messaging
        .get_messages()
        .into_iter()
        .filter(|m| m.holds_state("highlight"))
        .collect();
    assert_eq!(retained.len(), 1, "Exactly one state entry per key");
}

#[test]
fn test_supersession_over_many_sends() {
    let (_, mut store) = store_with_clock(two_resource_layout());

    for i in 0..25 {
        store
            .send_message(MessageContent::state("cursor", "pos").with("n", i), "A", Some("B"))
            .expect("send should succeed");
    }

    let messages = store.get_messages("B");
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].content.get("n"), Some(&json!(24)));
}

#[test]
fn test_broadcast_event_expires_after_ttl() {
    let (clock, mut store) = store_with_clock(two_resource_layout());

    let sent = store
        .resource_api("A")
        .messaging()
        .send_to_all(MessageContent::event("ping").with_ttl(100))
        .expect("broadcast should succeed");
    assert_eq!(sent, 1);

    let messages = store.get_messages("B");
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].lifecycle(), Lifecycle::Event);

    clock.advance(150);
    assert!(store.get_messages("B").is_empty(), "Expired event should disappear without consumption");
}

#[test]
fn test_event_without_ttl_stays_until_consumed() {
    let (clock, mut store) = store_with_clock(two_resource_layout());
    let message = store
        .send_message(MessageContent::event("ping"), "A", Some("B"))
        .expect("send should succeed");

    clock.advance(86_400_000);
    assert_eq!(store.get_messages("B").len(), 1);

    assert!(store.consume_event(&message.id));
    assert!(store.get_messages("B").is_empty());
}

#[test]
fn test_one_shot_consumption_across_broadcast_copies() {
    let layout = two_resource_layout()
        .with_resource(Resource::new("C"))
        .with_panel("Q", PanelConfig::new(["C"]));
    let (_, mut store) = store_with_clock(layout);

    let message = store
        .send_message(MessageContent::command("reload"), "A", None)
        .expect("broadcast should succeed");
    assert_eq!(store.get_messages("B").len(), 1);
    assert_eq!(store.get_messages("C").len(), 1);

    assert!(!store.consume_event(&message.id), "Commands are not consumed as events");
    assert!(store.consume_command(&message.id));
    assert!(!store.consume_command(&message.id), "Second consume is a no-op");

    for id in ["A", "B", "C"] {
        assert!(store.get_messages(id).iter().all(|m| m.id != message.id));
    }
}

#[test]
fn test_broadcast_state_supersedes_per_recipient() {
    let layout = two_resource_layout()
        .with_resource(Resource::new("C"))
        .with_panel("Q", PanelConfig::new(["C"]));
    let (_, mut store) = store_with_clock(layout);

    store
        .send_message(MessageContent::state("hl", "highlight").with("value", "x"), "A", None)
        .expect("broadcast should succeed");
    store
        .send_message(MessageContent::state("hl", "highlight").with("value", "y"), "C", Some("B"))
        .expect("send should succeed");

    // B's copy was superseded, C keeps its own broadcast copy
    let b_state = store.get_current_state("B", "highlight").expect("B has state");
    assert_eq!(b_state.content.get("value"), Some(&json!("y")));
    let c_state = store.get_current_state("C", "highlight").expect("C has state");
    assert_eq!(c_state.content.get("value"), Some(&json!("x")));
}

#[test]
fn test_send_to_panel_counts_exclude_sender() {
    let layout = LayoutConfig::new()
        .with_resource(Resource::new("A"))
        .with_resource(Resource::new("B"))
        .with_resource(Resource::new("C"))
        .with_resource(Resource::new("D"))
        .with_panel("P", PanelConfig::new(["A", "B", "C"]))
        .with_panel("Q", PanelConfig::new(["D"]));
    let (_, mut store) = store_with_clock(layout);

    let mut a = store.resource_api("A");
    assert_eq!(a.messaging().send_to_panel("P", MessageContent::event("sync")), Ok(2));
    assert_eq!(a.messaging().send_to_all(MessageContent::event("sync")), Ok(3));

    assert!(store.get_messages("A").is_empty());
    assert_eq!(store.get_messages("D").len(), 1);
}

#[test]
fn test_messages_read_newest_first() {
    let (clock, mut store) = store_with_clock(two_resource_layout());

    let first = store
        .send_message(MessageContent::event("one"), "A", Some("B"))
        .expect("send should succeed");
    let second = store
        .send_message(MessageContent::event("two"), "A", Some("B"))
        .expect("send should succeed");
    clock.advance(5);
    let third = store
        .send_message(MessageContent::command("three"), "A", Some("B"))
        .expect("send should succeed");

    let ids: Vec<String> = store.get_messages("B").into_iter().map(|m| m.id).collect();
    assert_eq!(ids, vec![third.id, second.id, first.id]);
}

#[test]
fn test_store_events_follow_commands() {
    let (_, mut store) = store_with_clock(two_resource_layout());
    let mut rx = store.subscribe();

    store.set_current_resource("P", 1).expect("navigation should succeed");
    store.set_current_resource("P", 1).expect("navigation should succeed");
    store.clear_messages("B").expect("B exists");

    let event = rx.try_recv().expect("navigation event");
    assert_eq!(
        event,
        StoreEvent::NavigationChanged {
            panel_id: "P".to_string(),
            index: 1,
            resource_id: Some("B".to_string()),
        }
    );
    assert!(rx.try_recv().is_err(), "No-op navigation and empty clear publish nothing");
}

// =============================================================================
// Navigation Properties
// =============================================================================

proptest! {
    #[test]
    fn prop_navigation_always_clamped(len in 1usize..12, index in any::<i64>()) {
        let ids: Vec<String> = (0..len).map(|i| format!("r{i}")).collect();
        let mut layout = LayoutConfig::new().with_panel("P", PanelConfig::new(ids.clone()));
        for id in &ids {
            layout = layout.with_resource(Resource::new(id.clone()));
        }

        let mut store = CoordinationStore::new();
        store.set_config(layout);

        let result = store.set_current_resource("P", index).expect("panel exists");
        prop_assert!(result < len);
        prop_assert_eq!(store.current_index("P"), Some(result));
    }

    #[test]
    fn prop_initial_index_clamped(len in 1usize..8, initial in -20i64..20) {
        let ids: Vec<String> = (0..len).map(|i| format!("r{i}")).collect();
        let mut layout = LayoutConfig::new()
            .with_panel("P", PanelConfig::new(ids.clone()).with_initial_index(initial));
        for id in &ids {
            layout = layout.with_resource(Resource::new(id.clone()));
        }

        let mut store = CoordinationStore::new();
        store.set_config(layout);

        let current = store.current_index("P").expect("panel exists");
        prop_assert!(current < len);
    }
}

// =============================================================================
// Layout Loading
// =============================================================================

#[test]
fn test_layout_from_yaml_file_drives_store() {
    let mut file = NamedTempFile::with_suffix(".yaml").expect("Failed to create temp file");
    writeln!(
        file,
        r#"
resources:
  - id: ult
    title: Literal Text
    category: scripture
  - id: notes
panels:
  left:
    resourceIds: [ult]
  right:
    resourceIds: [notes, ult]
    initialResourceId: ult
"#
    )
    .expect("Failed to write layout");

    let config = LayoutConfig::load(file.path()).expect("layout should load");
    assert!(config.validate().is_empty());

    let mut store = CoordinationStore::new();
    store.set_config(config);

    let visible = store.get_visible_resources_per_panel();
    assert_eq!(visible["left"], "ult");
    assert_eq!(visible["right"], "ult");
    assert_eq!(store.get_resource_info("notes").map(|i| i.title), Some("notes".to_string()));
}

#[test]
fn test_layout_from_json_file_with_initial_state() {
    let mut file = NamedTempFile::with_suffix(".json").expect("Failed to create temp file");
    let layout = json!({
        "resources": [{"id": "A"}, {"id": "B"}],
        "panels": {"P": {"resourceIds": ["A", "B"]}},
        "initialState": {
            "panelNavigation": {"P": {"currentIndex": 1}},
            "resourceMessages": {
                "B": [{
                    "id": "seed-1",
                    "timestamp": 10,
                    "fromResourceId": "A",
                    "toResourceId": "B",
                    "content": {"type": "hl", "lifecycle": "state", "stateKey": "highlight", "value": "seed"}
                }]
            }
        }
    });
    write!(file, "{}", layout).expect("Failed to write layout");

    let mut store = CoordinationStore::new();
    store.set_config(LayoutConfig::load(file.path()).expect("layout should load"));

    assert_eq!(store.current_index("P"), Some(1));
    let state = store.get_current_state("B", "highlight").expect("seeded state");
    assert_eq!(state.id, "seed-1");
}

#[test]
fn test_layout_load_missing_file_fails() {
    assert!(LayoutConfig::load("/nonexistent/layout.yaml").is_err());
}

// =============================================================================
// Persistence
// =============================================================================

#[tokio::test]
async fn test_persistence_round_trip_filters_events() {
    let clock = Arc::new(ManualClock::new(1_700_000_000_000));
    let storage = Arc::new(MemoryStorageAdapter::new());
    let manager = PersistenceManager::new(PersistenceOptions::new(storage), clock.clone());

    let (_, mut store) = store_with_clock(two_resource_layout());
    store.set_current_resource("P", 1).expect("navigation should succeed");
    store
        .send_message(MessageContent::state("hl", "highlight").with("value", "x"), "A", Some("B"))
        .expect("send should succeed");
    store
        .send_message(MessageContent::event("ping"), "A", Some("B"))
        .expect("send should succeed");

    let navigation = store.navigation_state();
    assert!(manager.save_state(&navigation, &store.message_snapshot()).await);

    let snapshot = manager.load_state().await.expect("snapshot should load");
    assert_eq!(snapshot.panel_navigation, navigation);
    let b_messages = &snapshot.resource_messages["B"];
    assert_eq!(b_messages.len(), 1, "Default filter keeps state, drops events");
    assert_eq!(b_messages[0].lifecycle(), Lifecycle::State);
}

#[tokio::test]
async fn test_persistence_custom_filter_and_flags() {
    let clock = Arc::new(ManualClock::new(0));
    let storage = Arc::new(MemoryStorageAdapter::new());
    let config = PersistenceConfig {
        persist_navigation: false,
        ..Default::default()
    };
    let manager = PersistenceManager::new(
        PersistenceOptions::new(storage)
            .with_config(config)
            .with_message_filter(|m| m.lifecycle() != Lifecycle::Command),
        clock,
    );

    let (_, mut store) = store_with_clock(two_resource_layout());
    store
        .send_message(MessageContent::event("ping"), "A", Some("B"))
        .expect("send should succeed");
    store
        .send_message(MessageContent::command("go"), "A", Some("B"))
        .expect("send should succeed");

    assert!(manager.save_state(&store.navigation_state(), &store.message_snapshot()).await);
    let snapshot = manager.load_state().await.expect("snapshot should load");

    assert!(snapshot.panel_navigation.is_empty());
    assert_eq!(snapshot.resource_messages["B"].len(), 1);
    assert_eq!(snapshot.resource_messages["B"][0].lifecycle(), Lifecycle::Event);
}

#[tokio::test]
async fn test_expired_snapshot_is_absent() {
    let clock = Arc::new(ManualClock::new(1_000));
    let storage = Arc::new(MemoryStorageAdapter::new());
    let config = PersistenceConfig {
        state_ttl_ms: 1_000,
        ..Default::default()
    };
    let manager = PersistenceManager::new(PersistenceOptions::new(storage).with_config(config), clock.clone());

    let mut navigation = BTreeMap::new();
    navigation.insert("P".to_string(), PanelNavigation { current_index: 1 });
    assert!(manager.save_state(&navigation, &HashMap::new()).await);

    clock.advance(1_001);
    assert!(manager.load_state().await.is_none());
}

#[tokio::test]
async fn test_store_restores_after_restart() {
    let storage = Arc::new(MemoryStorageAdapter::new());
    let options = || {
        PersistenceOptions::new(storage.clone()).with_config(PersistenceConfig {
            auto_save_debounce_ms: 20,
            ..Default::default()
        })
    };

    {
        let mut store = CoordinationStore::new().with_persistence(options());
        store.set_config(two_resource_layout());
        let mut a = store.resource_api("A");
        a.navigation().go_to_resource("B").expect("B is in P");
        a.messaging()
            .send("B", MessageContent::state("hl", "highlight").with("value", "kept"))
            .expect("send should succeed");

        // Let the debounced save land instead of flushing
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(storage.write_count(), 1);
        store.dispose();
    }

    let mut store = CoordinationStore::new().with_persistence(options());
    store.set_config(two_resource_layout());
    assert_eq!(store.current_index("P"), Some(0));

    assert!(store.restore_persisted_state().await);
    assert_eq!(store.current_index("P"), Some(1));
    let state = store.get_current_state("B", "highlight").expect("restored state");
    assert_eq!(state.content.get("value"), Some(&json!("kept")));

    assert!(store.clear_persisted_state().await);
    let info = store.storage_info().await.expect("persistence enabled");
    assert!(!info.exists);
}

#[tokio::test]
async fn test_unavailable_storage_degrades_quietly() {
    let storage = Arc::new(MemoryStorageAdapter::new());
    storage.set_available(false);

    let mut store = CoordinationStore::new().with_persistence(PersistenceOptions::new(storage.clone()));
    store.set_config(two_resource_layout());
    store.set_current_resource("P", 1).expect("navigation still works");

    assert!(!store.flush().await);
    assert!(!store.restore_persisted_state().await);
    assert_eq!(storage.write_count(), 0);
}
