use std::sync::Arc;

use chrono::NaiveDate;
use meetgrid_core::codec;
use meetgrid_core::{
    AvailabilityStore, EventDefinition, FileStore, Granularity, GridBuilder, MemoryStore,
    ParticipantSession, SessionOptions, SyncMode, SyncOptions, SyncStrategy, TimeSlot,
};

fn workshop() -> EventDefinition {
    EventDefinition::new("Workshop", Some("Planning"), "America/New_York")
        .with_range(
            NaiveDate::from_ymd_opt(2024, 11, 1).unwrap(),
            "09:00-10:00".parse().unwrap(),
        )
        .validated()
        .unwrap()
}

fn hourly(strategy: SyncStrategy) -> SessionOptions {
    SessionOptions {
        granularity: Granularity::HOUR,
        sync: SyncOptions {
            strategy,
            ..SyncOptions::default()
        },
    }
}

async fn converge(strategy: SyncStrategy) {
    let store = Arc::new(MemoryStore::new());
    let definition = workshop();
    let event_id = store.create_event(&definition).await.unwrap();

    // The definition travels to participants through the share link.
    let link = codec::share_link("https://meet.example/a", &event_id, &definition).unwrap();
    let shared = codec::parse_share_query(&link);
    let received = shared.decoded.definition;
    assert_eq!(received, definition);
    assert_eq!(shared.event_id.as_ref(), Some(&event_id));

    let grid = GridBuilder::new(Granularity::HOUR).build(&received);
    let labels: Vec<String> = grid.slots().map(TimeSlot::label).collect();
    assert_eq!(labels, vec!["9:00 AM", "10:00 AM"]);

    let nine = TimeSlot::parse("11/01/2024", "9:00 AM").unwrap();

    let mut alice = ParticipantSession::join(
        store.clone(),
        event_id.clone(),
        received.clone(),
        "Alice",
        hourly(strategy),
    )
    .await
    .unwrap();
    let mut bob = ParticipantSession::join(
        store.clone(),
        event_id.clone(),
        received,
        "Bob",
        hourly(strategy),
    )
    .await
    .unwrap();
    assert_eq!(alice.mode(), SyncMode::Live);

    assert!(alice.toggle(nine).await.unwrap());
    let cell = alice.aggregate().cell(&nine);
    assert_eq!(cell.count, 1);
    assert_eq!(cell.members, vec!["Alice"]);

    let seen_by_bob = bob.next_update().await.unwrap().cell(&nine);
    assert_eq!(seen_by_bob.members, vec!["Alice"]);

    assert!(bob.toggle(nine).await.unwrap());

    // Alice sees her own write first, then Bob's.
    loop {
        if alice.next_update().await.unwrap().count(&nine) == 2 {
            break;
        }
    }

    for session in [&alice, &bob] {
        let cell = session.aggregate().cell(&nine);
        assert_eq!(cell.count, 2);
        assert_eq!(cell.members, vec!["Alice", "Bob"]);
    }

    alice.close();
    bob.close();
    assert_eq!(store.subscriber_count(&event_id), 0);
}

#[tokio::test]
async fn test_two_participants_converge_with_refetch() {
    converge(SyncStrategy::Refetch).await;
}

#[tokio::test]
async fn test_two_participants_converge_with_incremental() {
    converge(SyncStrategy::Incremental).await;
}

#[tokio::test]
async fn test_file_store_sessions_converge_by_polling() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileStore::new(dir.path().join("store.json")));
    let definition = workshop();
    let event_id = store.create_event(&definition).await.unwrap();
    let nine = TimeSlot::parse("11/01/2024", "09:00").unwrap();

    let mut alice = ParticipantSession::join(
        store.clone(),
        event_id.clone(),
        definition.clone(),
        "Alice",
        hourly(SyncStrategy::Refetch),
    )
    .await
    .unwrap();
    let mut bob = ParticipantSession::join(
        store.clone(),
        event_id.clone(),
        definition,
        "Bob",
        hourly(SyncStrategy::Refetch),
    )
    .await
    .unwrap();
    assert_eq!(alice.mode(), SyncMode::Polling);

    alice.toggle(nine).await.unwrap();
    bob.toggle(nine).await.unwrap();

    let cell = alice.refresh().await.unwrap().cell(&nine);
    assert_eq!(cell.count, 2);
    assert_eq!(cell.members, vec!["Alice", "Bob"]);

    // Alice leaves and comes back.
    alice.close();
    let alice = ParticipantSession::join(
        store.clone(),
        event_id,
        workshop(),
        "Alice",
        hourly(SyncStrategy::Refetch),
    )
    .await
    .unwrap();
    assert!(alice.selection().contains(&nine));
}
