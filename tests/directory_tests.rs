#![cfg(feature = "sync")]

mod common;

use std::time::Duration;

use cardwise::core::*;
use cardwise::directory::*;
use common::*;

fn ids(snapshot: &DirectorySnapshot) -> Vec<&str> {
    snapshot
        .instruments
        .iter()
        .map(|i| i.instrument_id.as_str())
        .collect()
}

fn selected(snapshot: &DirectorySnapshot) -> Option<&str> {
    snapshot.selected_instrument().map(|i| i.instrument_id.as_str())
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn starts_idle_and_empty() {
    let directory = InstrumentDirectory::new(fixture_gateway());
    let snap = directory.snapshot();
    assert_eq!(snap.load_state, LoadState::Idle);
    assert!(snap.instruments.is_empty());
    assert!(snap.selection.is_none());
    assert_eq!(directory.refresh().await, None);
}

#[tokio::test(start_paused = true)]
async fn load_keeps_only_normal_cards_and_autoselects_first() {
    init_tracing();
    let directory = InstrumentDirectory::new(fixture_gateway());
    let outcome = directory.load_for_holder("529.982.247-25").await;
    assert_eq!(outcome, LoadOutcome::Applied(LoadState::Loaded));

    let snap = directory.snapshot();
    assert_eq!(ids(&snap), vec!["c-100", "c-101", "c-103"]);
    assert!(snap.instruments.iter().all(|i| i.status == InstrumentStatus::Normal));
    assert_eq!(selected(&snap), Some("c-100"));
    assert_eq!(snap.selected_account_id(), Some(&AccountId::new("acc-1")));
    assert_eq!(snap.holder.as_deref(), Some(HOLDER));
    assert_selection_consistent(&snap);
}

#[tokio::test(start_paused = true)]
async fn loading_state_is_published_while_in_flight() {
    let directory = InstrumentDirectory::new(fixture_gateway());
    let mut states = directory.subscribe();

    let load = directory.load_for_holder(HOLDER);
    let observe = async {
        states.changed().await.unwrap();
        let during = states.borrow_and_update().load_state;
        states.changed().await.unwrap();
        let after = states.borrow_and_update().load_state;
        (during, after)
    };
    let (_, (during, after)) = tokio::join!(load, observe);
    assert_eq!(during, LoadState::Loading);
    assert_eq!(after, LoadState::Loaded);
}

#[tokio::test(start_paused = true)]
async fn holder_with_no_selectable_cards() {
    let gateway = fixture_gateway();
    gateway.edit_fixtures(|data| {
        data.add_holder(
            "00000000191",
            "pw",
            vec![card("x-1", "acc-x", InstrumentStatus::Cancelled)],
        )
    });
    let directory = InstrumentDirectory::new(gateway);
    directory.load_for_holder("00000000191").await;

    let snap = directory.snapshot();
    assert_eq!(snap.load_state, LoadState::Loaded);
    assert!(snap.instruments.is_empty());
    assert!(snap.selection.is_none());
}

#[tokio::test(start_paused = true)]
async fn failure_stores_error_and_keeps_stale_cards() {
    let gateway = fixture_gateway();
    let directory = InstrumentDirectory::new(gateway.clone());
    directory.load_for_holder(HOLDER).await;
    assert!(directory.select(&InstrumentId::new("c-103")));

    gateway.edit_fixtures(|data| data.fail_holder(HOLDER, ApiError::ServerError { status: 503 }));
    let outcome = directory.refresh().await;
    assert_eq!(outcome, Some(LoadOutcome::Applied(LoadState::Error)));

    let snap = directory.snapshot();
    assert_eq!(snap.error, Some(ApiError::ServerError { status: 503 }));
    assert_eq!(ids(&snap), vec!["c-100", "c-101", "c-103"]);
    assert_eq!(selected(&snap), Some("c-103"));

    gateway.edit_fixtures(|data| data.heal());
    directory.refresh().await;
    let snap = directory.snapshot();
    assert_eq!(snap.load_state, LoadState::Loaded);
    assert!(snap.error.is_none());
}

#[tokio::test(start_paused = true)]
async fn first_load_failure_leaves_nothing_selected() {
    let gateway = fixture_gateway();
    gateway.edit_fixtures(|data| data.fail_holder(HOLDER, ApiError::Timeout));
    let directory = InstrumentDirectory::new(gateway);
    directory.load_for_holder(HOLDER).await;

    let snap = directory.snapshot();
    assert_eq!(snap.load_state, LoadState::Error);
    assert!(snap.instruments.is_empty());
    assert_selection_consistent(&snap);
}

// ---------------------------------------------------------------------------
// Refetch
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn refetch_keeps_surviving_selection() {
    let directory = InstrumentDirectory::new(fixture_gateway());
    directory.load_for_holder(HOLDER).await;
    directory.select(&InstrumentId::new("c-101"));

    directory.refresh().await;
    assert_eq!(selected(&directory.snapshot()), Some("c-101"));
}

#[tokio::test(start_paused = true)]
async fn refetch_drops_selection_of_card_no_longer_normal() {
    let gateway = fixture_gateway();
    let directory = InstrumentDirectory::new(gateway.clone());
    directory.load_for_holder(HOLDER).await;
    directory.select(&InstrumentId::new("c-103"));

    gateway
        .block_instrument(&InstrumentId::new("c-103"), BlockReason::Stolen)
        .await
        .unwrap();
    directory.refresh().await;

    let snap = directory.snapshot();
    assert_eq!(ids(&snap), vec!["c-100", "c-101"]);
    assert_eq!(selected(&snap), Some("c-100"));
    assert_eq!(snap.selected_account_id(), Some(&AccountId::new("acc-1")));
}

#[tokio::test(start_paused = true)]
async fn refetch_takes_fresh_instrument_object() {
    let gateway = fixture_gateway();
    let directory = InstrumentDirectory::new(gateway.clone());
    directory.load_for_holder(HOLDER).await;

    gateway
        .set_contactless(&InstrumentId::new("c-100"), false)
        .await
        .unwrap();
    directory.refresh().await;

    let snap = directory.snapshot();
    assert!(!snap.selected_instrument().unwrap().contactless_enabled);
}

#[tokio::test(start_paused = true)]
async fn holder_change_clears_previous_data_first() {
    let directory = InstrumentDirectory::new(fixture_gateway());
    directory.load_for_holder(HOLDER).await;
    let mut states = directory.subscribe();

    let load = directory.load_for_holder(COMPANY);
    let observe = async {
        states.changed().await.unwrap();
        let snap = states.borrow_and_update().clone();
        assert_eq!(snap.load_state, LoadState::Loading);
        assert!(snap.instruments.is_empty());
        assert!(snap.selection.is_none());
    };
    tokio::join!(load, observe);

    let snap = directory.snapshot();
    assert_eq!(ids(&snap), vec!["c-200"]);
    assert_eq!(snap.selected_account_id(), Some(&AccountId::new("acc-10")));
}

// ---------------------------------------------------------------------------
// Staleness
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn superseded_load_is_discarded() {
    let directory = InstrumentDirectory::new(fixture_gateway());

    let first = directory.load_for_holder(HOLDER);
    let second = async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        directory.load_for_holder(COMPANY).await
    };
    let (first, second) = tokio::join!(first, second);

    assert_eq!(first, LoadOutcome::Superseded);
    assert_eq!(second, LoadOutcome::Applied(LoadState::Loaded));
    let snap = directory.snapshot();
    assert_eq!(snap.holder.as_deref(), Some(COMPANY));
    assert_eq!(ids(&snap), vec!["c-200"]);
}

#[tokio::test(start_paused = true)]
async fn clear_supersedes_in_flight_load() {
    let directory = InstrumentDirectory::new(fixture_gateway());

    let load = directory.load_for_holder(HOLDER);
    let logout = async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        directory.clear();
    };
    let (outcome, ()) = tokio::join!(load, logout);

    assert_eq!(outcome, LoadOutcome::Superseded);
    let snap = directory.snapshot();
    assert_eq!(snap.load_state, LoadState::Idle);
    assert!(snap.instruments.is_empty());
    assert!(snap.holder.is_none());
}

#[tokio::test(start_paused = true)]
async fn generation_increases_per_load() {
    let directory = InstrumentDirectory::new(fixture_gateway());
    directory.load_for_holder(HOLDER).await;
    let g1 = directory.snapshot().generation();
    directory.refresh().await;
    assert!(directory.snapshot().generation() > g1);
}

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn select_updates_pair_together() {
    let directory = InstrumentDirectory::new(fixture_gateway());
    directory.load_for_holder(HOLDER).await;

    assert!(directory.select(&InstrumentId::new("c-103")));
    let snap = directory.snapshot();
    assert_eq!(selected(&snap), Some("c-103"));
    assert_eq!(snap.selected_account_id(), Some(&AccountId::new("acc-3")));
}

#[tokio::test(start_paused = true)]
async fn select_of_non_member_is_noop() {
    let directory = InstrumentDirectory::new(fixture_gateway());
    directory.load_for_holder(HOLDER).await;
    let before = directory.snapshot();
    let states = directory.subscribe();

    // c-102 exists for this holder but is blocked, so it was filtered out.
    assert!(!directory.select(&InstrumentId::new("c-102")));
    assert!(!directory.select(&InstrumentId::new("missing")));
    assert_eq!(directory.snapshot(), before);
    assert!(!states.has_changed().unwrap());
}

#[tokio::test(start_paused = true)]
async fn selection_invariant_holds_across_operations() {
    let gateway = fixture_gateway();
    let directory = InstrumentDirectory::new(gateway.clone());
    assert_selection_consistent(&directory.snapshot());

    directory.load_for_holder(HOLDER).await;
    for id in ["c-103", "c-102", "c-101", "nope", "c-100", "c-103"] {
        directory.select(&InstrumentId::new(id));
        assert_selection_consistent(&directory.snapshot());
    }

    gateway
        .block_instrument(&InstrumentId::new("c-103"), BlockReason::Temporary)
        .await
        .unwrap();
    directory.refresh().await;
    assert_selection_consistent(&directory.snapshot());

    directory.load_for_holder(COMPANY).await;
    assert_selection_consistent(&directory.snapshot());

    directory.clear();
    assert_selection_consistent(&directory.snapshot());
}

#[tokio::test(start_paused = true)]
async fn readers_never_see_selection_out_of_step() {
    let directory = InstrumentDirectory::new(fixture_gateway());
    directory.load_for_holder(HOLDER).await;

    let mut states = directory.subscribe();
    let reader = tokio::spawn(async move {
        let mut observed = 0;
        while states.changed().await.is_ok() {
            assert_selection_consistent(&states.borrow_and_update());
            observed += 1;
        }
        observed
    });

    let step = || tokio::time::sleep(Duration::from_millis(40));
    let reload = directory.load_for_holder(HOLDER);
    let edits = async {
        step().await;
        directory.select(&InstrumentId::new("c-103"));
        step().await;
        directory.apply_update(card("c-103", "acc-3", InstrumentStatus::Blocked));
        step().await;
        directory.select(&InstrumentId::new("c-101"));
        tokio::task::yield_now().await;
        directory.apply_update(card("c-100", "acc-1", InstrumentStatus::Normal));
    };
    let switch_holder = async {
        tokio::time::sleep(Duration::from_millis(200)).await;
        directory.load_for_holder(COMPANY).await
    };
    let (stale, _, fresh) = tokio::join!(reload, edits, switch_holder);

    assert_eq!(stale, LoadOutcome::Superseded);
    assert_eq!(fresh, LoadOutcome::Applied(LoadState::Loaded));
    assert_eq!(selected(&directory.snapshot()), Some("c-200"));

    drop(directory);
    let observed = reader.await.unwrap();
    assert!(observed >= 4, "reader saw {observed} states");
}

// ---------------------------------------------------------------------------
// Updates after writes
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn apply_update_replaces_card_in_place() {
    let gateway = fixture_gateway();
    let directory = InstrumentDirectory::new(gateway.clone());
    directory.load_for_holder(HOLDER).await;

    let updated = gateway
        .set_contactless(&InstrumentId::new("c-100"), false)
        .await
        .unwrap();
    assert!(directory.apply_update(updated.clone()));

    let snap = directory.snapshot();
    assert_eq!(ids(&snap), vec!["c-100", "c-101", "c-103"]);
    assert_eq!(snap.selected_instrument(), Some(&updated));
    assert!(!directory.apply_update(updated));
}

#[tokio::test(start_paused = true)]
async fn apply_update_removes_blocked_selected_card() {
    let gateway = fixture_gateway();
    let directory = InstrumentDirectory::new(gateway.clone());
    directory.load_for_holder(HOLDER).await;
    directory.select(&InstrumentId::new("c-103"));

    let blocked = gateway
        .block_instrument(&InstrumentId::new("c-103"), BlockReason::Temporary)
        .await
        .unwrap();
    assert!(directory.apply_update(blocked));

    let snap = directory.snapshot();
    assert!(!snap.contains(&InstrumentId::new("c-103")));
    assert_eq!(selected(&snap), Some("c-100"));
    assert_selection_consistent(&snap);
}

#[tokio::test(start_paused = true)]
async fn apply_update_ignores_unknown_card() {
    let directory = InstrumentDirectory::new(fixture_gateway());
    directory.load_for_holder(HOLDER).await;
    assert!(!directory.apply_update(card("c-999", "acc-9", InstrumentStatus::Normal)));
}
