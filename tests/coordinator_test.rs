//! Concurrency tests for the turn-based coordinator.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tandem::core::{token_crc32, Coordinator, Turn};

#[test]
fn test_turns_strictly_alternate() {
    let coordinator = Arc::new(Coordinator::new(vec![1, 2]));
    let rounds = 50;

    let drafter = std::thread::spawn({
        let coordinator = Arc::clone(&coordinator);
        move || {
            let mut turns = 0;
            while let Some(mut snapshot) = coordinator.await_draft_turn() {
                snapshot.push(90 + turns as u32);
                coordinator.publish_draft(snapshot);
                turns += 1;
            }
            turns
        }
    });

    let mut n_accepted = 2;
    for round in 0..rounds {
        let token = 10 + round as u32;
        let tail = coordinator
            .exchange_verified(n_accepted, &[token], n_accepted + 1)
            .expect("not done yet");
        assert_eq!(tail[0], token, "tail must start at the anchor");
        n_accepted += 1;
    }
    coordinator.finish();

    let drafter_turns = drafter.join().unwrap();
    // The drafter got the first turn plus one per exchange, give or take the
    // final wake racing the finish.
    assert!(drafter_turns >= rounds, "drafter starved: {drafter_turns}");
}

#[test]
fn test_frontier_is_monotone_and_prefix_stable() {
    let coordinator = Arc::new(Coordinator::new(vec![1, 2, 3]));
    let observed = Arc::new(AtomicUsize::new(0));
    let stop = Arc::new(AtomicUsize::new(0));

    // An observer hammers snapshots while the actors run; every observation
    // must be internally consistent.
    let observer = std::thread::spawn({
        let coordinator = Arc::clone(&coordinator);
        let observed = Arc::clone(&observed);
        let stop = Arc::clone(&stop);
        move || {
            let mut last_approved = 0;
            let mut last_prefix: Vec<u32> = Vec::new();
            while stop.load(Ordering::Relaxed) == 0 {
                let snap = coordinator.snapshot();
                assert!(
                    snap.n_approved >= last_approved,
                    "approved frontier went backwards"
                );
                assert!(snap.n_approved <= snap.tokens.len());
                assert_eq!(
                    snap.crc32_approved,
                    token_crc32(&snap.tokens[..snap.n_approved]),
                    "fingerprint out of sync with approved prefix"
                );
                assert!(
                    snap.tokens.starts_with(&last_prefix),
                    "approved prefix was rewritten"
                );
                last_prefix = snap.tokens[..snap.n_approved].to_vec();
                last_approved = snap.n_approved;
                observed.fetch_add(1, Ordering::Relaxed);
            }
        }
    });

    let drafter = std::thread::spawn({
        let coordinator = Arc::clone(&coordinator);
        move || {
            while let Some(mut snapshot) = coordinator.await_draft_turn() {
                for i in 0..4 {
                    snapshot.push(500 + i);
                }
                coordinator.publish_draft(snapshot);
            }
        }
    });

    let mut n_accepted = 3;
    for round in 0..200u32 {
        coordinator
            .exchange_verified(n_accepted, &[round % 7, round % 5], n_accepted + 2)
            .expect("not done");
        n_accepted += 2;
    }
    coordinator.finish();
    drafter.join().unwrap();
    stop.store(1, Ordering::Relaxed);
    observer.join().unwrap();
    assert!(observed.load(Ordering::Relaxed) > 0);
}

#[test]
fn test_finish_unblocks_waiting_drafter() {
    let coordinator = Arc::new(Coordinator::new(vec![1]));
    coordinator.await_draft_turn().unwrap();
    // Turn is now Idle; a waiting drafter would block forever without the
    // done broadcast.
    let waiter = std::thread::spawn({
        let coordinator = Arc::clone(&coordinator);
        move || coordinator.await_draft_turn()
    });
    std::thread::sleep(Duration::from_millis(20));
    coordinator.finish();
    assert_eq!(waiter.join().unwrap(), None);
}

#[test]
fn test_snapshot_reports_turn() {
    let coordinator = Coordinator::new(vec![1]);
    assert_eq!(coordinator.snapshot().turn, Turn::Drafter);
    coordinator.await_draft_turn().unwrap();
    assert_eq!(coordinator.snapshot().turn, Turn::Idle);
    coordinator.publish_draft(vec![1, 7]);
    assert_eq!(coordinator.snapshot().turn, Turn::Target);
    coordinator.finish();
    assert_eq!(coordinator.snapshot().turn, Turn::Done);
}
