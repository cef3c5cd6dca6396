//! Property-based tests for domain types and the lock projection.
//!
//! These tests use proptest to verify invariants hold across randomly
//! generated inputs: validated types round-trip, and the lock
//! coordinator's derived state always agrees with a reference model of
//! the event log.

use std::sync::Arc;

use proptest::prelude::*;

use atelier::core::types::{Actor, ObjectId, RepoId, RepoPath};
use atelier::ledger::{LedgerStore, MemoryLedger};
use atelier::locks::{LockCoordinator, LockStatus};

/// Strategy for generating valid hex object ids.
fn valid_oid_string() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop::sample::select(vec![
            '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'a', 'b', 'c', 'd', 'e', 'f',
        ]),
        40,
    )
    .prop_map(|chars| chars.into_iter().collect())
}

/// Strategy for generating valid repository path segments.
fn path_segment() -> impl Strategy<Value = String> {
    "[a-z0-9_][a-z0-9_.-]{0,10}".prop_filter("no dot segments", |s| s != "." && s != "..")
}

/// Strategy for generating valid repository paths.
fn valid_repo_path() -> impl Strategy<Value = String> {
    prop::collection::vec(path_segment(), 1..4).prop_map(|segments| segments.join("/"))
}

proptest! {
    /// Any valid object id round-trips through serde, lowercased.
    #[test]
    fn object_id_serde_roundtrip(hex in valid_oid_string()) {
        let oid = ObjectId::new(&hex).unwrap();
        let json = serde_json::to_string(&oid).unwrap();
        let parsed: ObjectId = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(oid, parsed);
    }

    /// Any valid repository path round-trips through serde.
    #[test]
    fn repo_path_serde_roundtrip(raw in valid_repo_path()) {
        let path = RepoPath::new(&raw).unwrap();
        let json = serde_json::to_string(&path).unwrap();
        let parsed: RepoPath = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(path, parsed);
    }

    /// A constructed path never contains traversal segments.
    #[test]
    fn repo_path_never_escapes(raw in valid_repo_path()) {
        let path = RepoPath::new(&raw).unwrap();
        for segment in path.as_str().split('/') {
            prop_assert!(!segment.is_empty());
            prop_assert_ne!(segment, ".");
            prop_assert_ne!(segment, "..");
        }
    }
}

/// One requested lock toggle: which actor, and the desired state.
#[derive(Debug, Clone, Copy)]
struct Toggle {
    actor: usize,
    desired: bool,
}

fn toggles() -> impl Strategy<Value = Vec<Toggle>> {
    prop::collection::vec(
        (0..3usize, any::<bool>()).prop_map(|(actor, desired)| Toggle { actor, desired }),
        0..40,
    )
}

fn actors() -> Vec<Actor> {
    vec![
        Actor::new("u1", "U1", "u1@example.com"),
        Actor::new("u2", "U2", "u2@example.com"),
        Actor::new("u3", "U3", "u3@example.com"),
    ]
}

/// Reference model of the coordinator's acceptance rules: the last
/// accepted event, as `(actor index, locked)`.
fn model_accepts(last: Option<(usize, bool)>, toggle: Toggle) -> bool {
    if toggle.desired {
        !matches!(last, Some((holder, true)) if holder != toggle.actor)
    } else {
        matches!(last, Some((actor, _)) if actor == toggle.actor)
    }
}

proptest! {
    /// For any toggle sequence, the projected lock status equals the
    /// reference model, and the event log grew by exactly the number of
    /// accepted toggles.
    #[test]
    fn projection_matches_reference_model(sequence in toggles()) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let ledger = Arc::new(MemoryLedger::new());
            let coordinator = LockCoordinator::new(ledger.clone());
            let actors = actors();
            let repo = RepoId(1);
            let path = RepoPath::new("scenes/skybox.psd").unwrap();

            let mut last: Option<(usize, bool)> = None;
            let mut accepted = 0usize;

            for toggle in sequence {
                let result = coordinator
                    .set_lock(repo, &path, &actors[toggle.actor], toggle.desired)
                    .await;
                let expected = model_accepts(last, toggle);
                prop_assert_eq!(
                    result.is_ok(),
                    expected,
                    "toggle {:?} against model state {:?}",
                    toggle,
                    last
                );
                if expected {
                    last = Some((toggle.actor, toggle.desired));
                    accepted += 1;
                }

                // The projection agrees with the model after every step.
                let status = coordinator.get_lock_status(repo, &path).await.unwrap();
                match last {
                    Some((holder, true)) => {
                        let lock_holder = status.holder().expect("model says locked");
                        prop_assert_eq!(lock_holder.id.as_str(), actors[holder].id.as_str());
                    }
                    _ => prop_assert_eq!(&status, &LockStatus::Unlocked),
                }

                // Guards agree: exactly the non-holders are blocked.
                for (index, actor) in actors.iter().enumerate() {
                    let guarded = coordinator
                        .guard_mutation(repo, std::slice::from_ref(&path), actor)
                        .await;
                    let blocked = matches!(last, Some((holder, true)) if holder != index);
                    prop_assert_eq!(guarded.is_err(), blocked);
                }
            }

            // Audit trail: one event per accepted toggle, none removed.
            prop_assert_eq!(ledger.event_count(), accepted);

            // The full history is still readable and newest-first.
            if let Some(file) = ledger.find_file(repo, &path).await.unwrap() {
                let events = ledger.lock_events(file.file_id).await.unwrap();
                prop_assert_eq!(events.len(), accepted);
                for window in events.windows(2) {
                    prop_assert!(window[0].sort_key() > window[1].sort_key());
                }
            }
            Ok(())
        })?;
    }
}
