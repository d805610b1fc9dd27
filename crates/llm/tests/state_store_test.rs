use invocation::{CredentialName, ErrorKind, Timestamp};
use llm::{CredentialState, RotationState, RotationStateStore, StateStoreError};

fn name(s: &str) -> CredentialName {
    CredentialName::new(s).unwrap()
}

fn store() -> (tempfile::TempDir, RotationStateStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = RotationStateStore::new(dir.path().join("nested").join("state.json"));
    (dir, store)
}

#[test]
fn missing_file_loads_as_empty_state() {
    let (_dir, store) = store();
    assert!(store.load().unwrap().is_empty());
}

#[test]
fn empty_file_loads_as_empty_state() {
    let (_dir, store) = store();
    std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
    std::fs::write(store.path(), "  \n").unwrap();
    assert!(store.load().unwrap().is_empty());
}

#[test]
fn corrupt_file_is_reported() {
    let (_dir, store) = store();
    std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
    std::fs::write(store.path(), "{\"a\": ").unwrap();
    assert!(matches!(store.load(), Err(StateStoreError::Corrupt { .. })));
}

#[test]
fn save_then_load_is_lossless() {
    let (_dir, store) = store();
    let now = Timestamp::now();
    let mut state = RotationState::default();
    state.set(
        name("a"),
        CredentialState::exhausted(now.plus_hours(3.0), ErrorKind::QuotaExhausted),
    );
    state.set(name("b"), CredentialState::disabled(ErrorKind::AuthError));
    state.set(name("c"), CredentialState::default());

    store.save(&state).unwrap();

    assert_eq!(store.load().unwrap(), state);
}

#[test]
fn saving_leaves_no_temp_files_behind() {
    let (_dir, store) = store();
    store.save(&RotationState::default()).unwrap();
    store
        .update(|s| s.set(name("a"), CredentialState::disabled(ErrorKind::AuthError)))
        .unwrap();

    let entries: Vec<_> = std::fs::read_dir(store.path().parent().unwrap())
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(entries, [std::ffi::OsString::from("state.json")]);
}

#[test]
fn update_merges_with_what_is_on_disk() {
    let (_dir, store) = store();
    let other_run = RotationStateStore::new(store.path());

    other_run
        .update(|s| s.set(name("a"), CredentialState::disabled(ErrorKind::AuthError)))
        .unwrap();
    let merged = store
        .update(|s| {
            s.set(
                name("b"),
                CredentialState::exhausted(Timestamp::now().plus_hours(1.0), ErrorKind::QuotaExhausted),
            )
        })
        .unwrap();

    assert_eq!(merged.len(), 2);
    assert_eq!(store.load().unwrap(), merged);
}

#[test]
fn reset_removes_a_single_entry() {
    let (_dir, store) = store();
    store
        .update(|s| {
            s.set(name("a"), CredentialState::disabled(ErrorKind::AuthError));
            s.set(name("b"), CredentialState::disabled(ErrorKind::AuthError));
        })
        .unwrap();

    assert!(store.reset(&name("a")).unwrap());
    assert!(!store.reset(&name("a")).unwrap());

    let state = store.load().unwrap();
    assert!(state.get(&name("a")).is_none());
    assert!(state.get(&name("b")).is_some());
}

#[test]
fn clear_forgets_everything() {
    let (_dir, store) = store();
    store
        .update(|s| s.set(name("a"), CredentialState::disabled(ErrorKind::AuthError)))
        .unwrap();
    store.clear().unwrap();
    assert!(store.load().unwrap().is_empty());
}

#[test]
fn concurrent_writers_never_leave_a_torn_file() {
    let (_dir, store) = store();
    store.save(&RotationState::default()).unwrap();

    std::thread::scope(|scope| {
        for worker in 0..4 {
            let writer = RotationStateStore::new(store.path());
            scope.spawn(move || {
                for i in 0..25 {
                    let key = name(&format!("w{worker}-{i}"));
                    // Losing a race to another writer is acceptable; a partial
                    // file is not.
                    let _ = writer.update(|s| {
                        s.set(key, CredentialState::disabled(ErrorKind::AuthError))
                    });
                }
            });
        }
    });

    let state = store.load().unwrap();
    assert!(!state.is_empty());
    for (_, entry) in state.iter() {
        assert!(entry.disabled);
    }
}

#[test]
fn update_moves_an_unparseable_file_aside_before_writing() {
    let (_dir, store) = store();
    std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
    std::fs::write(store.path(), "[1, 2").unwrap();

    let written = store
        .update(|s| s.set(name("a"), CredentialState::disabled(ErrorKind::AuthError)))
        .unwrap();

    assert_eq!(written.len(), 1);
    assert_eq!(std::fs::read_to_string(store.quarantine_path()).unwrap(), "[1, 2");
    assert_eq!(store.load().unwrap(), written);
}

#[test]
fn reset_clears_an_unreadable_entry() {
    let (_dir, store) = store();
    std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
    std::fs::write(store.path(), r#"{"a": {"exhausted_until": "soon", "disabled": true}}"#).unwrap();

    assert!(!store.load().unwrap().is_available(&name("a"), Timestamp::now()));
    assert!(store.reset(&name("a")).unwrap());
    assert!(store.load().unwrap().is_empty());
}
