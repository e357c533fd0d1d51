use std::path::PathBuf;

use engine::{EngineError, ExportZone, GroupKey, GroupKeyOrdering, GroupStore, NewCost};
use uuid::Uuid;

fn store_with_dir() -> (GroupStore, PathBuf) {
    let root = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../../target/test_data")
        .join(format!("engine_{}", Uuid::new_v4()));
    std::fs::create_dir_all(&root).unwrap();
    (GroupStore::new(&root), root)
}

fn group() -> GroupKey {
    GroupKey::new(&[10, 20, 30], GroupKeyOrdering::AsReceived)
}

fn cost(amount: f64, note: Option<&str>, payer: &str, ratios: Vec<f64>) -> NewCost {
    NewCost {
        timestamp: 1_700_000_000_000,
        amount,
        note: note.map(str::to_string),
        payer: payer.to_string(),
        ratios,
    }
}

/// alice (A) and bob (B), closed.
fn closed_group(store: &GroupStore) {
    let mut session = store.open(&group()).unwrap();
    session.add_user("alice", "A").unwrap();
    session.add_user("bob", "B").unwrap();
    session.close_users().unwrap();
    session.commit().unwrap();
}

#[test]
fn missing_files_yield_open_empty_registry() {
    let (store, root) = store_with_dir();
    let session = store.open(&group()).unwrap();

    assert!(!session.registry().is_closed());
    assert!(session.registry().is_empty());
    assert!(!session.is_dirty());
    session.commit().unwrap();

    // Nothing changed, nothing written.
    assert!(!store.users_path(&group()).exists());
    std::fs::remove_dir_all(root).unwrap();
}

#[test]
fn registry_changes_are_persisted_on_commit() {
    let (store, root) = store_with_dir();
    closed_group(&store);

    let raw = std::fs::read_to_string(store.users_path(&group())).unwrap();
    assert_eq!(
        raw,
        r#"{"closed":true,"users":{"A":{"name":"alice","pos":0},"B":{"name":"bob","pos":1}}}"#
    );

    let session = store.open(&group()).unwrap();
    assert!(session.registry().is_closed());
    assert_eq!(session.registry().position_of("B"), Some(1));
    std::fs::remove_dir_all(root).unwrap();
}

#[test]
fn dropped_session_still_persists_changes() {
    let (store, root) = store_with_dir();
    {
        let mut session = store.open(&group()).unwrap();
        session.add_user("alice", "A").unwrap();
        assert!(session.is_dirty());
    }

    let session = store.open(&group()).unwrap();
    assert_eq!(session.registry().len(), 1);
    std::fs::remove_dir_all(root).unwrap();
}

#[test]
fn costs_require_closed_registry() {
    let (store, root) = store_with_dir();
    let mut session = store.open(&group()).unwrap();
    session.add_user("alice", "A").unwrap();

    let err = session.add_cost(cost(100.0, None, "A", vec![1.0])).unwrap_err();
    assert_eq!(
        err,
        EngineError::State("Please close users before adding costs".to_string())
    );
    assert!(!store.amounts_path(&group()).exists());
    session.commit().unwrap();
    std::fs::remove_dir_all(root).unwrap();
}

#[test]
fn unknown_payer_is_not_found() {
    let (store, root) = store_with_dir();
    closed_group(&store);

    let mut session = store.open(&group()).unwrap();
    let err = session
        .add_cost(cost(10.0, None, "carol", vec![1.0, 1.0]))
        .unwrap_err();
    assert_eq!(err, EngineError::NotFound("User not found carol".to_string()));
    std::fs::remove_dir_all(root).unwrap();
}

#[test]
fn ratio_width_must_match_users() {
    let (store, root) = store_with_dir();
    closed_group(&store);

    let mut session = store.open(&group()).unwrap();
    let err = session
        .add_cost(cost(10.0, None, "A", vec![1.0, 1.0, 1.0]))
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));

    let err = session
        .add_cost(cost(10.0, None, "A", vec![0.0, 0.0]))
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::Validation("There must be at least one non-zero value in ratios".to_string())
    );
    std::fs::remove_dir_all(root).unwrap();
}

#[test]
fn equal_split_balances_two_users() {
    let (store, root) = store_with_dir();
    closed_group(&store);

    let mut session = store.open(&group()).unwrap();
    session
        .add_cost(cost(100.0, Some("dinner"), "alice", vec![1.0, 1.0]))
        .unwrap();

    let balances = session.balances().unwrap();
    assert_eq!(balances.saldi(), vec![50.0, -50.0]);
    std::fs::remove_dir_all(root).unwrap();
}

#[test]
fn balances_sum_to_zero() {
    let (store, root) = store_with_dir();
    let mut session = store.open(&group()).unwrap();
    for (name, identity) in [("alice", "A"), ("bob", "B"), ("carol", "C")] {
        session.add_user(name, identity).unwrap();
    }
    session.close_users().unwrap();

    session
        .add_cost(cost(60.0, Some("taxi"), "bob", vec![1.0, 2.0, 0.0]))
        .unwrap();
    session
        .add_cost(cost(33.33, None, "C", vec![1.0, 1.0, 1.0]))
        .unwrap();
    session
        .add_cost(cost(7.1, Some("coffee"), "A", vec![0.5, 0.0, 3.0]))
        .unwrap();

    let balances = session.balances().unwrap();
    let total: f64 = balances.saldi().iter().sum();
    assert!(total.abs() < 1e-9, "saldi sum to {total}");
    session.commit().unwrap();
    std::fs::remove_dir_all(root).unwrap();
}

#[test]
fn entries_survive_reopen_and_export() {
    let (store, root) = store_with_dir();
    closed_group(&store);

    {
        let mut session = store.open(&group()).unwrap();
        session
            .add_cost(cost(60.0, Some("taxi"), "bob", vec![1.0, 2.0]))
            .unwrap();
        // No registry change: the ledger row alone must be on disk.
        assert!(!session.is_dirty());
    }

    let session = store.open(&group()).unwrap();
    let entries: Vec<_> = session
        .ledger()
        .entries()
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].payer, "B");
    assert_eq!(entries[0].note.as_deref(), Some("taxi"));

    let path = session.export(ExportZone::from_name("UTC").unwrap()).unwrap();
    let exported = std::fs::read_to_string(&path).unwrap();
    assert_eq!(
        exported,
        "date,amount,note,payer,alice,bob\n2023-11-14T22:13:20.000,60,taxi,bob,1,2\n"
    );
    std::fs::remove_dir_all(root).unwrap();
}

#[test]
fn status_and_export_need_positions() {
    let (store, root) = store_with_dir();
    let mut session = store.open(&group()).unwrap();
    session.add_user("alice", "A").unwrap();

    assert!(matches!(session.balances(), Err(EngineError::State(_))));
    assert!(matches!(
        session.export(ExportZone::Local),
        Err(EngineError::State(_))
    ));
    assert!(!store.export_path(&group()).exists());
    session.commit().unwrap();
    std::fs::remove_dir_all(root).unwrap();
}

#[test]
fn corrupt_ledger_rows_abort_balances() {
    let (store, root) = store_with_dir();
    closed_group(&store);
    std::fs::write(store.amounts_path(&group()), "1,not-a-number,,A,1,1\n").unwrap();

    let session = store.open(&group()).unwrap();
    let err = session.balances().unwrap_err();
    assert!(!err.is_user_error());
    std::fs::remove_dir_all(root).unwrap();
}

#[test]
fn failed_export_leaves_no_file_behind() {
    let (store, root) = store_with_dir();
    closed_group(&store);
    std::fs::write(store.amounts_path(&group()), "1,10,x,A,1,1\n2,5,y,ZZ,1,1\n").unwrap();

    let session = store.open(&group()).unwrap();
    let err = session.export(ExportZone::Local).unwrap_err();
    assert_eq!(err, EngineError::CorruptLedger("unknown payer ZZ".to_string()));
    assert!(!store.export_path(&group()).exists());
    std::fs::remove_dir_all(root).unwrap();
}
