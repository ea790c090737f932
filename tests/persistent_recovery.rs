//! Recovery tests for the durable store.
//!
//! These tests verify that platform state survives:
//! - a clean reopen (WAL replay)
//! - a torn final WAL record (simulated crash mid-write)
//! - compaction into a snapshot followed by more writes

#![cfg(feature = "persistent")]

use std::fs;
use std::sync::Arc;

use coachdesk::storage::open_database;
use coachdesk::{LinkStatus, Platform, SweepPolicy, SystemClock, DEMO_PASSWORD};
use tempfile::tempdir;

fn platform_at(path: &std::path::Path) -> (coachdesk::storage::PersistentStores, Platform) {
    let db = open_database(path, None).unwrap();
    let platform = Platform::new(db.stores(), Arc::new(SystemClock), SweepPolicy::default());
    (db, platform)
}

#[test]
fn test_seeded_state_survives_reopen() {
    let dir = tempdir().unwrap();
    {
        let (_db, platform) = platform_at(dir.path());
        platform.seed_demo_data().unwrap();
    }

    let (_db, platform) = platform_at(dir.path());
    assert_eq!(platform.list_users().unwrap().len(), 6);
    assert_eq!(platform.list_exercises().unwrap().len(), 5);
    let student = platform.get_user_by_username("student").unwrap().unwrap();
    assert_eq!(
        platform
            .links_for_student(student.id, &[LinkStatus::Pending])
            .unwrap()
            .len(),
        3
    );
    let coach = platform.get_user_by_username("coach1").unwrap().unwrap();
    assert!(!platform.inbox(coach.id).unwrap().is_empty());
    platform.authenticate("coach1", DEMO_PASSWORD).unwrap();

    // Seeding a recovered database adds nothing.
    let report = platform.seed_demo_data().unwrap();
    assert_eq!(report.exercises, 0);
    assert!(report.users.is_empty());
}

#[test]
fn test_torn_tail_loses_only_last_write() {
    let dir = tempdir().unwrap();
    let wal_path = dir.path().join("coachdesk.wal");
    let link_id;
    {
        let (_db, platform) = platform_at(dir.path());
        platform.seed_demo_data().unwrap();
        let coach = platform.get_user_by_username("coach1").unwrap().unwrap();
        let link = platform
            .links_for_professional(coach.id, &[])
            .unwrap()
            .remove(0);
        link_id = link.id;
        let size_before = fs::metadata(&wal_path).unwrap().len();
        platform.accept_link(link.id, coach.id).unwrap();
        assert!(fs::metadata(&wal_path).unwrap().len() > size_before);
    }

    // Chop a few bytes off the final record, as if the process died
    // while writing it.
    {
        let file = fs::OpenOptions::new().write(true).open(&wal_path).unwrap();
        let size = file.metadata().unwrap().len();
        file.set_len(size - 3).unwrap();
    }

    let (db, platform) = platform_at(dir.path());
    assert_eq!(platform.list_users().unwrap().len(), 6);
    // The link itself was written long before the torn record.
    assert!(platform.get_link(link_id).unwrap().is_some());

    // The store accepts new writes after recovery.
    let coach = platform.get_user_by_username("coach1").unwrap().unwrap();
    platform.remove_link(link_id, coach.id).unwrap();
    drop(platform);
    drop(db);

    let (_db, platform) = platform_at(dir.path());
    assert!(platform.get_link(link_id).unwrap().is_none());
}

#[test]
fn test_compaction_keeps_everything() {
    let dir = tempdir().unwrap();
    {
        let (db, platform) = platform_at(dir.path());
        platform.seed_demo_data().unwrap();
        let before = db.wal_size();
        let result = db.compact().unwrap();
        assert!(result.records > 0);
        assert!(result.wal_size_after < before);
        assert!(result.snapshot_path.exists());

        let student = platform.get_user_by_username("student").unwrap().unwrap();
        platform.request_deactivation(student.id).unwrap();
    }

    let (_db, platform) = platform_at(dir.path());
    assert_eq!(platform.list_users().unwrap().len(), 6);
    let student = platform.get_user_by_username("student").unwrap().unwrap();
    assert!(!student.active);
    assert!(platform
        .stores()
        .schedules
        .get_schedule(student.id)
        .unwrap()
        .is_some());
}

#[test]
fn test_database_is_single_process() {
    let dir = tempdir().unwrap();
    let (_db, _platform) = platform_at(dir.path());
    let err = open_database(dir.path(), None).unwrap_err();
    assert!(err.is_execution());
}
