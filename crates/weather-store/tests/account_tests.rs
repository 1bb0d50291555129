use std::sync::{Arc, Barrier};
use std::thread;

use chrono::{Duration, TimeZone, Utc};
use weather_store::{
    AccountStore, Clock, Database, ManualClock, NewAccount, Role, StoreError, TimeRange,
};

fn store() -> (AccountStore, Arc<ManualClock>) {
    let clock = ManualClock::shared(Utc.with_ymd_and_hms(2024, 1, 10, 8, 0, 0).unwrap());
    let database = Database::in_memory("WeatherAPI");
    (AccountStore::new(&database, clock.clone()), clock)
}

fn request(email: &str, role: Role) -> NewAccount {
    NewAccount {
        name: "Ada".to_string(),
        email: email.to_string(),
        role,
    }
}

#[test]
fn duplicate_email_is_rejected_and_keys_differ() {
    let (accounts, _) = store();
    let first = accounts
        .create_account(request("ada@example.edu", Role::Student))
        .expect("first");
    let err = accounts
        .create_account(request("ada@example.edu", Role::Teacher))
        .expect_err("duplicate");
    assert!(matches!(err, StoreError::DuplicateEmail));

    let second = accounts
        .create_account(request("grace@example.edu", Role::Student))
        .expect("second");
    assert_ne!(first.api_key, second.api_key);
    assert_eq!(accounts.count().expect("count"), 2);
}

#[test]
fn created_account_is_stamped_and_found_by_key() {
    let (accounts, clock) = store();
    let account = accounts
        .create_account(request("ada@example.edu", Role::Sensor))
        .expect("create");
    assert_eq!(account.created, clock.now());
    assert_eq!(account.created, account.last_access);

    let found = accounts.find_by_key(&account.api_key).expect("by key");
    assert_eq!(found, account);
    let by_id = accounts.find_by_id(&account.id.to_hex()).expect("by id");
    assert_eq!(by_id.email, "ada@example.edu");
    assert!(accounts.find_by_key("missing").unwrap_err().is_not_found());
}

#[test]
fn update_last_access_ignores_unknown_key() {
    let (accounts, _) = store();
    accounts
        .update_last_access("00000000-0000-0000-0000-000000000000")
        .expect("no-op");
}

#[test]
fn delete_by_id_reports_removal() {
    let (accounts, _) = store();
    let account = accounts
        .create_account(request("ada@example.edu", Role::Student))
        .expect("create");
    let id = account.id.to_hex();
    assert!(accounts.delete_by_id(&id).expect("delete"));
    assert!(!accounts.delete_by_id(&id).expect("second delete"));
    assert!(matches!(
        accounts.delete_by_id("not-an-id"),
        Err(StoreError::InvalidIdentifier(_))
    ));
}

#[test]
fn range_delete_matches_role_and_inclusive_bounds() {
    let (accounts, clock) = store();
    let start = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
    let end = Utc.with_ymd_and_hms(2024, 2, 29, 0, 0, 0).unwrap();

    clock.set(start - Duration::seconds(1));
    accounts
        .create_account(request("before@example.edu", Role::Student))
        .expect("before");
    clock.set(start);
    accounts
        .create_account(request("at-start@example.edu", Role::Student))
        .expect("at start");
    clock.set(end);
    accounts
        .create_account(request("at-end@example.edu", Role::Student))
        .expect("at end");
    accounts
        .create_account(request("teacher@example.edu", Role::Teacher))
        .expect("teacher");

    let removed = accounts
        .delete_by_role_and_last_access_range(Role::Student, &TimeRange::inclusive(start, end))
        .expect("delete");
    assert_eq!(removed, 2);
    assert_eq!(accounts.count().expect("count"), 2);
}

#[test]
fn role_update_covers_creation_range() {
    let (accounts, clock) = store();
    let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
    let end = start + Duration::days(7);

    clock.set(start + Duration::days(1));
    let inside = accounts
        .create_account(request("inside@example.edu", Role::Student))
        .expect("inside");
    clock.set(end + Duration::days(1));
    let outside = accounts
        .create_account(request("outside@example.edu", Role::Student))
        .expect("outside");

    let updated = accounts
        .update_role_by_creation_range(
            &TimeRange::ordered(start, end).expect("range"),
            Role::Sensor,
        )
        .expect("update");
    assert_eq!(updated, 1);
    assert_eq!(
        accounts.find_by_key(&inside.api_key).expect("inside").role,
        Role::Sensor
    );
    assert_eq!(
        accounts.find_by_key(&outside.api_key).expect("outside").role,
        Role::Student
    );
}

#[test]
fn role_parsing_normalizes_case() {
    assert_eq!("teacher".parse::<Role>().expect("role"), Role::Teacher);
    assert_eq!(" Sensor ".parse::<Role>().expect("role"), Role::Sensor);
    assert!("ADMIN".parse::<Role>().is_err());
}

#[test]
fn concurrent_creations_keep_email_unique() {
    for _ in 0..50 {
        let (accounts, _) = store();
        let barrier = Arc::new(Barrier::new(8));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let accounts = accounts.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    accounts.create_account(request("same@example.edu", Role::Student))
                })
            })
            .collect();

        let mut created = 0;
        for handle in handles {
            match handle.join().expect("join") {
                Ok(_) => created += 1,
                Err(StoreError::DuplicateEmail) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(created, 1);
        assert_eq!(accounts.count().expect("count"), 1);
    }
}
