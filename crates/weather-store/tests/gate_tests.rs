use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use http::header::{HeaderName, HeaderValue};
use http::HeaderMap;
use serde_json::json;
use weather_store::{
    AccessError, AccessGate, Account, AccountStore, ConfigError, Database, Filter, ManualClock,
    NewAccount, Role, Update, DEFAULT_API_KEY_HEADER,
};

struct Fixture {
    database: Database,
    accounts: AccountStore,
    gate: AccessGate,
    clock: Arc<ManualClock>,
}

fn fixture() -> Fixture {
    let clock = ManualClock::shared(Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap());
    let database = Database::in_memory("WeatherAPI");
    let accounts = AccountStore::new(&database, clock.clone());
    let gate = AccessGate::new(accounts.clone(), DEFAULT_API_KEY_HEADER).expect("gate");
    Fixture {
        database,
        accounts,
        gate,
        clock,
    }
}

fn account(fixture: &Fixture, role: Role) -> Account {
    fixture
        .accounts
        .create_account(NewAccount {
            name: "Sensor 7".to_string(),
            email: format!("{}@example.edu", role.as_str().to_lowercase()),
            role,
        })
        .expect("account")
}

fn headers(value: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        HeaderName::from_bytes(b"apiKey").expect("name"),
        HeaderValue::from_str(value).expect("header"),
    );
    headers
}

#[test]
fn allowed_role_passes_and_excluded_role_is_rejected() {
    let fixture = fixture();
    let student = account(&fixture, Role::Student);

    let authorized = fixture
        .gate
        .authorize(&headers(&student.api_key), &[Role::Teacher, Role::Student])
        .expect("authorized");
    assert_eq!(authorized.id, student.id);

    let err = fixture
        .gate
        .authorize(&headers(&student.api_key), &[Role::Teacher, Role::Sensor])
        .expect_err("denied");
    assert!(matches!(err, AccessError::InsufficientRole));
}

#[test]
fn roles_are_not_ordered() {
    let fixture = fixture();
    let teacher = account(&fixture, Role::Teacher);
    let err = fixture
        .gate
        .authorize(&headers(&teacher.api_key), &[Role::Sensor])
        .expect_err("teacher is not a sensor");
    assert!(err.is_rejection());
}

#[test]
fn missing_header_is_missing_credential_for_any_role_set() {
    let fixture = fixture();
    for required in [&[Role::Teacher][..], &Role::ALL[..], &[][..]] {
        let err = fixture
            .gate
            .authorize(&HeaderMap::new(), required)
            .expect_err("missing");
        assert!(matches!(err, AccessError::MissingCredential));
    }
    let err = fixture
        .gate
        .authorize(&headers("{}"), &Role::ALL)
        .expect_err("empty after stripping");
    assert!(matches!(err, AccessError::MissingCredential));
}

#[test]
fn unknown_key_is_invalid_credential() {
    let fixture = fixture();
    let err = fixture
        .gate
        .authorize(&headers("not-a-key"), &Role::ALL)
        .expect_err("unknown");
    assert!(matches!(err, AccessError::InvalidCredential));
    assert_eq!(err.to_string(), AccessError::InsufficientRole.to_string());
}

#[test]
fn decorated_key_is_accepted() {
    let fixture = fixture();
    let sensor = account(&fixture, Role::Sensor);
    let decorated = format!("{{{}}}", sensor.api_key);
    fixture
        .gate
        .authorize(&headers(&decorated), &[Role::Sensor])
        .expect("braces stripped");
}

#[test]
fn last_access_moves_forward_only_on_success() {
    let fixture = fixture();
    let student = account(&fixture, Role::Student);
    let created = student.last_access;

    fixture.clock.advance(Duration::minutes(5));
    fixture
        .gate
        .authorize(&headers(&student.api_key), &[Role::Teacher])
        .expect_err("denied");
    let after_denial = fixture.accounts.find_by_key(&student.api_key).expect("find");
    assert_eq!(after_denial.last_access, created);

    fixture
        .gate
        .authorize(&headers(&student.api_key), &[Role::Student])
        .expect("allowed");
    let first = fixture.accounts.find_by_key(&student.api_key).expect("find");
    assert_eq!(first.last_access, created + Duration::minutes(5));

    fixture.clock.set(created);
    fixture
        .gate
        .authorize(&headers(&student.api_key), &[Role::Student])
        .expect("allowed");
    let second = fixture.accounts.find_by_key(&student.api_key).expect("find");
    assert!(second.last_access >= first.last_access);
}

#[test]
fn header_lookup_is_case_insensitive() {
    let fixture = fixture();
    let teacher = account(&fixture, Role::Teacher);
    let mut map = HeaderMap::new();
    map.insert(
        HeaderName::from_bytes(b"APIKEY").expect("name"),
        HeaderValue::from_str(&teacher.api_key).expect("header"),
    );
    fixture
        .gate
        .authorize(&map, &[Role::Teacher])
        .expect("header names are case-insensitive");
}

#[test]
fn unrecognized_stored_role_is_rejected() {
    let fixture = fixture();
    let sensor = account(&fixture, Role::Sensor);
    fixture
        .database
        .collection("ApiUsers")
        .update_one(
            &Filter::eq("ApiKey", json!(sensor.api_key)),
            &Update::new().set("Role", json!("ADMIN")),
        )
        .expect("rewrite role");

    let err = fixture
        .gate
        .authorize(&headers(&sensor.api_key), &Role::ALL)
        .expect_err("unknown role");
    assert!(matches!(err, AccessError::InsufficientRole));
    assert_eq!(
        err.to_string(),
        "The provided API Key is invalid or does not have the required permissions!"
    );
}

#[test]
fn invalid_header_name_is_a_config_error() {
    let fixture = fixture();
    let err = AccessGate::new(fixture.accounts.clone(), "api key").err().expect("rejected");
    assert!(matches!(err, ConfigError::TypeMismatch(key, _) if key == "security.api_key_header"));
}
