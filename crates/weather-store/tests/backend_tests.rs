use std::sync::Arc;

use serde_json::{json, Value};
use weather_store::{
    Backend, ConnectionProvider, Database, DocumentStore, Filter, InMemoryDocumentStore, Pattern,
    RepositoryError, Scope, SledDocumentStore, SqliteDocumentStore, SystemConfig, Update,
};

fn document(value: Value) -> weather_store::Document {
    match value {
        Value::Object(map) => map,
        _ => panic!("expected object"),
    }
}

fn exercise(store: Arc<dyn DocumentStore>) {
    let database = Database::new("WeatherAPI", store);
    let readings = database.collection("WeatherDB");
    assert_eq!(readings.name(), "WeatherAPI.WeatherDB");

    readings
        .insert_many(vec![
            document(json!({"Device Name": "A", "Precipitation mm/h": 1.5, "Time": "2024-01-01T00:00:00.000000Z"})),
            document(json!({"Device Name": "B", "Precipitation mm/h": 3, "Time": "2024-01-02T00:00:00.000000Z"})),
            document(json!({"Device Name": "A", "Precipitation mm/h": 0.0, "Time": "2024-01-03T00:00:00.000000Z"})),
        ])
        .expect("insert");
    readings.insert_many(Vec::new()).expect("empty insert is a no-op");

    let by_device = Filter::eq("Device Name", json!("A"));
    let found = readings.find(&by_device).expect("find");
    assert_eq!(found.len(), 2);
    assert_eq!(found[0]["Precipitation mm/h"], json!(1.5));

    let window = Filter::between(
        "Time",
        json!("2024-01-02T00:00:00.000000Z"),
        json!("2024-01-03T00:00:00.000000Z"),
    );
    assert_eq!(readings.count(&window).expect("count"), 2);

    let numeric = Filter::gte("Precipitation mm/h", json!(2.0));
    let first = readings.find_one(&numeric).expect("find one").expect("present");
    assert_eq!(first["Device Name"], json!("B"));

    let rename = Update::new().set("Device Name", json!("C"));
    assert_eq!(readings.update_one(&by_device, &rename).expect("update one"), 1);
    let names: Vec<Value> = readings
        .find(&Filter::Empty)
        .expect("all")
        .into_iter()
        .map(|doc| doc["Device Name"].clone())
        .collect();
    assert_eq!(names, vec![json!("C"), json!("B"), json!("A")]);

    let pattern = Pattern::literal("c", true).expect("pattern");
    assert_eq!(
        readings
            .find(&Filter::matches("Device Name", pattern))
            .expect("matches")
            .len(),
        1
    );

    assert_eq!(readings.delete_many(&window).expect("delete"), 2);
    assert_eq!(readings.count(&Filter::Empty).expect("count"), 1);

    let other = database.collection("ApiUsers");
    assert_eq!(other.count(&Filter::Empty).expect("isolated"), 0);

    let by_email = Filter::eq("Email", json!("ada@example.edu"));
    assert!(other
        .insert_unless(&by_email, document(json!({"Email": "ada@example.edu"})))
        .expect("first guarded insert"));
    assert!(!other
        .insert_unless(&by_email, document(json!({"Email": "ada@example.edu"})))
        .expect("second guarded insert"));
    assert_eq!(other.count(&Filter::Empty).expect("count"), 1);
}

#[test]
fn in_memory_store_contract() {
    exercise(InMemoryDocumentStore::shared());
}

#[test]
fn sqlite_store_contract() {
    let store = SqliteDocumentStore::open(":memory:").expect("open");
    store.ensure_schema().expect("schema");
    exercise(Arc::new(store));
}

#[test]
fn sled_store_contract() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("weather");
    let store = SledDocumentStore::open(path.to_str().expect("utf8")).expect("open");
    exercise(Arc::new(store));
}

#[test]
fn sqlite_store_persists_across_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("weather.sqlite");
    let path = path.to_str().expect("utf8");
    {
        let store = SqliteDocumentStore::open(path).expect("open");
        store.ensure_schema().expect("schema");
        store
            .insert("WeatherAPI.WeatherDB", vec![document(json!({"Device Name": "A"}))])
            .expect("insert");
    }
    let store = SqliteDocumentStore::open(path).expect("reopen");
    store.ensure_schema().expect("schema");
    let found = store
        .find("WeatherAPI.WeatherDB", &Filter::Empty)
        .expect("find");
    assert_eq!(found.len(), 1);
    assert_eq!(
        store
            .delete("WeatherAPI.WeatherDB", &Filter::Empty, Scope::One)
            .expect("delete"),
        1
    );
}

#[test]
fn connection_provider_follows_dsn() {
    let dir = tempfile::tempdir().expect("tempdir");

    let mut config = SystemConfig::default();
    config.set("storage.dsn", "memory://").expect("dsn");
    let provider = ConnectionProvider::from_config(&config).expect("memory");
    assert_eq!(provider.backend(), &Backend::Memory);
    assert_eq!(provider.database_handle().name(), "WeatherAPI");

    let sqlite_path = dir.path().join("w.sqlite");
    let mut config = SystemConfig::default();
    config
        .set("storage.dsn", format!("sqlite://{}", sqlite_path.display()))
        .expect("dsn");
    config.set("storage.database", "Campus").expect("database");
    let provider = ConnectionProvider::from_config(&config).expect("sqlite");
    assert!(matches!(provider.backend(), Backend::Sqlite(_)));
    assert_eq!(provider.database_handle().name(), "Campus");
    assert!(sqlite_path.exists());

    let mut config = SystemConfig::default();
    config.set("storage.dsn", "postgres://localhost/weather").expect("dsn");
    assert!(matches!(
        ConnectionProvider::from_config(&config),
        Err(RepositoryError::Store(_))
    ));
}

#[test]
fn database_handles_share_one_store() {
    let mut config = SystemConfig::default();
    config.set("storage.dsn", "memory://").expect("dsn");
    let provider = ConnectionProvider::from_config(&config).expect("memory");

    provider
        .database_handle()
        .collection("WeatherDB")
        .insert_one(document(json!({"Device Name": "A"})))
        .expect("insert");
    let count = provider
        .database_handle()
        .collection("WeatherDB")
        .count(&Filter::Empty)
        .expect("count");
    assert_eq!(count, 1);
}
