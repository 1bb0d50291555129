use weather_store::{default_config_template, ConfigError, SystemConfig, SystemConfigLoader};

#[test]
fn config_loader_accepts_valid_keys() {
    let input = r#"
[storage]
dsn = "sled://data/weather"
database = "Campus"
[telemetry]
precipitation_window_months = 3
null_temperature = "zero"
[bootstrap]
seed_admin = false
"#;
    let config = SystemConfigLoader::from_str(input).expect("config");
    assert_eq!(config.get_string("storage.dsn"), "sled://data/weather");
    assert_eq!(config.get_string("storage.database"), "Campus");
    assert_eq!(config.get_number("telemetry.precipitation_window_months"), 3);
    assert_eq!(config.get_string("telemetry.null_temperature"), "zero");
    assert!(!config.get_bool("bootstrap.seed_admin"));
}

#[test]
fn missing_keys_fall_back_to_defaults() {
    let config = SystemConfigLoader::from_str("").expect("config");
    assert_eq!(config.get_string("storage.sqlite_path"), "weather.sqlite");
    assert_eq!(config.get_string("storage.database"), "WeatherAPI");
    assert_eq!(config.get_string("security.api_key_header"), "apiKey");
    assert_eq!(config.get_number("telemetry.precipitation_window_months"), 5);
    assert!(config.get_bool("bootstrap.seed_admin"));
}

#[test]
fn config_loader_rejects_unknown_key() {
    let input = r#"
unknown = { value = "x" }
"#;
    let err = SystemConfigLoader::from_str(input).expect_err("error");
    match err {
        ConfigError::UnknownKey(key) => assert_eq!(key, "unknown.value"),
        _ => panic!("expected unknown key error"),
    }
}

#[test]
fn config_loader_rejects_type_mismatch() {
    let input = r#"
telemetry = { precipitation_window_months = "five" }
"#;
    let err = SystemConfigLoader::from_str(input).expect_err("error");
    match err {
        ConfigError::TypeMismatch(key, expected) => {
            assert_eq!(key, "telemetry.precipitation_window_months");
            assert_eq!(expected, "number");
        }
        _ => panic!("expected type mismatch error"),
    }
}

#[test]
fn set_rejects_unknown_key() {
    let mut config = SystemConfig::default();
    config.set("storage.dsn", "memory://").expect("known key");
    assert_eq!(config.get_string("storage.dsn"), "memory://");
    assert!(matches!(
        config.set("storage.nope", "x"),
        Err(ConfigError::UnknownKey(_))
    ));
}

#[test]
fn default_template_parses_back() {
    let template = default_config_template();
    let config = SystemConfigLoader::from_str(&template).expect("template parses");
    assert_eq!(config.get_string("storage.sqlite_path"), "weather.sqlite");
    assert_eq!(config.get_string("telemetry.null_temperature"), "omit");
    assert!(config.keys().contains(&"bootstrap.admin_email".to_string()));
}
