#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ValueKind {
    String,
    Number,
    Boolean,
}

impl ValueKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ValueKind::String => "string",
            ValueKind::Number => "number",
            ValueKind::Boolean => "boolean",
        }
    }
}

#[derive(Clone, Debug)]
pub struct StaticConfigItem {
    pub key: &'static str,
    pub description: &'static str,
    pub kind: ValueKind,
    pub default_value: &'static str,
}

pub static STATIC_CONFIG_TABLE: &[StaticConfigItem] = &[
    StaticConfigItem {
        key: "storage.dsn",
        description: "Document store location: empty, sqlite://<path>, sled://<path> or memory://",
        kind: ValueKind::String,
        default_value: "",
    },
    StaticConfigItem {
        key: "storage.sqlite_path",
        description: "SQLite database path (used when storage.dsn is empty)",
        kind: ValueKind::String,
        default_value: "weather.sqlite",
    },
    StaticConfigItem {
        key: "storage.database",
        description: "Database name prefixed to every collection",
        kind: ValueKind::String,
        default_value: "WeatherAPI",
    },
    StaticConfigItem {
        key: "security.api_key_header",
        description: "Request header carrying the account access key",
        kind: ValueKind::String,
        default_value: "apiKey",
    },
    StaticConfigItem {
        key: "telemetry.precipitation_window_months",
        description: "Trailing window, in calendar months, for max precipitation lookups",
        kind: ValueKind::Number,
        default_value: "5",
    },
    StaticConfigItem {
        key: "telemetry.null_temperature",
        description: "Devices without any temperature in a max-temperature range: omit | zero",
        kind: ValueKind::String,
        default_value: "omit",
    },
    StaticConfigItem {
        key: "bootstrap.seed_admin",
        description: "Create a TEACHER account on first start when no account exists",
        kind: ValueKind::Boolean,
        default_value: "true",
    },
    StaticConfigItem {
        key: "bootstrap.admin_name",
        description: "Display name of the seeded account",
        kind: ValueKind::String,
        default_value: "Administrator",
    },
    StaticConfigItem {
        key: "bootstrap.admin_email",
        description: "Email of the seeded account",
        kind: ValueKind::String,
        default_value: "admin@localhost",
    },
];
