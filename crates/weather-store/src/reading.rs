use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::timestamp;
use crate::document::ObjectId;

pub const READINGS_COLLECTION: &str = "WeatherDB";

pub const FIELD_DEVICE_NAME: &str = "Device Name";
pub const FIELD_PRECIPITATION: &str = "Precipitation mm/h";
pub const FIELD_TIME: &str = "Time";
pub const FIELD_LATITUDE: &str = "Latitude";
pub const FIELD_LONGITUDE: &str = "Longitude";
pub const FIELD_TEMPERATURE: &str = "Temperature (°C)";
pub const FIELD_ATMOSPHERIC: &str = "Atmospheric Pressure (kPa)";
pub const FIELD_MAX_WIND: &str = "Max Wind Speed (m/s)";
pub const FIELD_SOLAR: &str = "Solar Radiation (W/m2)";
pub const FIELD_VAPOR: &str = "Vapor Pressure (kPa)";
pub const FIELD_HUMIDITY: &str = "Humidity (%)";
pub const FIELD_WIND_DIRECTION: &str = "Wind Direction (°)";

/// Caller-supplied part of a reading. The timestamp is never taken from
/// the caller.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ReadingInput {
    #[serde(rename = "Device Name")]
    pub device_name: String,
    #[serde(rename = "Precipitation mm/h")]
    pub precipitation: f64,
    #[serde(rename = "Latitude", default)]
    pub latitude: f64,
    #[serde(rename = "Longitude", default)]
    pub longitude: f64,
    #[serde(flatten)]
    pub measurements: Measurements,
}

/// Optional measurements; `None` means the sensor did not report the value,
/// which is different from a reported zero.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Measurements {
    #[serde(rename = "Temperature (°C)", default)]
    pub temperature: Option<f64>,
    #[serde(rename = "Atmospheric Pressure (kPa)", default)]
    pub atmospheric_pressure: Option<f64>,
    #[serde(rename = "Max Wind Speed (m/s)", default)]
    pub max_wind_speed: Option<f64>,
    #[serde(rename = "Solar Radiation (W/m2)", default)]
    pub solar_radiation: Option<f64>,
    #[serde(rename = "Vapor Pressure (kPa)", default)]
    pub vapor_pressure: Option<f64>,
    #[serde(rename = "Humidity (%)", default)]
    pub humidity: Option<f64>,
    #[serde(rename = "Wind Direction (°)", default)]
    pub wind_direction: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    #[serde(rename = "Device Name")]
    pub device_name: String,
    #[serde(rename = "Precipitation mm/h")]
    pub precipitation: f64,
    #[serde(rename = "Time", with = "timestamp")]
    pub time: DateTime<Utc>,
    #[serde(rename = "Latitude", default)]
    pub latitude: f64,
    #[serde(rename = "Longitude", default)]
    pub longitude: f64,
    #[serde(flatten)]
    pub measurements: Measurements,
}

impl Reading {
    pub fn stamped(input: ReadingInput, time: DateTime<Utc>) -> Self {
        Self {
            id: ObjectId::new(),
            device_name: input.device_name,
            precipitation: input.precipitation,
            time,
            latitude: input.latitude,
            longitude: input.longitude,
            measurements: input.measurements,
        }
    }

    pub fn temperature(&self) -> Option<f64> {
        self.measurements.temperature
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PrecipitationSummary {
    #[serde(rename = "Device Name")]
    pub device_name: String,
    #[serde(rename = "Time", with = "timestamp")]
    pub time: DateTime<Utc>,
    #[serde(rename = "Precipitation mm/h")]
    pub precipitation: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TemperatureSummary {
    #[serde(rename = "Device Name")]
    pub device_name: String,
    #[serde(rename = "Time", with = "timestamp")]
    pub time: DateTime<Utc>,
    #[serde(rename = "Temperature (°C)")]
    pub temperature: f64,
}

/// Headline values of one reading, returned by exact device/time lookups.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReadingSnapshot {
    #[serde(rename = "Precipitation mm/h")]
    pub precipitation: Option<f64>,
    #[serde(rename = "Temperature (°C)")]
    pub temperature: Option<f64>,
    #[serde(rename = "Atmospheric Pressure (kPa)")]
    pub atmospheric_pressure: Option<f64>,
    #[serde(rename = "Solar Radiation (W/m2)")]
    pub solar_radiation: Option<f64>,
}

impl From<&Reading> for ReadingSnapshot {
    fn from(reading: &Reading) -> Self {
        Self {
            precipitation: Some(reading.precipitation),
            temperature: reading.measurements.temperature,
            atmospheric_pressure: reading.measurements.atmospheric_pressure,
            solar_radiation: reading.measurements.solar_radiation,
        }
    }
}

/// Every field of a reading except its identifier.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReadingPresentation {
    #[serde(rename = "Device Name")]
    pub device_name: String,
    #[serde(rename = "Precipitation mm/h")]
    pub precipitation: f64,
    #[serde(rename = "Time", with = "timestamp")]
    pub time: DateTime<Utc>,
    #[serde(rename = "Latitude")]
    pub latitude: f64,
    #[serde(rename = "Longitude")]
    pub longitude: f64,
    #[serde(flatten)]
    pub measurements: Measurements,
}

impl From<Reading> for ReadingPresentation {
    fn from(reading: Reading) -> Self {
        Self {
            device_name: reading.device_name,
            precipitation: reading.precipitation,
            time: reading.time,
            latitude: reading.latitude,
            longitude: reading.longitude,
            measurements: reading.measurements,
        }
    }
}
