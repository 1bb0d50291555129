use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Months, Utc};
use serde_json::Value;
use tracing::{debug, info};

use crate::clock::{timestamp_value, Clock};
use crate::config::{ConfigError, SystemConfig};
use crate::document::{from_document, id_value, to_document, ObjectId, ID_FIELD};
use crate::error::StoreError;
use crate::query::{Filter, Pattern, Update};
use crate::range::TimeRange;
use crate::reading::{
    PrecipitationSummary, Reading, ReadingInput, ReadingPresentation, ReadingSnapshot,
    TemperatureSummary, FIELD_ATMOSPHERIC, FIELD_DEVICE_NAME, FIELD_HUMIDITY, FIELD_LATITUDE,
    FIELD_LONGITUDE, FIELD_MAX_WIND, FIELD_PRECIPITATION, FIELD_SOLAR, FIELD_TEMPERATURE,
    FIELD_TIME, FIELD_VAPOR, FIELD_WIND_DIRECTION, READINGS_COLLECTION,
};
use crate::repository::{Collection, Database, RepositoryError};

/// What a max-temperature aggregation reports for a device whose readings
/// in range carry no temperature at all.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum NullTemperature {
    #[default]
    Omit,
    Zero,
}

impl FromStr for NullTemperature {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_lowercase().as_str() {
            "omit" | "" => Ok(NullTemperature::Omit),
            "zero" => Ok(NullTemperature::Zero),
            other => Err(format!("unknown null temperature policy: {other}")),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TelemetryOptions {
    pub precipitation_window_months: u32,
    pub null_temperature: NullTemperature,
}

impl Default for TelemetryOptions {
    fn default() -> Self {
        Self {
            precipitation_window_months: 5,
            null_temperature: NullTemperature::Omit,
        }
    }
}

impl TelemetryOptions {
    pub fn from_config(config: &SystemConfig) -> Result<Self, ConfigError> {
        let months = config.get_number("telemetry.precipitation_window_months");
        let null_temperature = config
            .get_string("telemetry.null_temperature")
            .parse::<NullTemperature>()
            .map_err(|_| {
                ConfigError::TypeMismatch(
                    "telemetry.null_temperature".to_string(),
                    "omit|zero".to_string(),
                )
            })?;
        Ok(Self {
            precipitation_window_months: months.clamp(0, i64::from(u32::MAX)) as u32,
            null_temperature,
        })
    }
}

/// Reading persistence and aggregation over the `WeatherDB` collection.
/// Timestamps always come from the store's clock.
#[derive(Clone)]
pub struct TelemetryStore {
    readings: Collection,
    clock: Arc<dyn Clock>,
    options: TelemetryOptions,
}

impl TelemetryStore {
    pub fn new(database: &Database, clock: Arc<dyn Clock>, options: TelemetryOptions) -> Self {
        Self {
            readings: database.collection(READINGS_COLLECTION),
            clock,
            options,
        }
    }

    pub fn insert_one(&self, input: ReadingInput) -> Result<Reading, StoreError> {
        check_finite(&input)?;
        let reading = Reading::stamped(input, self.clock.now());
        self.readings.insert_one(to_document(&reading)?)?;
        debug!(reading_id = %reading.id, device = %reading.device_name, "reading stored");
        Ok(reading)
    }

    pub fn insert_many(&self, inputs: Vec<ReadingInput>) -> Result<Vec<Reading>, StoreError> {
        if inputs.is_empty() {
            return Err(StoreError::EmptyBatch);
        }
        for input in &inputs {
            check_finite(input)?;
        }
        let now = self.clock.now();
        let readings: Vec<Reading> = inputs
            .into_iter()
            .map(|input| Reading::stamped(input, now))
            .collect();
        let documents = readings
            .iter()
            .map(to_document)
            .collect::<Result<Vec<_>, _>>()?;
        self.readings.insert_many(documents)?;
        info!(count = readings.len(), "reading batch stored");
        Ok(readings)
    }

    pub fn find_all(&self) -> Result<Vec<Reading>, StoreError> {
        self.find(&Filter::Empty)
    }

    pub fn find_by_id(&self, id: &str) -> Result<Reading, StoreError> {
        let filter = id_filter(id)?;
        let document = self.readings.find_one(&filter)?.ok_or(StoreError::NotFound)?;
        Ok(from_document(document)?)
    }

    /// Returns whether a reading was removed.
    pub fn delete_by_id(&self, id: &str) -> Result<bool, StoreError> {
        let filter = id_filter(id)?;
        Ok(self.readings.delete_one(&filter)? > 0)
    }

    pub fn delete_by_time_range(&self, range: &TimeRange) -> Result<u64, StoreError> {
        let removed = self.readings.delete_many(&range.filter(FIELD_TIME))?;
        info!(removed, "readings deleted by time range");
        Ok(removed)
    }

    /// Overwrites every mutable field of the reading with `input`. The
    /// identifier and timestamp are kept.
    pub fn update_fields(&self, id: &str, input: ReadingInput) -> Result<(), StoreError> {
        let filter = id_filter(id)?;
        let measurements = &input.measurements;
        let update = Update::new()
            .set(FIELD_DEVICE_NAME, Value::String(input.device_name.clone()))
            .set(FIELD_PRECIPITATION, number(FIELD_PRECIPITATION, input.precipitation)?)
            .set(FIELD_LATITUDE, number(FIELD_LATITUDE, input.latitude)?)
            .set(FIELD_LONGITUDE, number(FIELD_LONGITUDE, input.longitude)?)
            .set(FIELD_TEMPERATURE, optional(FIELD_TEMPERATURE, measurements.temperature)?)
            .set(
                FIELD_ATMOSPHERIC,
                optional(FIELD_ATMOSPHERIC, measurements.atmospheric_pressure)?,
            )
            .set(FIELD_MAX_WIND, optional(FIELD_MAX_WIND, measurements.max_wind_speed)?)
            .set(FIELD_SOLAR, optional(FIELD_SOLAR, measurements.solar_radiation)?)
            .set(FIELD_VAPOR, optional(FIELD_VAPOR, measurements.vapor_pressure)?)
            .set(FIELD_HUMIDITY, optional(FIELD_HUMIDITY, measurements.humidity)?)
            .set(
                FIELD_WIND_DIRECTION,
                optional(FIELD_WIND_DIRECTION, measurements.wind_direction)?,
            );
        if self.readings.update_one(&filter, &update)? == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    pub fn update_precipitation_by_id(&self, id: &str, value: f64) -> Result<(), StoreError> {
        let filter = id_filter(id)?;
        let update = Update::new().set(FIELD_PRECIPITATION, number(FIELD_PRECIPITATION, value)?);
        if self.readings.update_one(&filter, &update)? == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    pub fn bulk_set_device_name_by_time_range(
        &self,
        range: &TimeRange,
        device_name: &str,
    ) -> Result<u64, StoreError> {
        let update = Update::new().set(FIELD_DEVICE_NAME, Value::String(device_name.to_string()));
        let updated = self
            .readings
            .update_many(&range.filter(FIELD_TIME), &update)?;
        info!(device = device_name, updated, "device name set by time range");
        Ok(updated)
    }

    /// Case-insensitive literal substring search over the device name and
    /// the textual form of the temperature.
    pub fn search(&self, term: &str) -> Result<Vec<Reading>, StoreError> {
        let pattern = Pattern::literal(term, true).map_err(RepositoryError::from)?;
        let filter = Filter::Or(vec![
            Filter::matches(FIELD_DEVICE_NAME, pattern.clone()),
            Filter::matches(FIELD_TEMPERATURE, pattern),
        ]);
        self.find(&filter)
    }

    /// Highest precipitation reported by `device_name` within the trailing
    /// window. Ties keep the first reading in natural order.
    pub fn max_precipitation_for_device(
        &self,
        device_name: &str,
    ) -> Result<PrecipitationSummary, StoreError> {
        let cutoff = self.window_start(self.clock.now());
        let filter = Filter::eq(FIELD_DEVICE_NAME, Value::String(device_name.to_string()))
            .and(Filter::gte(FIELD_TIME, timestamp_value(&cutoff)));

        let mut best: Option<Reading> = None;
        for reading in self.find(&filter)? {
            let replace = match &best {
                Some(current) => reading.precipitation > current.precipitation,
                None => true,
            };
            if replace {
                best = Some(reading);
            }
        }

        let reading = best.ok_or(StoreError::NotFound)?;
        Ok(PrecipitationSummary {
            device_name: reading.device_name,
            time: reading.time,
            precipitation: reading.precipitation,
        })
    }

    /// Per device, the highest temperature inside `range` and the time of the
    /// first reading reaching it. Devices appear in order of first reading.
    pub fn max_temperature_per_device_in_range(
        &self,
        range: &TimeRange,
    ) -> Result<Vec<TemperatureSummary>, StoreError> {
        let readings = self.find(&range.filter(FIELD_TIME))?;

        let mut order: Vec<String> = Vec::new();
        let mut groups: HashMap<String, DeviceMax> = HashMap::new();
        for reading in readings {
            let group = groups.entry(reading.device_name.clone()).or_insert_with(|| {
                order.push(reading.device_name.clone());
                DeviceMax {
                    first_time: reading.time,
                    max: None,
                }
            });
            if let Some(temperature) = reading.temperature() {
                let higher = match group.max {
                    Some((current, _)) => temperature > current,
                    None => true,
                };
                if higher {
                    group.max = Some((temperature, reading.time));
                }
            }
        }

        let mut summaries = Vec::with_capacity(order.len());
        for device_name in order {
            let Some(group) = groups.remove(&device_name) else {
                continue;
            };
            let (temperature, time) = match (group.max, self.options.null_temperature) {
                (Some(max), _) => max,
                (None, NullTemperature::Zero) => (0.0, group.first_time),
                (None, NullTemperature::Omit) => continue,
            };
            summaries.push(TemperatureSummary {
                device_name,
                time,
                temperature,
            });
        }
        Ok(summaries)
    }

    pub fn find_by_device_and_exact_timestamp(
        &self,
        device_name: &str,
        time: &DateTime<Utc>,
    ) -> Result<ReadingSnapshot, StoreError> {
        let filter = Filter::eq(FIELD_DEVICE_NAME, Value::String(device_name.to_string()))
            .and(Filter::eq(FIELD_TIME, timestamp_value(time)));
        let document = self.readings.find_one(&filter)?.ok_or(StoreError::NotFound)?;
        let reading: Reading = from_document(document)?;
        Ok(ReadingSnapshot::from(&reading))
    }

    /// Newest reading for each distinct temperature value (absent
    /// temperature counts as one value), newest group first.
    pub fn newest_per_temperature(&self) -> Result<Vec<ReadingPresentation>, StoreError> {
        let mut readings = self.find_all()?;
        readings.sort_by(|a, b| b.time.cmp(&a.time));

        let mut seen: HashSet<Option<u64>> = HashSet::new();
        let mut newest = Vec::new();
        for reading in readings {
            if seen.insert(reading.temperature().map(temperature_key)) {
                newest.push(ReadingPresentation::from(reading));
            }
        }
        Ok(newest)
    }

    fn find(&self, filter: &Filter) -> Result<Vec<Reading>, StoreError> {
        self.readings
            .find(filter)?
            .into_iter()
            .map(|document| from_document(document).map_err(StoreError::from))
            .collect()
    }

    fn window_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_sub_months(Months::new(self.options.precipitation_window_months))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

struct DeviceMax {
    first_time: DateTime<Utc>,
    max: Option<(f64, DateTime<Utc>)>,
}

fn id_filter(id: &str) -> Result<Filter, StoreError> {
    let id = ObjectId::parse(id)?;
    Ok(Filter::eq(ID_FIELD, id_value(&id)))
}

/// NaN and the infinities have no JSON form and are rejected.
fn number(field: &'static str, value: f64) -> Result<Value, StoreError> {
    serde_json::Number::from_f64(value)
        .map(Value::Number)
        .ok_or(StoreError::NonFiniteValue(field))
}

fn optional(field: &'static str, value: Option<f64>) -> Result<Value, StoreError> {
    match value {
        Some(value) => number(field, value),
        None => Ok(Value::Null),
    }
}

fn check_finite(input: &ReadingInput) -> Result<(), StoreError> {
    let measurements = &input.measurements;
    let required = [
        (FIELD_PRECIPITATION, input.precipitation),
        (FIELD_LATITUDE, input.latitude),
        (FIELD_LONGITUDE, input.longitude),
    ];
    let reported = [
        (FIELD_TEMPERATURE, measurements.temperature),
        (FIELD_ATMOSPHERIC, measurements.atmospheric_pressure),
        (FIELD_MAX_WIND, measurements.max_wind_speed),
        (FIELD_SOLAR, measurements.solar_radiation),
        (FIELD_VAPOR, measurements.vapor_pressure),
        (FIELD_HUMIDITY, measurements.humidity),
        (FIELD_WIND_DIRECTION, measurements.wind_direction),
    ];
    for (field, value) in required {
        number(field, value)?;
    }
    for (field, value) in reported {
        optional(field, value)?;
    }
    Ok(())
}

// -0.0 and 0.0 group together.
fn temperature_key(value: f64) -> u64 {
    if value == 0.0 {
        0.0f64.to_bits()
    } else {
        value.to_bits()
    }
}
