use serde::{Deserialize, Deserializer};

/// Flat record returned by the weather shield for one poll.
///
/// Keys missing from the device response, or sent as `null`, decode as zero
/// or empty. The `timestamp` is never taken from the device, it is stamped at
/// read time.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct RawSensorRecord {
    #[serde(deserialize_with = "null_as_default")]
    pub status: String,
    #[serde(deserialize_with = "null_as_default")]
    pub runtime: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub id: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub humidity_value: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub humidity_unit: String,
    #[serde(rename = "temperature_primary_value", deserialize_with = "null_as_default")]
    pub temperature_value: f64,
    #[serde(rename = "temperature_primary_unit", deserialize_with = "null_as_default")]
    pub temperature_unit: String,
    #[serde(deserialize_with = "null_as_default")]
    pub pressure_value: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub pressure_unit: String,
    #[serde(rename = "temperature_secondary_value", deserialize_with = "null_as_default")]
    pub temperature_backup_value: f64,
    #[serde(rename = "temperature_secondary_unit", deserialize_with = "null_as_default")]
    pub temperature_backup_unit: String,
    #[serde(deserialize_with = "null_as_default")]
    pub altitude_value: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub altitude_unit: String,
    #[serde(deserialize_with = "null_as_default")]
    pub illuminance_value: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub illuminance_unit: String,
    #[serde(skip)]
    pub timestamp: i64,
}

/// The sketch prints `null` for a sensor that produced no number.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl RawSensorRecord {
    pub fn describe(&self) -> String {
        [
            format!("Status: {}", self.status),
            format!("Runtime: {}", self.runtime),
            format!("Id: {}", self.id),
            format!("HumidityValue: {}", self.humidity_value),
            format!("HumidityUnit: {}", self.humidity_unit),
            format!("TemperatureValue: {}", self.temperature_value),
            format!("TemperatureUnit: {}", self.temperature_unit),
            format!("PressureValue: {}", self.pressure_value),
            format!("PressureUnit: {}", self.pressure_unit),
            format!("TemperatureBackupValue: {}", self.temperature_backup_value),
            format!("TemperatureBackupUnit: {}", self.temperature_backup_unit),
            format!("AltitudeValue: {}", self.altitude_value),
            format!("AltitudeUnit: {}", self.altitude_unit),
            format!("IlluminanceValue: {}", self.illuminance_value),
            format!("IlluminanceUnit: {}", self.illuminance_unit),
            format!("Timestamp: {}", self.timestamp),
        ]
        .join("\n")
    }
}
