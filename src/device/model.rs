use tracing::debug;

use crate::dto::{MetricName, MetricReading, RawSensorRecord};

pub const SPARKFUN_WEATHER_SHIELD: &str = "SPARKFUN-DEV-13956";

/// Decoding and reshaping rules for one kind of attached hardware.
pub trait DeviceModel: Send + Sync {
    fn id(&self) -> &'static str;

    /// Returns `None` when the bytes are not a complete record.
    fn parse(&self, bytes: &[u8]) -> Option<RawSensorRecord>;

    /// Fans a stamped record out into readings, in the model's fixed order.
    fn reshape(&self, record: RawSensorRecord) -> Vec<MetricReading>;
}

pub fn model_for(id: &str) -> Option<Box<dyn DeviceModel>> {
    match id {
        SPARKFUN_WEATHER_SHIELD => Some(Box::new(SparkFunWeatherShield)),
        _ => None,
    }
}

/// Arduino running the SparkFun Weather Shield sketch, answering with one
/// JSON object per trigger.
pub struct SparkFunWeatherShield;

impl DeviceModel for SparkFunWeatherShield {
    fn id(&self) -> &'static str {
        SPARKFUN_WEATHER_SHIELD
    }

    fn parse(&self, bytes: &[u8]) -> Option<RawSensorRecord> {
        match serde_json::from_slice(bytes) {
            Ok(record) => Some(record),
            Err(err) => {
                debug!("Discarding {} byte device response: {}", bytes.len(), err);
                None
            }
        }
    }

    fn reshape(&self, record: RawSensorRecord) -> Vec<MetricReading> {
        let timestamp = record.timestamp;
        let RawSensorRecord {
            humidity_value,
            humidity_unit,
            temperature_value,
            temperature_unit,
            pressure_value,
            pressure_unit,
            temperature_backup_value,
            temperature_backup_unit,
            altitude_value,
            altitude_unit,
            illuminance_value,
            illuminance_unit,
            ..
        } = record;

        [
            (humidity_value, humidity_unit),
            (temperature_value, temperature_unit),
            (pressure_value, pressure_unit),
            (temperature_backup_value, temperature_backup_unit),
            (altitude_value, altitude_unit),
            (illuminance_value, illuminance_unit),
        ]
        .into_iter()
        .zip(MetricName::ORDER)
        .map(|((value, unit), metric)| MetricReading {
            metric,
            value,
            unit,
            timestamp,
        })
        .collect()
    }
}
