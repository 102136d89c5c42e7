use std::fmt;

use crate::proto::telemetry::{TelemetryDatum, TelemetryLabel, Timestamp};

pub const UNIT_LABEL: &str = "unit";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MetricName {
    Humidity,
    Temperature,
    Pressure,
    TemperatureBackup,
    Altitude,
    Illuminance,
}

impl MetricName {
    /// Emission order of one poll. Consumers correlate readings by position.
    pub const ORDER: [MetricName; 6] = [
        MetricName::Humidity,
        MetricName::Temperature,
        MetricName::Pressure,
        MetricName::TemperatureBackup,
        MetricName::Altitude,
        MetricName::Illuminance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::Humidity => "humidity",
            MetricName::Temperature => "temperature",
            MetricName::Pressure => "pressure",
            MetricName::TemperatureBackup => "temperature_backup",
            MetricName::Altitude => "altitude",
            MetricName::Illuminance => "illuminance",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MetricReading {
    pub metric: MetricName,
    pub value: f64,
    pub unit: String,
    /// Seconds since the epoch, taken when the device answered.
    pub timestamp: i64,
}

impl MetricReading {
    pub fn labels(&self) -> [(&'static str, &str); 1] {
        [(UNIT_LABEL, self.unit.as_str())]
    }
}

impl fmt::Display for MetricReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}={} @{}",
            self.metric, self.value, UNIT_LABEL, self.unit, self.timestamp
        )
    }
}

impl From<MetricReading> for TelemetryDatum {
    fn from(reading: MetricReading) -> Self {
        let labels = reading
            .labels()
            .into_iter()
            .map(|(name, value)| TelemetryLabel {
                name: name.to_string(),
                value: value.to_string(),
            })
            .collect();

        TelemetryDatum {
            metric: reading.metric.as_str().to_string(),
            value: reading.value,
            labels,
            timestamp: Some(Timestamp {
                seconds: reading.timestamp,
                nanos: 0,
            }),
        }
    }
}
