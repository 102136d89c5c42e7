pub mod metric_reading;
pub mod raw_sensor_record;

pub use metric_reading::{MetricName, MetricReading};
pub use raw_sensor_record::RawSensorRecord;
