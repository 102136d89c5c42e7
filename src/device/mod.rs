#[cfg(test)]
pub mod fake;
pub mod model;
pub mod serial;

use std::{io, time::Duration};

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::dto::{MetricReading, RawSensorRecord};
use model::{model_for, DeviceModel};

/// Written to the device to make it sample every sensor and answer.
pub const TRIGGER_BYTE: u8 = b'1';
/// Largest response read per poll; anything beyond is dropped.
pub const READ_BUFFER_SIZE: usize = 1028;
pub const BAUD_RATE: u32 = 9600;

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("failed to open serial device {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: serialport::Error,
    },
    #[error("serial I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("device did not answer before the read timeout")]
    ReadTimeout,
}

/// Byte transport to the device.
pub trait SerialLink: Send {
    /// Drops bytes received but not yet read, such as a reply that arrived
    /// after its read timed out.
    fn discard_input(&mut self) -> io::Result<()>;

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Reads whatever the device has sent, blocking until at least one byte
    /// arrives or the link fails.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

#[derive(Clone, Debug, PartialEq)]
pub struct DeviceSettings {
    pub path: String,
    pub model: String,
    pub warmup_settle: Duration,
    pub read_timeout: Option<Duration>,
}

pub struct DeviceChannel {
    link: Box<dyn SerialLink>,
    model: Option<Box<dyn DeviceModel>>,
    model_id: String,
}

impl DeviceChannel {
    /// Opens the serial device and runs the warm-up sequence. Blocks for
    /// twice the settle interval.
    pub fn open(settings: &DeviceSettings) -> Result<Self, DeviceError> {
        info!("Attempting to connect to device at {}", settings.path);
        let link = serial::open_port(&settings.path, settings.read_timeout)?;

        let mut channel = Self::new(Box::new(link), &settings.model);
        info!("Waiting for external sensors to warm up");
        channel.warm_up(settings.warmup_settle);
        info!("Device {} ready", channel.model_id());
        Ok(channel)
    }

    pub fn new(link: Box<dyn SerialLink>, model_id: &str) -> Self {
        let model = model_for(model_id);
        match &model {
            Some(model) => debug!("Using device model {}", model.id()),
            None => warn!(
                "Unknown device model {:?}, polls will return no readings",
                model_id
            ),
        }

        DeviceChannel {
            link,
            model,
            model_id: model_id.to_string(),
        }
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// The sensors report unstable values on their first activations after
    /// power-up. Two throwaway polls absorb that.
    pub fn warm_up(&mut self, settle: Duration) {
        for round in 1..=2 {
            match self.poll_once() {
                Ok(readings) => debug!(
                    "Warm-up poll {} discarded {} readings",
                    round,
                    readings.len()
                ),
                Err(err) => warn!("Warm-up poll {} failed: {}", round, err),
            }
            std::thread::sleep(settle);
        }
    }

    /// One request/response exchange with the device. `Ok(None)` means the
    /// device answered with something that is not a record.
    pub fn read_record(&mut self) -> Result<Option<RawSensorRecord>, DeviceError> {
        let Some(model) = self.model.as_ref() else {
            return Ok(None);
        };

        self.link.discard_input()?;
        self.link.write_all(&[TRIGGER_BYTE])?;

        let mut buf = [0u8; READ_BUFFER_SIZE];
        let len = self.link.read(&mut buf).map_err(|err| match err.kind() {
            io::ErrorKind::TimedOut => DeviceError::ReadTimeout,
            _ => DeviceError::Io(err),
        })?;

        match model.parse(&buf[..len]) {
            Some(mut record) => {
                record.timestamp = Utc::now().timestamp();
                Ok(Some(record))
            }
            None => {
                warn!("Device returned {} bytes that did not decode", len);
                Ok(None)
            }
        }
    }

    pub fn reshape(&self, record: RawSensorRecord) -> Vec<MetricReading> {
        self.model
            .as_ref()
            .map(|model| model.reshape(record))
            .unwrap_or_default()
    }

    pub fn poll_once(&mut self) -> Result<Vec<MetricReading>, DeviceError> {
        Ok(self
            .read_record()?
            .map(|record| self.reshape(record))
            .unwrap_or_default())
    }
}
