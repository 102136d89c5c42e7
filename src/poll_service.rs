use std::{future::Future, sync::Arc, time::Duration};

use thiserror::Error;
use tokio::{
    sync::{Mutex, OwnedMutexGuard},
    task::{spawn_blocking, JoinError},
    time::timeout,
};
use tracing::{debug, warn};

use crate::{
    device::{DeviceChannel, DeviceError},
    dto::MetricReading,
};

#[derive(Debug, Clone, Error)]
#[error("caller stream closed: {0}")]
pub struct SendError(pub String);

#[derive(Debug, Error)]
pub enum PollError {
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error("device was busy for longer than {0:?}")]
    GateTimeout(Duration),
    #[error(transparent)]
    Transport(#[from] SendError),
    #[error("device worker failed: {0}")]
    Worker(#[from] JoinError),
}

/// Destination of the readings produced by one `PollOnce` call.
pub trait ReadingSink {
    fn send(
        &mut self,
        reading: MetricReading,
    ) -> impl Future<Output = Result<(), SendError>> + Send;
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ServiceSettings {
    pub gate_wait_timeout: Option<Duration>,
}

/// Serves polls of the single attached device. Every call holds the gate
/// from before the trigger byte is written until its last reading is sent.
pub struct PollService {
    gate: Arc<Mutex<DeviceChannel>>,
    gate_wait_timeout: Option<Duration>,
}

impl PollService {
    pub fn new(channel: DeviceChannel, settings: ServiceSettings) -> Self {
        PollService {
            gate: Arc::new(Mutex::new(channel)),
            gate_wait_timeout: settings.gate_wait_timeout,
        }
    }

    /// Runs one poll cycle and sends its readings to `sink` in order.
    /// Returns the number of readings sent.
    pub async fn poll_once<S: ReadingSink>(&self, sink: &mut S) -> Result<usize, PollError> {
        let guard = self.acquire().await?;

        // The guard travels with the blocking read, so a caller that goes
        // away mid-read cannot free the device under it.
        let (guard, readings) = spawn_blocking(move || {
            let mut guard = guard;
            let readings = guard.poll_once();
            (guard, readings)
        })
        .await?;
        let readings = readings?;

        if readings.is_empty() {
            debug!("Poll produced no readings");
        }

        let mut sent = 0;
        for reading in readings {
            if let Err(err) = sink.send(reading).await {
                warn!("Aborting poll after {} readings: {}", sent, err);
                return Err(err.into());
            }
            sent += 1;
        }

        drop(guard);
        Ok(sent)
    }

    async fn acquire(&self) -> Result<OwnedMutexGuard<DeviceChannel>, PollError> {
        let lock = self.gate.clone().lock_owned();
        match self.gate_wait_timeout {
            Some(limit) => timeout(limit, lock)
                .await
                .map_err(|_| PollError::GateTimeout(limit)),
            None => Ok(lock.await),
        }
    }

    /// True when no poll currently holds the device.
    pub fn is_idle(&self) -> bool {
        self.gate.try_lock().is_ok()
    }

    /// Hands the channel back once no call references the service anymore.
    pub fn into_channel(self) -> Option<DeviceChannel> {
        Arc::into_inner(self.gate).map(Mutex::into_inner)
    }
}
