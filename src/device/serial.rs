use std::{
    io::{self, ErrorKind, Read, Write},
    time::Duration,
};

use serialport::{ClearBuffer, SerialPort};

use super::{DeviceError, SerialLink, BAUD_RATE};

/// Port timeout used when reads should block until the device answers.
/// Expiry only restarts the wait.
const IDLE_READ_TIMEOUT: Duration = Duration::from_secs(60);

pub struct SerialPortLink {
    port: Box<dyn SerialPort>,
    wait_forever: bool,
}

pub fn open_port(
    path: &str,
    read_timeout: Option<Duration>,
) -> Result<SerialPortLink, DeviceError> {
    let port = serialport::new(path, BAUD_RATE)
        .timeout(read_timeout.unwrap_or(IDLE_READ_TIMEOUT))
        .open()
        .map_err(|source| DeviceError::Open {
            path: path.to_string(),
            source,
        })?;

    Ok(SerialPortLink {
        port,
        wait_forever: read_timeout.is_none(),
    })
}

impl SerialLink for SerialPortLink {
    fn discard_input(&mut self) -> io::Result<()> {
        Ok(self.port.clear(ClearBuffer::Input)?)
    }

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.port.write_all(bytes)?;
        self.port.flush()
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            match self.port.read(buf) {
                Err(err) if err.kind() == ErrorKind::TimedOut && self.wait_forever => continue,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                result => return result,
            }
        }
    }
}
