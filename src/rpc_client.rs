use std::time::Duration;

use anyhow::anyhow;
use prost::{
    bytes::{Buf, BytesMut},
    DecodeError, Message,
};
use tracing::info;

use crate::{proto::telemetry::TelemetryDatum, rpc_server::POLL_ONCE_PATH};

/// Deadline for one whole `PollOnce` exchange, including the streamed body.
pub const POLL_TIMEOUT: Duration = Duration::from_secs(1);

/// Longest varint a length prefix can take.
const MAX_DELIMITER_LEN: usize = 10;

/// Splits a byte stream back into length-delimited `TelemetryDatum` frames.
#[derive(Default)]
pub struct FrameDecoder {
    buf: BytesMut,
}

impl FrameDecoder {
    pub fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Returns `Ok(None)` until a whole frame has been buffered.
    pub fn next_frame(&mut self) -> Result<Option<TelemetryDatum>, DecodeError> {
        let delimiter_complete = self
            .buf
            .iter()
            .take(MAX_DELIMITER_LEN)
            .any(|byte| byte & 0x80 == 0);
        if !delimiter_complete && self.buf.len() < MAX_DELIMITER_LEN {
            return Ok(None);
        }

        let len = prost::decode_length_delimiter(&self.buf[..])?;
        let prefix = prost::length_delimiter_len(len);
        if self.buf.len() < prefix + len {
            return Ok(None);
        }

        self.buf.advance(prefix);
        let frame = self.buf.split_to(len);
        Ok(Some(TelemetryDatum::decode(frame)?))
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

/// Calls `PollOnce` on a running server and logs each datum as it arrives.
pub async fn poll(rpc_addr: &str, timeout: Duration) -> anyhow::Result<Vec<TelemetryDatum>> {
    let client = reqwest::Client::builder().timeout(timeout).build()?;
    let url = format!("http://{}{}", rpc_addr, POLL_ONCE_PATH);

    let mut response = client.post(&url).send().await?.error_for_status()?;

    let mut decoder = FrameDecoder::default();
    let mut data = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        decoder.push(&chunk);
        while let Some(datum) = decoder.next_frame()? {
            info!("Server Response: {:?}", datum);
            data.push(datum);
        }
    }

    if !decoder.is_empty() {
        return Err(anyhow!("stream ended inside a frame"));
    }
    Ok(data)
}
