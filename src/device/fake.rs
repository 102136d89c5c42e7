use std::{
    collections::VecDeque,
    io,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use super::SerialLink;

pub struct FakeReply {
    response: io::Result<Vec<u8>>,
    delay: Option<Duration>,
    late: bool,
}

impl FakeReply {
    pub fn immediate(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            response: Ok(bytes.into()),
            delay: None,
            late: false,
        }
    }

    /// The read times out and the reply lands in the input buffer afterwards.
    pub fn late(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            response: Ok(bytes.into()),
            delay: None,
            late: true,
        }
    }

    pub fn with_delay(bytes: impl Into<Vec<u8>>, delay: Duration) -> Self {
        Self {
            response: Ok(bytes.into()),
            delay: Some(delay),
            late: false,
        }
    }

    pub fn error(kind: io::ErrorKind) -> Self {
        Self {
            response: Err(io::Error::new(kind, "scripted failure")),
            delay: None,
            late: false,
        }
    }
}

/// Shared view into a [`FakeLink`] after it has been moved into a channel.
#[derive(Clone, Default)]
pub struct FakeLinkHandle {
    writes: Arc<Mutex<Vec<u8>>>,
    reads: Arc<AtomicUsize>,
    discards: Arc<AtomicUsize>,
    in_use: Arc<AtomicBool>,
    overlapped: Arc<AtomicBool>,
}

impl FakeLinkHandle {
    pub fn writes(&self) -> Vec<u8> {
        self.writes.lock().unwrap().clone()
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn discards(&self) -> usize {
        self.discards.load(Ordering::SeqCst)
    }

    /// True if a trigger was written while another poll was still between
    /// its write and its read.
    pub fn overlapped(&self) -> bool {
        self.overlapped.load(Ordering::SeqCst)
    }
}

/// Scripted serial device. Replies are handed out in order; once the script
/// runs dry the `fallback` reply (if any) is repeated, otherwise reads return
/// zero bytes. Bytes left in `pending` are served before the script.
#[derive(Default)]
pub struct FakeLink {
    script: VecDeque<FakeReply>,
    fallback: Option<(Vec<u8>, Option<Duration>)>,
    pending: Vec<u8>,
    shared: FakeLinkHandle,
}

impl FakeLink {
    pub fn new(script: Vec<FakeReply>) -> Self {
        Self {
            script: script.into(),
            ..Default::default()
        }
    }

    pub fn repeating(bytes: impl Into<Vec<u8>>, delay: Option<Duration>) -> Self {
        Self {
            fallback: Some((bytes.into(), delay)),
            ..Default::default()
        }
    }

    pub fn handle(&self) -> FakeLinkHandle {
        self.shared.clone()
    }

    fn next_reply(&mut self) -> FakeReply {
        if let Some(reply) = self.script.pop_front() {
            return reply;
        }
        match &self.fallback {
            Some((bytes, delay)) => FakeReply {
                response: Ok(bytes.clone()),
                delay: *delay,
                late: false,
            },
            None => FakeReply::immediate(Vec::new()),
        }
    }
}

impl SerialLink for FakeLink {
    fn discard_input(&mut self) -> io::Result<()> {
        self.shared.discards.fetch_add(1, Ordering::SeqCst);
        self.pending.clear();
        Ok(())
    }

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        if self.shared.in_use.swap(true, Ordering::SeqCst) {
            self.shared.overlapped.store(true, Ordering::SeqCst);
        }
        self.shared.writes.lock().unwrap().extend_from_slice(bytes);
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let bytes = if self.pending.is_empty() {
            let reply = self.next_reply();
            if let Some(delay) = reply.delay {
                std::thread::sleep(delay);
            }
            self.shared.reads.fetch_add(1, Ordering::SeqCst);
            self.shared.in_use.store(false, Ordering::SeqCst);

            let bytes = reply.response?;
            if reply.late {
                self.pending = bytes;
                return Err(io::Error::new(io::ErrorKind::TimedOut, "scripted timeout"));
            }
            bytes
        } else {
            self.shared.reads.fetch_add(1, Ordering::SeqCst);
            self.shared.in_use.store(false, Ordering::SeqCst);
            std::mem::take(&mut self.pending)
        };
        let len = bytes.len().min(buf.len());
        buf[..len].copy_from_slice(&bytes[..len]);
        Ok(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn scripted_replies_then_fallback() {
        let mut link = FakeLink::new(vec![FakeReply::immediate("first")]);
        let handle = link.handle();
        let mut buf = [0u8; 16];

        link.write_all(b"1").unwrap();
        assert_eq!(link.read(&mut buf).unwrap(), 5);
        assert_eq!(&buf[..5], b"first");
        link.write_all(b"1").unwrap();
        assert_eq!(link.read(&mut buf).unwrap(), 0);
        assert_eq!(handle.writes(), b"11".to_vec());
        assert_eq!(handle.reads(), 2);
        assert!(!handle.overlapped());
    }

    #[test]
    fn replies_are_truncated_to_the_buffer() {
        let mut link = FakeLink::repeating("0123456789", None);
        let mut buf = [0u8; 4];
        link.write_all(b"1").unwrap();
        assert_eq!(link.read(&mut buf).unwrap(), 4);
        assert_eq!(&buf, b"0123");
    }

    #[test]
    fn scripted_delay_respected() {
        let mut link = FakeLink::new(vec![FakeReply::with_delay(
            "later",
            Duration::from_millis(5),
        )]);
        let mut buf = [0u8; 8];
        let start = Instant::now();
        link.write_all(b"1").unwrap();
        link.read(&mut buf).unwrap();
        assert!(start.elapsed() >= Duration::from_millis(5));
    }

    #[test]
    fn late_reply_is_buffered_until_discarded() {
        let mut link = FakeLink::new(vec![
            FakeReply::late("stale"),
            FakeReply::immediate("fresh"),
            FakeReply::late("stale"),
            FakeReply::immediate("fresh"),
        ]);
        let handle = link.handle();
        let mut buf = [0u8; 8];

        let err = link.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
        let len = link.read(&mut buf).unwrap();
        assert_eq!(&buf[..len], b"stale");

        link.read(&mut buf).unwrap();
        link.read(&mut buf).unwrap_err();
        link.discard_input().unwrap();
        let len = link.read(&mut buf).unwrap();
        assert_eq!(&buf[..len], b"fresh");
        assert_eq!(handle.discards(), 1);
    }

    #[test]
    fn second_write_before_read_is_flagged() {
        let mut link = FakeLink::default();
        let handle = link.handle();
        link.write_all(b"1").unwrap();
        link.write_all(b"1").unwrap();
        assert!(handle.overlapped());
    }
}
