//! Single-slot, latest-value handoff between the producer and client sessions.
//!
//! The producer is the only writer; any number of sessions read. A publish
//! replaces the slot under a short lock (a pointer-sized swap, never a byte
//! copy), so a reader sees either "no frame yet" or one complete payload.
//! Readers do not consume: the same payload is served until the next publish.
//!
//! There is no queue and no back-pressure. A slow reader silently misses
//! intermediate frames.

use std::time::{Duration, Instant};

use bytes::Bytes;
use parking_lot::{Condvar, Mutex};

/// One encoded frame, immutable once published.
///
/// Cloning shares the underlying bytes; no session can mutate what
/// another session is sending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPayload {
    seq: u64,
    data: Bytes,
}

impl EncodedPayload {
    pub fn new(seq: u64, data: impl Into<Bytes>) -> Self {
        Self {
            seq,
            data: data.into(),
        }
    }

    /// Producer-assigned sequence number. Never sent on the wire.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Latest-frame cell shared by the producer and every session.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    slot: Mutex<Slot>,
    published: Condvar,
}

#[derive(Debug, Default)]
struct Slot {
    current: Option<EncodedPayload>,
    publishes: u64,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `payload`, replacing whatever was there. Never waits on a reader.
    pub fn publish(&self, payload: EncodedPayload) {
        let first = {
            let mut slot = self.slot.lock();
            let first = slot.current.is_none();
            slot.current = Some(payload);
            slot.publishes += 1;
            first
        };
        if first {
            self.published.notify_all();
        }
    }

    /// The most recently published payload, or `None` if nothing was ever published.
    pub fn fetch(&self) -> Option<EncodedPayload> {
        self.slot.lock().current.clone()
    }

    /// Like [`fetch`](Self::fetch), but blocks up to `timeout` for the first publish.
    pub fn wait_for_frame(&self, timeout: Duration) -> Option<EncodedPayload> {
        let deadline = Instant::now() + timeout;
        let mut slot = self.slot.lock();
        while slot.current.is_none() {
            if self.published.wait_until(&mut slot, deadline).timed_out() {
                break;
            }
        }
        slot.current.clone()
    }

    /// Number of completed publishes since creation.
    pub fn publish_count(&self) -> u64 {
        self.slot.lock().publishes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn payload(seq: u64, fill: u8, len: usize) -> EncodedPayload {
        EncodedPayload::new(seq, vec![fill; len])
    }

    #[test]
    fn empty_until_first_publish() {
        let buffer = FrameBuffer::new();
        assert!(buffer.fetch().is_none());
        assert_eq!(buffer.publish_count(), 0);

        buffer.publish(payload(1, 0xAA, 17));
        let got = buffer.fetch().unwrap();
        assert_eq!(got.len(), 17);
        assert_eq!(buffer.publish_count(), 1);
    }

    #[test]
    fn fetch_is_idempotent() {
        let buffer = FrameBuffer::new();
        buffer.publish(payload(7, 0x42, 32));

        let a = buffer.fetch().unwrap();
        let b = buffer.fetch().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.data(), b.data());
    }

    #[test]
    fn publish_overwrites() {
        let buffer = FrameBuffer::new();
        buffer.publish(payload(1, 1, 17));
        buffer.publish(payload(2, 2, 9));

        let got = buffer.fetch().unwrap();
        assert_eq!(got.seq(), 2);
        assert_eq!(&got.data()[..], &[2u8; 9]);
    }

    #[test]
    fn wait_times_out_when_empty() {
        let buffer = FrameBuffer::new();
        let start = Instant::now();
        assert!(buffer.wait_for_frame(Duration::from_millis(50)).is_none());
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn wait_returns_immediately_when_populated() {
        let buffer = FrameBuffer::new();
        buffer.publish(payload(1, 9, 4));
        let got = buffer.wait_for_frame(Duration::from_secs(10)).unwrap();
        assert_eq!(got.seq(), 1);
    }

    #[test]
    fn wait_wakes_on_first_publish() {
        let buffer = Arc::new(FrameBuffer::new());
        let waiter = {
            let buffer = buffer.clone();
            thread::spawn(move || buffer.wait_for_frame(Duration::from_secs(5)))
        };

        thread::sleep(Duration::from_millis(20));
        buffer.publish(payload(3, 5, 8));

        let got = waiter.join().unwrap().expect("waiter should see the publish");
        assert_eq!(got.seq(), 3);
    }

    #[test]
    fn concurrent_fetch_never_sees_spliced_payload() {
        let buffer = Arc::new(FrameBuffer::new());
        buffer.publish(payload(0, 0, 64));

        let writer = {
            let buffer = buffer.clone();
            thread::spawn(move || {
                for seq in 1..=2000u64 {
                    let fill = (seq % 251) as u8;
                    let len = 16 + (seq as usize % 48);
                    buffer.publish(payload(seq, fill, len));
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let buffer = buffer.clone();
                thread::spawn(move || {
                    for _ in 0..2000 {
                        let got = buffer.fetch().unwrap();
                        let data = got.data();
                        let fill = (got.seq() % 251) as u8;
                        assert!(data.iter().all(|&b| b == fill), "spliced payload");
                        if got.seq() > 0 {
                            assert_eq!(data.len(), 16 + (got.seq() as usize % 48));
                        }
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for r in readers {
            r.join().unwrap();
        }
    }

    #[test]
    fn fetch_after_newer_publish_never_returns_older() {
        let buffer = Arc::new(FrameBuffer::new());
        let writer = {
            let buffer = buffer.clone();
            thread::spawn(move || {
                for seq in 1..=1000u64 {
                    buffer.publish(payload(seq, 0, 1));
                }
            })
        };

        let mut last = 0;
        while last < 1000 {
            if let Some(got) = buffer.fetch() {
                assert!(got.seq() >= last, "went back from {last} to {}", got.seq());
                last = got.seq();
            }
        }
        writer.join().unwrap();
    }
}
