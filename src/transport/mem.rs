//! Loopback transport: fixed-size frame rings shared within one process.
//!
//! Everything is preallocated; a publish that does not fit reports
//! back-pressure instead of growing the ring. Messages longer than one
//! frame are fragmented, which also exercises reassembly on the consumer
//! side.

use ahash::AHashMap;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::error::AgentError;
use crate::transport::{ClaimBuf, FragmentFlags, OfferResult, Publication, Subscription, Transport};

/// Payload bytes per frame.
pub const FRAME_DATA_LEN: usize = 1016;

/// Default ring depth in frames.
pub const DEFAULT_RING_FRAMES: usize = 256;

/// Largest message the loopback claim buffer accepts.
pub const MAX_MESSAGE_LEN: usize = 64 * 1024;

#[derive(Clone, Copy)]
struct Frame {
    len: u16,
    flags: FragmentFlags,
    data: [u8; FRAME_DATA_LEN],
}

impl Frame {
    fn empty() -> Self {
        Self {
            len: 0,
            flags: FragmentFlags::default(),
            data: [0; FRAME_DATA_LEN],
        }
    }
}

struct FrameRing {
    frames: VecDeque<Frame>,
    capacity: usize,
    connected: bool,
}

impl FrameRing {
    fn new(capacity: usize) -> Self {
        Self {
            frames: VecDeque::with_capacity(capacity),
            capacity,
            connected: true,
        }
    }

    fn push_message(&mut self, parts: &[&[u8]]) -> OfferResult {
        if !self.connected {
            return OfferResult::NotConnected;
        }
        let total: usize = parts.iter().map(|p| p.len()).sum();
        let frames_needed = total.div_ceil(FRAME_DATA_LEN).max(1);
        if self.frames.len() + frames_needed > self.capacity {
            return OfferResult::BackPressure;
        }

        let mut frame = Frame::empty();
        let mut fill = 0usize;
        let mut written = 0usize;
        let mut emitted = 0usize;

        for part in parts {
            let mut off = 0;
            while off < part.len() {
                let n = (FRAME_DATA_LEN - fill).min(part.len() - off);
                frame.data[fill..fill + n].copy_from_slice(&part[off..off + n]);
                fill += n;
                off += n;
                written += n;
                if fill == FRAME_DATA_LEN && written < total {
                    frame.len = fill as u16;
                    frame.flags = FragmentFlags::new(emitted == 0, false);
                    self.frames.push_back(frame);
                    emitted += 1;
                    fill = 0;
                }
            }
        }

        frame.len = fill as u16;
        frame.flags = FragmentFlags::new(emitted == 0, true);
        self.frames.push_back(frame);
        OfferResult::Success
    }
}

type RingKey = (String, i32);

struct MemHub {
    rings: AHashMap<RingKey, Rc<RefCell<FrameRing>>>,
    ring_frames: usize,
}

impl MemHub {
    fn ring(&mut self, uri: &str, stream_id: i32) -> Rc<RefCell<FrameRing>> {
        let key = (uri.to_string(), stream_id);
        self.rings
            .entry(key)
            .or_insert_with(|| Rc::new(RefCell::new(FrameRing::new(self.ring_frames))))
            .clone()
    }
}

/// Process-local transport. Clones share the same ring set, so a test can
/// keep a handle and subscribe to what an agent publishes.
#[derive(Clone)]
pub struct MemTransport {
    hub: Rc<RefCell<MemHub>>,
}

impl MemTransport {
    pub fn new() -> Self {
        Self::with_ring_frames(DEFAULT_RING_FRAMES)
    }

    pub fn with_ring_frames(ring_frames: usize) -> Self {
        Self {
            hub: Rc::new(RefCell::new(MemHub {
                rings: AHashMap::new(),
                ring_frames,
            })),
        }
    }

    /// Mark a stream disconnected; subsequent offers report `NotConnected`.
    pub fn disconnect(&self, uri: &str, stream_id: i32) {
        let ring = self.hub.borrow_mut().ring(uri, stream_id);
        ring.borrow_mut().connected = false;
    }

    /// Frames currently queued on a stream.
    pub fn depth(&self, uri: &str, stream_id: i32) -> usize {
        let ring = self.hub.borrow_mut().ring(uri, stream_id);
        let depth = ring.borrow().frames.len();
        depth
    }
}

impl Default for MemTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for MemTransport {
    type Pub = MemPublication;
    type Sub = MemSubscription;

    fn add_publication(&mut self, uri: &str, stream_id: i32) -> Result<Self::Pub, AgentError> {
        let ring = self.hub.borrow_mut().ring(uri, stream_id);
        Ok(MemPublication {
            ring,
            scratch: vec![0; MAX_MESSAGE_LEN].into_boxed_slice(),
        })
    }

    fn add_subscription(&mut self, uri: &str, stream_id: i32) -> Result<Self::Sub, AgentError> {
        let ring = self.hub.borrow_mut().ring(uri, stream_id);
        Ok(MemSubscription { ring })
    }
}

pub struct MemPublication {
    ring: Rc<RefCell<FrameRing>>,
    scratch: Box<[u8]>,
}

impl MemPublication {
    fn has_room(&self, len: usize) -> bool {
        let ring = self.ring.borrow();
        let frames_needed = len.div_ceil(FRAME_DATA_LEN).max(1);
        ring.connected && ring.frames.len() + frames_needed <= ring.capacity
    }
}

pub struct MemClaim<'a> {
    owner: &'a mut MemPublication,
    len: usize,
}

impl ClaimBuf for MemClaim<'_> {
    fn buffer(&mut self) -> &mut [u8] {
        &mut self.owner.scratch[..self.len]
    }

    fn commit(self) {
        let part = &self.owner.scratch[..self.len];
        self.owner.ring.borrow_mut().push_message(&[part]);
    }

    fn abort(self) {}
}

impl Publication for MemPublication {
    type Claim<'a> = MemClaim<'a>;

    fn try_claim(&mut self, len: usize) -> Option<Self::Claim<'_>> {
        if len > self.scratch.len() || !self.has_room(len) {
            return None;
        }
        Some(MemClaim { owner: self, len })
    }

    fn offer(&mut self, fragments: &[&[u8]]) -> OfferResult {
        self.ring.borrow_mut().push_message(fragments)
    }

    fn is_connected(&self) -> bool {
        self.ring.borrow().connected
    }

    fn max_message_len(&self) -> usize {
        self.scratch.len()
    }
}

pub struct MemSubscription {
    ring: Rc<RefCell<FrameRing>>,
}

impl Subscription for MemSubscription {
    fn poll(
        &mut self,
        handler: &mut dyn FnMut(&[u8], FragmentFlags),
        fragment_limit: usize,
    ) -> u32 {
        let mut count = 0;
        while count < fragment_limit as u32 {
            let frame = match self.ring.borrow_mut().frames.pop_front() {
                Some(frame) => frame,
                None => break,
            };
            handler(&frame.data[..frame.len as usize], frame.flags);
            count += 1;
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::FragmentAssembler;

    fn pair(uri: &str) -> (MemPublication, MemSubscription, MemTransport) {
        let mut transport = MemTransport::with_ring_frames(8);
        let p = transport.add_publication(uri, 1).unwrap();
        let s = transport.add_subscription(uri, 1).unwrap();
        (p, s, transport)
    }

    #[test]
    fn claim_commit_delivers_one_frame() {
        let (mut p, mut s, _t) = pair("mem:a");
        {
            let mut claim = p.try_claim(3).unwrap();
            claim.buffer().copy_from_slice(b"abc");
            claim.commit();
        }
        let mut seen = Vec::new();
        let polled = s.poll(&mut |data, flags| seen.push((data.to_vec(), flags)), 10);
        assert_eq!(polled, 1);
        assert_eq!(seen[0].0, b"abc");
        assert!(seen[0].1.is_begin() && seen[0].1.is_end());
    }

    #[test]
    fn abort_delivers_nothing() {
        let (mut p, mut s, _t) = pair("mem:b");
        {
            let mut claim = p.try_claim(3).unwrap();
            claim.buffer().copy_from_slice(b"abc");
            claim.abort();
        }
        assert_eq!(s.poll(&mut |_, _| {}, 10), 0);
    }

    #[test]
    fn long_offer_fragments_and_reassembles() {
        let (mut p, mut s, _t) = pair("mem:c");
        let big = vec![7u8; FRAME_DATA_LEN * 2 + 10];
        assert_eq!(p.offer(&[&big[..100], &big[100..]]), OfferResult::Success);

        let mut asm = FragmentAssembler::with_capacity(big.len());
        let mut messages = Vec::new();
        s.poll(
            &mut |data, flags| asm.on_frame(data, flags, &mut |msg| messages.push(msg.to_vec())),
            16,
        );
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0], big);
    }

    #[test]
    fn full_ring_reports_back_pressure() {
        let (mut p, _s, _t) = pair("mem:d");
        for _ in 0..8 {
            assert_eq!(p.offer(&[b"x"]), OfferResult::Success);
        }
        assert_eq!(p.offer(&[b"x"]), OfferResult::BackPressure);
        assert!(p.try_claim(1).is_none());
    }

    #[test]
    fn disconnect_reports_not_connected() {
        let (mut p, _s, t) = pair("mem:e");
        t.disconnect("mem:e", 1);
        assert_eq!(p.offer(&[b"x"]), OfferResult::NotConnected);
        assert!(!p.is_connected());
    }

    #[test]
    fn fragment_limit_caps_a_poll() {
        let (mut p, mut s, _t) = pair("mem:f");
        for _ in 0..5 {
            p.offer(&[b"m"]);
        }
        assert_eq!(s.poll(&mut |_, _| {}, 2), 2);
        assert_eq!(s.poll(&mut |_, _| {}, 10), 3);
    }
}
