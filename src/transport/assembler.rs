use bytes::{BufMut, BytesMut};

use crate::transport::FragmentFlags;

/// Reassembles begin/continue/end flagged frames into whole messages.
///
/// Unfragmented frames pass straight through without a copy. A continue or
/// end frame with no begin in flight is dropped and counted.
pub struct FragmentAssembler {
    buf: BytesMut,
    in_progress: bool,
    dropped: u64,
}

impl FragmentAssembler {
    pub fn with_capacity(cap: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(cap),
            in_progress: false,
            dropped: 0,
        }
    }

    /// Frames dropped because they arrived without a begin frame.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn on_frame(
        &mut self,
        data: &[u8],
        flags: FragmentFlags,
        sink: &mut dyn FnMut(&[u8]),
    ) {
        if flags.is_begin() && flags.is_end() {
            self.in_progress = false;
            sink(data);
            return;
        }

        if flags.is_begin() {
            self.buf.clear();
            self.buf.put_slice(data);
            self.in_progress = true;
            return;
        }

        if !self.in_progress {
            self.dropped += 1;
            return;
        }

        self.buf.put_slice(data);
        if flags.is_end() {
            self.in_progress = false;
            sink(&self.buf);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(frames: &[(&[u8], FragmentFlags)]) -> (Vec<Vec<u8>>, u64) {
        let mut asm = FragmentAssembler::with_capacity(64);
        let mut out = Vec::new();
        for (data, flags) in frames {
            asm.on_frame(data, *flags, &mut |msg| out.push(msg.to_vec()));
        }
        (out, asm.dropped())
    }

    #[test]
    fn unfragmented_passes_through() {
        let (out, dropped) = collect(&[(b"abc", FragmentFlags::unfragmented())]);
        assert_eq!(out, vec![b"abc".to_vec()]);
        assert_eq!(dropped, 0);
    }

    #[test]
    fn three_part_message_is_concatenated() {
        let (out, dropped) = collect(&[
            (b"ab", FragmentFlags::new(true, false)),
            (b"cd", FragmentFlags::new(false, false)),
            (b"ef", FragmentFlags::new(false, true)),
        ]);
        assert_eq!(out, vec![b"abcdef".to_vec()]);
        assert_eq!(dropped, 0);
    }

    #[test]
    fn orphan_continuation_is_dropped() {
        let (out, dropped) = collect(&[
            (b"xx", FragmentFlags::new(false, true)),
            (b"ab", FragmentFlags::new(true, false)),
            (b"cd", FragmentFlags::new(false, true)),
        ]);
        assert_eq!(out, vec![b"abcd".to_vec()]);
        assert_eq!(dropped, 1);
    }

    #[test]
    fn restart_discards_partial_message() {
        let (out, _) = collect(&[
            (b"ab", FragmentFlags::new(true, false)),
            (b"cd", FragmentFlags::new(true, false)),
            (b"ef", FragmentFlags::new(false, true)),
        ]);
        assert_eq!(out, vec![b"cdef".to_vec()]);
    }
}
