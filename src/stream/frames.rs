use crate::protocol::FrameStatus;
use std::ops::Range;

/// One frame of the outgoing stream: a byte range of the audio buffer and
/// its position marker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramePlan {
    pub index: usize,
    pub range: Range<usize>,
    pub status: FrameStatus,
}

impl FramePlan {
    pub fn len(&self) -> usize {
        self.range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }

    /// The frame that carries the session parameters
    pub fn is_opening(&self) -> bool {
        self.index == 0
    }
}

/// Split `len` bytes into frames of at most `frame_size` bytes.
///
/// The first frame is [`FrameStatus::First`], the one reaching the end of
/// the buffer is [`FrameStatus::Last`], everything between is
/// [`FrameStatus::Continue`]. A buffer that fits in one frame yields a
/// single `Last` frame. An empty buffer or a zero frame size yields nothing.
pub fn plan_frames(len: usize, frame_size: usize) -> Vec<FramePlan> {
    if len == 0 || frame_size == 0 {
        return Vec::new();
    }

    let mut frames = Vec::with_capacity(len.div_ceil(frame_size));
    let mut offset = 0;

    while offset < len {
        let end = offset + frame_size.min(len - offset);
        let status = if end >= len {
            FrameStatus::Last
        } else if offset == 0 {
            FrameStatus::First
        } else {
            FrameStatus::Continue
        };

        frames.push(FramePlan {
            index: frames.len(),
            range: offset..end,
            status,
        });
        offset = end;
    }

    frames
}
