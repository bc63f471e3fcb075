//! Audio frame type.

/// A stereo audio frame (16-bit integer).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Frame {
    pub left: i16,
    pub right: i16,
}

impl Frame {
    /// Create a silent frame.
    pub const fn silence() -> Self {
        Self { left: 0, right: 0 }
    }

    /// Create a mono frame (same value for both channels).
    pub const fn mono(value: i16) -> Self {
        Self {
            left: value,
            right: value,
        }
    }

    /// Build a frame from 32-bit accumulators, saturating to 16 bits.
    pub fn from_accum(left: i32, right: i32) -> Self {
        Self {
            left: left.clamp(-32768, 32767) as i16,
            right: right.clamp(-32768, 32767) as i16,
        }
    }

    /// Mix another frame into this one.
    pub fn mix(&mut self, other: Frame) {
        *self = Self::from_accum(
            self.left as i32 + other.left as i32,
            self.right as i32 + other.right as i32,
        );
    }

    pub fn is_silent(&self) -> bool {
        self.left == 0 && self.right == 0
    }
}
