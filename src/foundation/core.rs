use serde::{Deserialize, Serialize};

use crate::foundation::error::{MaskError, MaskResult};

/// Key naming one logical compositing layer.
pub type GrayValue = u32;
/// Sequence slot; also the position of a frame number in a state line.
pub type SequenceNumber = usize;
/// Frame position within a sequence, starting at 1.
pub type FrameNumber = u32;

/// Canonical frame width in pixels.
pub const CANONICAL_WIDTH: u32 = 3840;
/// Canonical frame height in pixels.
pub const CANONICAL_HEIGHT: u32 = 1280;
/// Pixels at or above this value are "on" after binarization.
pub const BINARY_THRESHOLD: u8 = 127;
/// Value of an "on" mask pixel.
pub const MASK_ON: u8 = u8::MAX;
/// Value of an "off" mask pixel.
pub const MASK_OFF: u8 = 0;
/// Output index written wherever no layer is on.
pub const BACKGROUND_INDEX: u8 = 255;

/// Pixel dimensions shared by every canonical mask and result image.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameSize {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl FrameSize {
    /// The production frame size, 3840x1280.
    pub const CANONICAL: Self = Self {
        width: CANONICAL_WIDTH,
        height: CANONICAL_HEIGHT,
    };

    /// Build a frame size, rejecting zero dimensions.
    pub fn new(width: u32, height: u32) -> MaskResult<Self> {
        if width == 0 || height == 0 {
            return Err(MaskError::validation(format!(
                "frame size must be non-zero, got {width}x{height}"
            )));
        }
        Ok(Self { width, height })
    }

    /// Number of pixels in one frame.
    pub fn pixel_count(self) -> usize {
        self.width as usize * self.height as usize
    }
}

impl Default for FrameSize {
    fn default() -> Self {
        Self::CANONICAL
    }
}

impl std::fmt::Display for FrameSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Active `(sequence, frame)` pairs derived from one state line.
///
/// Only slots with a frame number greater than zero are kept, in slot order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ActiveState {
    slots: Vec<(SequenceNumber, FrameNumber)>,
}

impl ActiveState {
    /// Build from explicit pairs; pairs with frame 0 are dropped.
    pub fn new(slots: impl IntoIterator<Item = (SequenceNumber, FrameNumber)>) -> Self {
        Self {
            slots: slots.into_iter().filter(|&(_, frame)| frame > 0).collect(),
        }
    }

    /// Derive from a raw state line where position is the sequence number.
    ///
    /// Frame numbers above [`FrameNumber::MAX`] saturate; the store clamps them to the last
    /// loaded frame anyway.
    pub fn from_raw(raw: &[i64]) -> Self {
        Self::new(raw.iter().enumerate().filter(|(_, v)| **v > 0).map(|(seq, v)| {
            (seq, FrameNumber::try_from(*v).unwrap_or(FrameNumber::MAX))
        }))
    }

    /// True when no sequence is active.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of active sequences.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Iterate active pairs in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (SequenceNumber, FrameNumber)> + '_ {
        self.slots.iter().copied()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
