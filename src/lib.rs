//! Panomask keeps a layered index mask of a panorama scene in sync with an external animation
//! state log.
//!
//! An upstream process appends lines such as `[0, 3, 0, 7]` to a log file: position `n` holds
//! the active frame of animation sequence `n`, 0 meaning inactive. Panomask watches the file and,
//! whenever the trailing line describes a new state, re-renders one 8-bit index image per mask
//! configuration.
//!
//! # Pipeline overview
//!
//! 1. **Canonicalize**: every mask and frame is binarized and fitted to a fixed [`FrameSize`]
//!    ([`canonicalize`]).
//! 2. **Store**: static masks and sequence frames are cached once per configuration
//!    ([`LayerStore`]); lookups past the last frame hold the last frame.
//! 3. **Watch**: [`StateLog`] polls the log's modification time and reports genuine changes.
//! 4. **Composite**: [`Compositor`] ORs each gray value's layers and writes its index, visiting
//!    gray values from highest to lowest index so the lowest index wins overlaps, then persists
//!    `{n}.bmp`.
//!
//! [`MaskSession`] ties these together behind `initialize`, `poll_once` and `run_forever`.
//!
//! Missing or invalid assets, malformed state lines, unmapped gray values and frame gaps are all
//! non-fatal: they are logged through `tracing` and the affected layer or update is skipped. Only
//! failures to write a result image surface as errors.
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod assets;
mod config;
mod foundation;
mod render;
mod session;
mod watch;

pub use assets::canonical::{CanonicalImage, binarize, canonicalize, canonicalize_image};
pub use assets::store::{LayerStore, SequenceFrames};
pub use config::mapping::{
    DYNAMIC_CONFIG_NAME, PanoramaMapping, discover_config, load_mask_configs,
};
pub use config::mask::{
    AssetLayout, DEFAULT_LANDSCAPES_DIR, DEFAULT_POLL_INTERVAL, DEFAULT_RESULTS_DIR,
    DEFAULT_STATE_LOG, MaskConfig, MonitorSettings,
};
pub use foundation::core::{
    ActiveState, BACKGROUND_INDEX, BINARY_THRESHOLD, CANONICAL_HEIGHT, CANONICAL_WIDTH,
    FrameNumber, FrameSize, GrayValue, MASK_OFF, MASK_ON, SequenceNumber,
};
pub use foundation::error::{MaskError, MaskResult};
pub use render::composite::{
    Composite, Compositor, RenderOutcome, StampedLayer, compose, union_masks,
};
pub use session::cancel::CancelToken;
pub use session::monitor::{CycleReport, MaskPipeline, MaskSession};
pub use watch::state_log::{PollOutcome, RawState, StateLog, parse_state_line, read_last_line};
