use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use crate::{
    assets::canonical::{CanonicalImage, canonicalize},
    config::{
        mapping::trailing_number,
        mask::{AssetLayout, MaskConfig},
    },
    foundation::{
        core::{FrameNumber, FrameSize, GrayValue, SequenceNumber},
        error::{MaskError, MaskResult},
    },
};

/// Frames loaded for one `(gray value, sequence)` pair.
#[derive(Clone, Debug, Default)]
pub struct SequenceFrames {
    frames: BTreeMap<FrameNumber, CanonicalImage>,
    max_frame: FrameNumber,
}

impl SequenceFrames {
    /// Highest frame number successfully loaded, 0 when none was.
    pub fn max_frame(&self) -> FrameNumber {
        self.max_frame
    }

    /// Number of loaded frames.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// True when no frame loaded.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Frame by exact number, without clamping.
    pub fn get(&self, frame: FrameNumber) -> Option<&CanonicalImage> {
        self.frames.get(&frame)
    }

    fn insert(&mut self, frame: FrameNumber, image: CanonicalImage) {
        self.max_frame = self.max_frame.max(frame);
        self.frames.insert(frame, image);
    }
}

/// Canonical static masks and sequence frames for one mask configuration.
///
/// Filled once by [`LayerStore::load_static_masks`] and [`LayerStore::load_sequence_frames`]
/// (or [`LayerStore::load`]) and only read afterwards. Missing or invalid assets are logged and
/// left out; they never fail loading.
#[derive(Clone, Debug)]
pub struct LayerStore {
    layout: AssetLayout,
    size: FrameSize,
    static_masks: BTreeMap<GrayValue, CanonicalImage>,
    sequences: BTreeMap<GrayValue, BTreeMap<SequenceNumber, SequenceFrames>>,
}

impl LayerStore {
    /// Empty store reading from `layout` and canonicalizing to `size`.
    pub fn new(layout: AssetLayout, size: FrameSize) -> Self {
        Self {
            layout,
            size,
            static_masks: BTreeMap::new(),
            sequences: BTreeMap::new(),
        }
    }

    /// Build a store and load every static mask and sequence frame of `config`.
    #[tracing::instrument(skip_all, fields(config = config.name(), panorama = layout.panorama_id()))]
    pub fn load(config: &MaskConfig, layout: AssetLayout, size: FrameSize) -> Self {
        let mut store = Self::new(layout, size);
        let statics = store.load_static_masks(config.gray_values());
        let frames = store.load_sequence_frames(config.gray_values());
        tracing::info!(static_masks = statics, frames, "layer store loaded");
        store
    }

    /// Asset layout the store reads from.
    pub fn layout(&self) -> &AssetLayout {
        &self.layout
    }

    /// Canonical size of every cached image.
    pub fn size(&self) -> FrameSize {
        self.size
    }

    /// Load `{id}_{gray}.bmp` (or `.png` when no bmp exists) for each gray value.
    ///
    /// Returns the number of static masks cached.
    pub fn load_static_masks(&mut self, gray_values: &[GrayValue]) -> usize {
        let mut loaded = 0;
        for &gray in gray_values {
            let Some(path) = self.layout.static_mask_path(gray) else {
                tracing::debug!(gray, "no static mask");
                continue;
            };
            match canonicalize(&path, self.size) {
                Ok(mask) => {
                    tracing::debug!(gray, path = %path.display(), on = mask.on_count(), "loaded static mask");
                    self.static_masks.insert(gray, mask);
                    loaded += 1;
                }
                Err(err) => tracing::warn!(gray, error = %err, "static mask skipped"),
            }
        }
        loaded
    }

    /// Load every sequence frame of each gray value.
    ///
    /// Sequence directories are `{id}_{gray}/{id}_{gray}_{seq}`; frames are the `*.bmp` files in
    /// them, numbered by the integer after the last `_` of the file stem. Returns the number of
    /// frames cached across all gray values and sequences.
    pub fn load_sequence_frames(&mut self, gray_values: &[GrayValue]) -> usize {
        let mut total = 0;
        for &gray in gray_values {
            let root = self.layout.sequence_root(gray);
            if !root.is_dir() {
                tracing::debug!(gray, "no sequence directory");
                continue;
            }

            let prefix = self.layout.sequence_dir_prefix(gray);
            let seq_dirs = match sorted_entries(&root, |p| {
                p.is_dir()
                    && p.file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(|n| n.starts_with(&prefix))
            }) {
                Ok(dirs) => dirs,
                Err(err) => {
                    tracing::warn!(gray, error = %err, "sequence directory unreadable");
                    continue;
                }
            };
            if seq_dirs.is_empty() {
                tracing::debug!(gray, "no sequences found");
                continue;
            }

            let gray_sequences = self.sequences.entry(gray).or_default();
            for seq_dir in seq_dirs {
                let name = seq_dir.file_name().and_then(|n| n.to_str()).unwrap_or_default();
                let Some(seq) = trailing_number::<SequenceNumber>(name) else {
                    tracing::warn!(gray, dir = name, "invalid sequence directory name");
                    continue;
                };
                let frames = load_frames(&seq_dir, self.size);
                if !frames.is_empty() {
                    tracing::debug!(gray, seq, frames = frames.len(), max = frames.max_frame(), "loaded sequence");
                }
                total += frames.len();
                gray_sequences.insert(seq, frames);
            }
        }
        total
    }

    /// Static mask of `gray`, if one was loaded.
    pub fn static_mask(&self, gray: GrayValue) -> Option<&CanonicalImage> {
        self.static_masks.get(&gray)
    }

    /// Loaded frames of one sequence.
    pub fn sequence(&self, gray: GrayValue, seq: SequenceNumber) -> Option<&SequenceFrames> {
        self.sequences.get(&gray)?.get(&seq)
    }

    /// Sequence numbers known for `gray`, ascending.
    pub fn sequence_numbers(&self, gray: GrayValue) -> Vec<SequenceNumber> {
        self.sequences
            .get(&gray)
            .map(|s| s.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Highest loaded frame of a sequence, 0 when unknown or empty.
    pub fn max_frame(&self, gray: GrayValue, seq: SequenceNumber) -> FrameNumber {
        self.sequence(gray, seq).map_or(0, SequenceFrames::max_frame)
    }

    /// Frame lookup holding the last frame: requests past the end clamp to the highest loaded
    /// frame number.
    ///
    /// Unknown gray values and sequences, and sequences without frames, are
    /// [`MaskError::AssetMissing`]. A clamped number that was never loaded is
    /// [`MaskError::FrameGap`]; no neighbouring frame is substituted.
    pub fn try_frame(
        &self,
        gray: GrayValue,
        seq: SequenceNumber,
        frame: FrameNumber,
    ) -> MaskResult<&CanonicalImage> {
        let frames = self.sequence(gray, seq).ok_or_else(|| {
            MaskError::asset_missing(format!("gray {gray} has no sequence {seq}"))
        })?;
        let max = frames.max_frame();
        if max == 0 {
            return Err(MaskError::asset_missing(format!(
                "gray {gray} sequence {seq} has no frames"
            )));
        }
        let actual = frame.min(max);
        frames.get(actual).ok_or_else(|| {
            MaskError::frame_gap(format!(
                "gray {gray} sequence {seq} frame {actual} not loaded (max {max})"
            ))
        })
    }

    /// [`LayerStore::try_frame`] with every failure folded into `None`.
    pub fn get_frame(
        &self,
        gray: GrayValue,
        seq: SequenceNumber,
        frame: FrameNumber,
    ) -> Option<&CanonicalImage> {
        self.try_frame(gray, seq, frame).ok()
    }

    /// Number of static masks cached.
    pub fn static_count(&self) -> usize {
        self.static_masks.len()
    }

    /// Number of sequence frames cached.
    pub fn frame_count(&self) -> usize {
        self.sequences
            .values()
            .flat_map(|s| s.values())
            .map(SequenceFrames::len)
            .sum()
    }
}

fn load_frames(seq_dir: &Path, size: FrameSize) -> SequenceFrames {
    let mut out = SequenceFrames::default();
    let files = match sorted_entries(seq_dir, |p| {
        p.is_file()
            && p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("bmp"))
    }) {
        Ok(files) => files,
        Err(err) => {
            tracing::warn!(dir = %seq_dir.display(), error = %err, "frame directory unreadable");
            return out;
        }
    };

    for path in files {
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
        let Some(frame) = trailing_number::<FrameNumber>(stem) else {
            tracing::warn!(path = %path.display(), "invalid frame name");
            continue;
        };
        match canonicalize(&path, size) {
            Ok(image) => out.insert(frame, image),
            Err(err) => tracing::warn!(error = %err, "frame skipped"),
        }
    }
    out
}

fn sorted_entries(dir: &Path, keep: impl Fn(&Path) -> bool) -> std::io::Result<Vec<PathBuf>> {
    let mut out: Vec<PathBuf> = std::fs::read_dir(dir)?
        .flatten()
        .map(|e| e.path())
        .filter(|p| keep(p))
        .collect();
    out.sort();
    Ok(out)
}

#[cfg(test)]
#[path = "../../tests/unit/assets/store.rs"]
mod tests;
