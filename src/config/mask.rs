use std::{
    cmp::Reverse,
    collections::{BTreeMap, BTreeSet},
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::foundation::{
    core::{FrameSize, GrayValue},
    error::{MaskError, MaskResult},
};

/// Default state log consumed by the watcher.
pub const DEFAULT_STATE_LOG: &str = "tmpl.log";
/// Default directory receiving numbered result images.
pub const DEFAULT_RESULTS_DIR: &str = "results";
/// Default root holding one asset directory per panorama.
pub const DEFAULT_LANDSCAPES_DIR: &str = "landscapes";
/// Default delay between two state log polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// One mask set: which gray values to track and where each lands in the output.
///
/// Gray values are unique and keep their configuration order, which breaks ties in
/// [`MaskConfig::render_order`]. Indexes may exist for gray values that are not tracked.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawMaskConfig")]
pub struct MaskConfig {
    name: String,
    gray_values: Vec<GrayValue>,
    gray_indexes: BTreeMap<GrayValue, u8>,
}

#[derive(Deserialize)]
struct RawMaskConfig {
    name: String,
    gray_values: Vec<GrayValue>,
    #[serde(default)]
    gray_indexes: BTreeMap<GrayValue, u8>,
}

impl TryFrom<RawMaskConfig> for MaskConfig {
    type Error = MaskError;

    fn try_from(raw: RawMaskConfig) -> MaskResult<Self> {
        Self::new(raw.name, raw.gray_values, raw.gray_indexes)
    }
}

impl MaskConfig {
    /// Build a validated configuration.
    pub fn new(
        name: impl Into<String>,
        gray_values: impl IntoIterator<Item = GrayValue>,
        gray_indexes: impl IntoIterator<Item = (GrayValue, u8)>,
    ) -> MaskResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(MaskError::validation("mask config name must be non-empty"));
        }

        let gray_values: Vec<GrayValue> = gray_values.into_iter().collect();
        let mut seen = BTreeSet::new();
        for gray in &gray_values {
            if !seen.insert(*gray) {
                return Err(MaskError::validation(format!(
                    "mask config '{name}' lists gray value {gray} more than once"
                )));
            }
        }

        Ok(Self {
            name,
            gray_values,
            gray_indexes: gray_indexes.into_iter().collect(),
        })
    }

    /// Identifier of the mask set.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tracked gray values in configuration order.
    pub fn gray_values(&self) -> &[GrayValue] {
        &self.gray_values
    }

    /// Full gray value to index mapping.
    pub fn gray_indexes(&self) -> &BTreeMap<GrayValue, u8> {
        &self.gray_indexes
    }

    /// Output index for `gray`, if mapped.
    pub fn index_of(&self, gray: GrayValue) -> Option<u8> {
        self.gray_indexes.get(&gray).copied()
    }

    /// Gray values ordered by descending index; unmapped values count as index 0.
    ///
    /// Later entries overwrite earlier ones when compositing, so the lowest index wins overlaps.
    pub fn render_order(&self) -> Vec<GrayValue> {
        let mut order = self.gray_values.clone();
        order.sort_by_key(|gray| Reverse(self.index_of(*gray).unwrap_or(0)));
        order
    }
}

/// Filesystem conventions for one panorama's mask assets.
///
/// Static masks live at `{base}/{id}_{gray}.bmp|.png`, sequence frames at
/// `{base}/{id}_{gray}/{id}_{gray}_{seq}/*.bmp`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssetLayout {
    panorama_id: String,
    base_dir: PathBuf,
}

impl AssetLayout {
    /// Layout rooted at an explicit base directory.
    pub fn new(panorama_id: impl Into<String>, base_dir: impl Into<PathBuf>) -> Self {
        Self {
            panorama_id: panorama_id.into(),
            base_dir: base_dir.into(),
        }
    }

    /// Layout at `{landscapes}/{panorama_id}`.
    pub fn under_landscapes(landscapes: &Path, panorama_id: impl Into<String>) -> Self {
        let panorama_id = panorama_id.into();
        let base_dir = landscapes.join(&panorama_id);
        Self {
            panorama_id,
            base_dir,
        }
    }

    /// Panorama identifier used as the file name prefix.
    pub fn panorama_id(&self) -> &str {
        &self.panorama_id
    }

    /// Directory holding the panorama's assets.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// `{id}_{gray}`, the stem shared by a gray value's static mask and sequence root.
    pub fn layer_stem(&self, gray: GrayValue) -> String {
        format!("{}_{gray}", self.panorama_id)
    }

    /// Static mask candidates in precedence order (bmp before png).
    pub fn static_mask_candidates(&self, gray: GrayValue) -> [PathBuf; 2] {
        let stem = self.layer_stem(gray);
        [
            self.base_dir.join(format!("{stem}.bmp")),
            self.base_dir.join(format!("{stem}.png")),
        ]
    }

    /// First existing static mask file for `gray`.
    pub fn static_mask_path(&self, gray: GrayValue) -> Option<PathBuf> {
        self.static_mask_candidates(gray)
            .into_iter()
            .find(|p| p.is_file())
    }

    /// Directory holding every sequence of `gray`.
    pub fn sequence_root(&self, gray: GrayValue) -> PathBuf {
        self.base_dir.join(self.layer_stem(gray))
    }

    /// Name prefix of the sequence directories inside [`AssetLayout::sequence_root`].
    pub fn sequence_dir_prefix(&self, gray: GrayValue) -> String {
        format!("{}_", self.layer_stem(gray))
    }
}

/// Runtime settings of a [`crate::MaskSession`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MonitorSettings {
    /// Append-only state log to watch.
    pub state_log: PathBuf,
    /// Directory receiving `{n}.bmp` result images.
    pub results_dir: PathBuf,
    /// Delay between polls in `run_forever`.
    pub poll_interval: Duration,
    /// Size of every canonical mask and result image.
    pub frame_size: FrameSize,
    /// Render mask configurations on the rayon pool.
    pub parallel: bool,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            state_log: PathBuf::from(DEFAULT_STATE_LOG),
            results_dir: PathBuf::from(DEFAULT_RESULTS_DIR),
            poll_interval: DEFAULT_POLL_INTERVAL,
            frame_size: FrameSize::CANONICAL,
            parallel: false,
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/config/mask.rs"]
mod tests;
