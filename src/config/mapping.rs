use std::{
    collections::{BTreeMap, BTreeSet},
    fs::File,
    io::BufReader,
    path::Path,
};

use anyhow::Context;
use serde::Deserialize;

use crate::{
    config::mask::{AssetLayout, MaskConfig},
    foundation::{
        core::GrayValue,
        error::{MaskError, MaskResult},
    },
};

/// Name given to configurations built by [`discover_config`].
pub const DYNAMIC_CONFIG_NAME: &str = "dynamic";

/// Gray value to index mapping for one panorama, as stored in the mapping file.
///
/// The mapping file is a JSON object keyed by panorama id:
///
/// ```json
/// { "P1": { "static_masks": { "10": 50 }, "sequence_masks": { "20": 10 } } }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct PanoramaMapping {
    /// Indexes for gray values that have a static mask file.
    #[serde(default)]
    pub static_masks: BTreeMap<GrayValue, u8>,
    /// Indexes for gray values that have a sequence directory.
    #[serde(default)]
    pub sequence_masks: BTreeMap<GrayValue, u8>,
}

impl PanoramaMapping {
    /// Read the mapping file at `path` and select `panorama_id`.
    pub fn load(path: &Path, panorama_id: &str) -> MaskResult<Self> {
        let f = File::open(path)
            .with_context(|| format!("open mapping file '{}'", path.display()))?;
        let all: BTreeMap<String, PanoramaMapping> = serde_json::from_reader(BufReader::new(f))
            .map_err(|e| MaskError::serde(format!("parse '{}': {e}", path.display())))?;
        Self::select(all, panorama_id)
    }

    /// Parse a mapping document from a string and select `panorama_id`.
    pub fn from_json_str(json: &str, panorama_id: &str) -> MaskResult<Self> {
        let all: BTreeMap<String, PanoramaMapping> =
            serde_json::from_str(json).map_err(|e| MaskError::serde(e.to_string()))?;
        Self::select(all, panorama_id)
    }

    fn select(mut all: BTreeMap<String, PanoramaMapping>, panorama_id: &str) -> MaskResult<Self> {
        all.remove(panorama_id).ok_or_else(|| {
            MaskError::validation(format!("no mapping found for panorama '{panorama_id}'"))
        })
    }

    /// Static indexes overlaid by sequence indexes.
    pub fn merged_indexes(&self) -> BTreeMap<GrayValue, u8> {
        let mut out = self.static_masks.clone();
        out.extend(self.sequence_masks.iter().map(|(g, i)| (*g, *i)));
        out
    }
}

/// Build the `"dynamic"` configuration from what exists on disk.
///
/// A gray value is tracked when `{id}_{gray}.png|.bmp` exists and is listed under
/// `static_masks`, or when the directory `{id}_{gray}` exists and is listed under
/// `sequence_masks`. Tracked values are sorted ascending.
#[tracing::instrument(skip(mapping), fields(panorama = layout.panorama_id()))]
pub fn discover_config(layout: &AssetLayout, mapping: &PanoramaMapping) -> MaskResult<MaskConfig> {
    let base = layout.base_dir();
    if !base.is_dir() {
        return Err(MaskError::validation(format!(
            "directory not found: '{}'",
            base.display()
        )));
    }

    let prefix = format!("{}_", layout.panorama_id());
    let mut static_found = BTreeSet::new();
    let mut sequence_found = BTreeSet::new();

    let entries =
        std::fs::read_dir(base).with_context(|| format!("scan '{}'", base.display()))?;
    for entry in entries.flatten() {
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|s| s.to_str()) else {
            continue;
        };
        if !name.starts_with(&prefix) {
            continue;
        }

        if path.is_dir() {
            if let Some(gray) = trailing_number::<GrayValue>(name)
                && mapping.sequence_masks.contains_key(&gray)
            {
                sequence_found.insert(gray);
            }
            continue;
        }

        let is_mask_file = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("png") || e.eq_ignore_ascii_case("bmp"));
        if !is_mask_file {
            continue;
        }
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
        if let Some(gray) = trailing_number::<GrayValue>(stem)
            && mapping.static_masks.contains_key(&gray)
        {
            static_found.insert(gray);
        }
    }

    tracing::info!(
        static_masks = ?static_found,
        sequence_masks = ?sequence_found,
        "discovered masks"
    );

    let gray_values: BTreeSet<GrayValue> = static_found.union(&sequence_found).copied().collect();
    MaskConfig::new(DYNAMIC_CONFIG_NAME, gray_values, mapping.merged_indexes())
}

/// Read an explicit list of mask configurations from a JSON array.
pub fn load_mask_configs(path: &Path) -> MaskResult<Vec<MaskConfig>> {
    let f = File::open(path)
        .with_context(|| format!("open mask config file '{}'", path.display()))?;
    let configs: Vec<MaskConfig> = serde_json::from_reader(BufReader::new(f))
        .map_err(|e| MaskError::serde(format!("parse '{}': {e}", path.display())))?;
    if configs.is_empty() {
        return Err(MaskError::validation(format!(
            "'{}' defines no mask configurations",
            path.display()
        )));
    }
    Ok(configs)
}

/// Parse the segment after the last `_` of `name`.
pub(crate) fn trailing_number<T: std::str::FromStr>(name: &str) -> Option<T> {
    name.rsplit('_').next()?.parse().ok()
}

#[cfg(test)]
#[path = "../../tests/unit/config/mapping.rs"]
mod tests;
