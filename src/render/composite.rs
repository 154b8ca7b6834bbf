use std::path::{Path, PathBuf};

use image::{GrayImage, ImageFormat, Luma};

use crate::{
    assets::{canonical::CanonicalImage, store::LayerStore},
    config::mask::MaskConfig,
    foundation::{
        core::{ActiveState, BACKGROUND_INDEX, FrameSize, GrayValue},
        error::{MaskError, MaskResult},
    },
};

/// One gray value written into a result image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StampedLayer {
    /// Gray value of the layer.
    pub gray: GrayValue,
    /// Index written for its on pixels.
    pub index: u8,
    /// Number of candidate masks OR-ed together.
    pub candidates: usize,
    /// Number of pixels set to `index`.
    pub pixels: usize,
}

/// An index image built from the active layers, not yet persisted.
#[derive(Debug)]
pub struct Composite {
    /// Output indexes, background [`BACKGROUND_INDEX`].
    pub image: GrayImage,
    /// Layers in the order they were written.
    pub stamped: Vec<StampedLayer>,
    /// Non-fatal problems met while resolving layers.
    pub gaps: Vec<MaskError>,
}

/// A persisted result image.
#[derive(Debug)]
pub struct RenderOutcome {
    /// Name of the mask configuration rendered.
    pub config: String,
    /// File written.
    pub path: PathBuf,
    /// Render number, equal to the numeric file stem.
    pub sequence: u64,
    /// Layers in write order.
    pub stamped: Vec<StampedLayer>,
    /// Non-fatal problems met while resolving layers.
    pub gaps: Vec<MaskError>,
}

/// Build the index image for `active` without touching the filesystem.
///
/// Returns `None` when no sequence is active. Gray values are visited in
/// [`MaskConfig::render_order`]; each one ORs its static mask with the frames of every active
/// sequence and overwrites the output with its index, so the lowest index wins where layers
/// overlap.
pub fn compose(
    active: &ActiveState,
    config: &MaskConfig,
    store: &LayerStore,
    size: FrameSize,
) -> Option<Composite> {
    if active.is_empty() {
        return None;
    }

    let mut image = GrayImage::from_pixel(size.width, size.height, Luma([BACKGROUND_INDEX]));
    let mut stamped = Vec::new();
    let mut gaps = Vec::new();

    for gray in config.render_order() {
        let mut layers: Vec<&CanonicalImage> = Vec::new();
        if let Some(mask) = store.static_mask(gray) {
            layers.push(mask);
        }
        for (seq, frame) in active.iter() {
            match store.try_frame(gray, seq, frame) {
                Ok(frame_mask) => layers.push(frame_mask),
                Err(err @ MaskError::FrameGap(_)) => {
                    tracing::warn!(gray, seq, frame, error = %err, "frame candidate omitted");
                    gaps.push(err);
                }
                // Not every gray value animates every sequence.
                Err(_) => {}
            }
        }

        layers.retain(|layer| {
            let fits = layer.size() == size;
            if !fits {
                tracing::warn!(gray, layer = %layer.size(), expected = %size, "layer size mismatch");
                gaps.push(MaskError::asset_invalid(format!(
                    "gray {gray} layer is {}, expected {size}",
                    layer.size()
                )));
            }
            fits
        });
        if layers.is_empty() {
            continue;
        }

        let Some(index) = config.index_of(gray) else {
            let err = MaskError::config_gap(format!("no index mapping for gray value {gray}"));
            tracing::warn!(gray, error = %err, "layer skipped");
            gaps.push(err);
            continue;
        };

        let Some(on_mask) = union_masks(&layers) else {
            continue;
        };
        let pixels = stamp(&mut image, &on_mask, index);
        tracing::debug!(gray, index, candidates = layers.len(), pixels, "stamped layer");
        stamped.push(StampedLayer {
            gray,
            index,
            candidates: layers.len(),
            pixels,
        });
    }

    Some(Composite {
        image,
        stamped,
        gaps,
    })
}

/// Pixel-wise OR of masks: on wherever any input is on.
///
/// `None` when `layers` is empty. Layers whose size differs from the first one are ignored.
pub fn union_masks(layers: &[&CanonicalImage]) -> Option<GrayImage> {
    let (first, rest) = layers.split_first()?;
    let mut out = first.as_gray().clone();
    for layer in rest.iter().filter(|l| l.size() == first.size()) {
        for (dst, src) in out.iter_mut().zip(layer.as_raw()) {
            *dst |= *src;
        }
    }
    Some(out)
}

/// Write `index` into `dst` wherever `mask` is non-zero; returns the pixel count.
fn stamp(dst: &mut GrayImage, mask: &GrayImage, index: u8) -> usize {
    let mut count = 0;
    for (d, m) in dst.iter_mut().zip(mask.as_raw()) {
        if *m != 0 {
            *d = index;
            count += 1;
        }
    }
    count
}

/// Renders composites for one mask configuration and numbers them `1.bmp`, `2.bmp`, ...
#[derive(Clone, Debug)]
pub struct Compositor {
    results_dir: PathBuf,
    size: FrameSize,
    written: u64,
}

impl Compositor {
    /// Compositor writing into `results_dir`, which must already exist.
    pub fn new(results_dir: impl Into<PathBuf>, size: FrameSize) -> Self {
        Self {
            results_dir: results_dir.into(),
            size,
            written: 0,
        }
    }

    /// Directory receiving result images.
    pub fn results_dir(&self) -> &Path {
        &self.results_dir
    }

    /// Number of results written so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Path the next successful render will be written to.
    pub fn next_path(&self) -> PathBuf {
        self.results_dir.join(format!("{}.bmp", self.written + 1))
    }

    /// Compose and persist one result image.
    ///
    /// `Ok(None)` when `active` is empty. Write failures are [`MaskError::Persist`] and leave
    /// the counter unchanged, so the next render reuses the number.
    #[tracing::instrument(skip_all, fields(config = config.name()))]
    pub fn render(
        &mut self,
        active: &ActiveState,
        config: &MaskConfig,
        store: &LayerStore,
    ) -> MaskResult<Option<RenderOutcome>> {
        let Some(composite) = compose(active, config, store, self.size) else {
            tracing::debug!("no active sequences");
            return Ok(None);
        };

        let path = self.next_path();
        composite
            .image
            .save_with_format(&path, ImageFormat::Bmp)
            .map_err(|e| MaskError::persist(&path, e))?;
        self.written += 1;

        tracing::info!(path = %path.display(), layers = composite.stamped.len(), "result saved");
        Ok(Some(RenderOutcome {
            config: config.name().to_string(),
            path,
            sequence: self.written,
            stamped: composite.stamped,
            gaps: composite.gaps,
        }))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/composite.rs"]
mod tests;
