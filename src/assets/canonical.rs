use std::path::Path;

use image::{GrayImage, ImageError};

use crate::foundation::{
    core::{BINARY_THRESHOLD, FrameSize, MASK_OFF, MASK_ON},
    error::{MaskError, MaskResult},
};

/// Binary mask normalized to a fixed [`FrameSize`] with pixels in `{0, 255}`.
///
/// Instances are only produced by [`canonicalize`] and [`canonicalize_image`], so holding one is
/// proof that shape and value domain were validated.
#[derive(Clone, PartialEq, Eq)]
pub struct CanonicalImage {
    pixels: GrayImage,
}

impl CanonicalImage {
    /// Dimensions of the mask.
    pub fn size(&self) -> FrameSize {
        FrameSize {
            width: self.pixels.width(),
            height: self.pixels.height(),
        }
    }

    /// Borrow the underlying grayscale buffer.
    pub fn as_gray(&self) -> &GrayImage {
        &self.pixels
    }

    /// Row-major pixel bytes.
    pub fn as_raw(&self) -> &[u8] {
        self.pixels.as_raw()
    }

    /// Whether the pixel at `(x, y)` is on. Out-of-bounds coordinates are off.
    pub fn is_on(&self, x: u32, y: u32) -> bool {
        self.pixels
            .get_pixel_checked(x, y)
            .is_some_and(|p| p.0[0] == MASK_ON)
    }

    /// Number of on pixels.
    pub fn on_count(&self) -> usize {
        self.pixels.as_raw().iter().filter(|&&v| v == MASK_ON).count()
    }
}

impl std::fmt::Debug for CanonicalImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CanonicalImage")
            .field("size", &self.size())
            .field("on_count", &self.on_count())
            .finish()
    }
}

/// Load an image file as grayscale and canonicalize it to `size`.
///
/// Missing files yield [`MaskError::AssetMissing`]; undecodable files and validation failures yield
/// [`MaskError::AssetInvalid`]. Callers treat both as "layer absent".
pub fn canonicalize(path: &Path, size: FrameSize) -> MaskResult<CanonicalImage> {
    let decoded = image::open(path).map_err(|err| match err {
        ImageError::IoError(io) if io.kind() == std::io::ErrorKind::NotFound => {
            MaskError::asset_missing(format!("'{}'", path.display()))
        }
        other => MaskError::asset_invalid(format!("decode '{}': {other}", path.display())),
    })?;

    canonicalize_image(&decoded.to_luma8(), size).map_err(|err| match err {
        MaskError::AssetInvalid(msg) => {
            MaskError::asset_invalid(format!("'{}': {msg}", path.display()))
        }
        other => other,
    })
}

/// Canonicalize an in-memory grayscale image.
///
/// Steps: binarize, scale to `size.width` with nearest-neighbour sampling, center-crop or
/// zero-pad vertically to `size.height`, binarize again, validate.
pub fn canonicalize_image(source: &GrayImage, size: FrameSize) -> MaskResult<CanonicalImage> {
    let (src_w, src_h) = source.dimensions();
    if src_w == 0 || src_h == 0 {
        return Err(MaskError::asset_invalid(format!(
            "empty source image {src_w}x{src_h}"
        )));
    }

    let mut binary = source.clone();
    binarize(&mut binary);

    let scaled_h = scaled_height(src_w, src_h, size.width);
    let mut fitted = if (src_w, src_h) == (size.width, size.height) {
        binary
    } else {
        scale_and_fit(&binary, size, scaled_h)
    };
    binarize(&mut fitted);

    validate(&fitted, size)?;
    Ok(CanonicalImage { pixels: fitted })
}

/// Hard threshold in place: values at or above [`BINARY_THRESHOLD`] become 255, the rest 0.
pub fn binarize(image: &mut GrayImage) {
    for v in image.iter_mut() {
        *v = if *v >= BINARY_THRESHOLD {
            MASK_ON
        } else {
            MASK_OFF
        };
    }
}

fn scaled_height(src_w: u32, src_h: u32, target_w: u32) -> u32 {
    let scale = f64::from(target_w) / f64::from(src_w);
    let h = (f64::from(src_h) * scale).round();
    // Extremely wide sources would otherwise collapse to zero rows.
    h.clamp(1.0, f64::from(u32::MAX)) as u32
}

/// Nearest-neighbour scale to `size.width` x `scaled_h`, then center-crop or zero-pad to
/// `size.height`.
///
/// Only the output rows are sampled; the intermediate scaled image is never allocated, so very
/// narrow sources with a huge `scaled_h` cost the same as any other.
fn scale_and_fit(source: &GrayImage, size: FrameSize, scaled_h: u32) -> GrayImage {
    let (src_w, src_h) = source.dimensions();
    let columns: Vec<u32> = (0..size.width)
        .map(|x| nearest(x, src_w, size.width))
        .collect();
    // Scaled row shown at output row 0; negative when padding.
    let offset = (i64::from(scaled_h) - i64::from(size.height)) / 2;

    let mut out = GrayImage::new(size.width, size.height);
    for (y, dst) in (0i64..).zip(out.chunks_exact_mut(size.width as usize)) {
        let Ok(scaled_y) = u32::try_from(offset + y) else {
            continue;
        };
        if scaled_y >= scaled_h {
            continue;
        }
        let src_y = nearest(scaled_y, src_h, scaled_h);
        for (d, &src_x) in dst.iter_mut().zip(&columns) {
            *d = source.get_pixel(src_x, src_y).0[0];
        }
    }
    out
}

/// Source coordinate sampled by destination coordinate `i` (pixel centers).
fn nearest(i: u32, src_len: u32, dst_len: u32) -> u32 {
    let pos = (2 * u128::from(i) + 1) * u128::from(src_len) / (2 * u128::from(dst_len));
    // i < dst_len keeps pos below src_len
    pos as u32
}

fn validate(image: &GrayImage, size: FrameSize) -> MaskResult<()> {
    let (w, h) = image.dimensions();
    if (w, h) != (size.width, size.height) {
        return Err(MaskError::asset_invalid(format!(
            "incorrect final dimensions {w}x{h}, expected {size}"
        )));
    }
    if let Some(v) = image
        .as_raw()
        .iter()
        .find(|&&v| v != MASK_ON && v != MASK_OFF)
    {
        return Err(MaskError::asset_invalid(format!(
            "non-binary value {v} after canonicalization"
        )));
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/assets/canonical.rs"]
mod tests;
